//! Integration tests for the Kubernetes resource store
//!
//! These tests require a reachable cluster with the MetalLB operator CRDs
//! installed (`cargo run -p crds --bin crdgen | kubectl apply -f -`).
//! Set METALLB_TEST_NAMESPACE to pick the namespace (default: metallb-system).

use crds::{AddressPool, AddressPoolSpec};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use resource_store::{KubeResourceStore, ResourceStoreTrait, WatchEvent};
use std::collections::BTreeMap;

async fn store() -> (KubeResourceStore, String) {
    let _ = rustls::crypto::ring::default_provider().install_default();
    let namespace = std::env::var("METALLB_TEST_NAMESPACE")
        .unwrap_or_else(|_| "metallb-system".to_string());
    let client = kube::Client::try_default()
        .await
        .expect("Failed to create Kubernetes client");
    (KubeResourceStore::new(client, namespace.clone()), namespace)
}

#[tokio::test]
#[ignore] // Requires a running cluster
async fn test_list_address_pools() {
    let (store, namespace) = store().await;
    let pools = store
        .list_address_pools(&namespace)
        .await
        .expect("Failed to list address pools");
    println!("Found {} address pools", pools.len());
}

#[tokio::test]
#[ignore]
async fn test_config_map_replace_and_guarded_delete() {
    let (store, namespace) = store().await;
    let name = "resource-store-integration";
    let config_map = ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.clone()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([("config".to_string(), "{}".to_string())])),
        ..Default::default()
    };

    let created = store.create_config_map(&config_map).await.expect("create failed");
    let replaced = store.replace_config_map(&created).await.expect("replace failed");

    // The version from before the replace is stale now
    let err = store
        .delete_config_map(&namespace, name, created.metadata.resource_version.as_deref())
        .await
        .expect_err("stale delete should conflict");
    assert!(err.is_conflict());

    store
        .delete_config_map(&namespace, name, replaced.metadata.resource_version.as_deref())
        .await
        .expect("delete failed");
}

#[tokio::test]
#[ignore]
async fn test_watch_sees_created_pool() {
    let (store, namespace) = store().await;
    let mut pool = AddressPool::new(
        "resource-store-integration",
        AddressPoolSpec {
            protocol: "layer2".to_string(),
            addresses: vec!["203.0.113.0/28".to_string()],
            auto_assign: Some(false),
        },
    );
    pool.metadata.namespace = Some(namespace.clone());

    let mut watch = store.watch_address_pools();
    store.create_address_pool(&pool).await.expect("create failed");

    let mut seen = false;
    while let Some(event) = watch.next().await {
        if let Ok(WatchEvent::Added(p) | WatchEvent::Modified(p)) = event {
            if p.metadata.name.as_deref() == Some("resource-store-integration") {
                seen = true;
                break;
            }
        }
    }
    assert!(seen);

    store
        .delete_address_pool(&namespace, "resource-store-integration")
        .await
        .expect("delete failed");
}
