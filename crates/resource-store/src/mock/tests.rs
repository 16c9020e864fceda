use super::*;
use crds::{AddressPoolSpec, AddressPoolStatus, Condition, MetalLBSpec, CONDITION_AVAILABLE};
use std::collections::BTreeMap;

const NS: &str = "metallb-system";

fn pool(name: &str, addresses: &[&str]) -> AddressPool {
    let mut pool = AddressPool::new(
        name,
        AddressPoolSpec {
            protocol: "layer2".to_string(),
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            auto_assign: None,
        },
    );
    pool.metadata.namespace = Some(NS.to_string());
    pool
}

fn config_map(name: &str, payload: &str) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NS.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([("config".to_string(), payload.to_string())])),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_create_assigns_resource_version_and_rejects_duplicates() {
    let store = MockResourceStore::new();
    let created = store.create_address_pool(&pool("gold", &["10.0.0.0/24"])).await.unwrap();
    assert!(created.metadata.resource_version.is_some());
    assert!(created.metadata.uid.is_some());

    let err = store.create_address_pool(&pool("gold", &["10.0.0.0/24"])).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn test_replace_with_stale_version_conflicts() {
    let store = MockResourceStore::new();
    let created = store.add_config_map(config_map("config", "a")).unwrap();

    let mut first = created.clone();
    first.data = Some(BTreeMap::from([("config".to_string(), "b".to_string())]));
    let replaced = store.replace_config_map(&first).await.unwrap();
    assert_ne!(replaced.metadata.resource_version, created.metadata.resource_version);

    // Second writer still holds the original version
    let mut second = created;
    second.data = Some(BTreeMap::from([("config".to_string(), "c".to_string())]));
    let err = store.replace_config_map(&second).await.unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(store.config_map_writes(), 1);
}

#[tokio::test]
async fn test_delete_with_precondition() {
    let store = MockResourceStore::new();
    let created = store.add_config_map(config_map("config", "a")).unwrap();

    let err = store.delete_config_map(NS, "config", Some("not-the-version")).await.unwrap_err();
    assert!(err.is_conflict());
    assert!(store.config_map(NS, "config").is_some());

    store
        .delete_config_map(NS, "config", created.metadata.resource_version.as_deref())
        .await
        .unwrap();
    assert!(store.config_map(NS, "config").is_none());

    let err = store.delete_config_map(NS, "config", None).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_injected_config_map_conflicts_bump_version() {
    let store = MockResourceStore::new();
    let created = store.add_config_map(config_map("config", "a")).unwrap();
    store.fail_next_config_map_writes_with_conflict(1);

    let err = store.replace_config_map(&created).await.unwrap_err();
    assert!(err.is_conflict());
    let stored = store.config_map(NS, "config").unwrap();
    assert_ne!(stored.metadata.resource_version, created.metadata.resource_version);

    // Re-read object succeeds once the injected conflict is consumed
    store.replace_config_map(&stored).await.unwrap();
    assert_eq!(store.config_map_writes(), 1);
}

#[tokio::test]
async fn test_status_write_keeps_spec_and_replace_keeps_status() {
    let store = MockResourceStore::new();
    let created = store.add_address_pool(pool("gold", &["10.0.0.0/24"])).unwrap();

    let mut with_status = created.clone();
    with_status.spec.addresses = vec!["192.168.0.0/16".to_string()];
    with_status.status = Some(AddressPoolStatus {
        conditions: vec![Condition::new(CONDITION_AVAILABLE, true, "Merged", "")],
    });
    let patched = store.patch_address_pool_status(&with_status).await.unwrap();
    assert_eq!(patched.spec.addresses, vec!["10.0.0.0/24".to_string()]);
    assert_eq!(store.status_writes(), 1);

    let mut new_spec = patched.clone();
    new_spec.spec.addresses = vec!["10.1.0.0/24".to_string()];
    new_spec.status = None;
    let replaced = store.replace_address_pool(&new_spec).await.unwrap();
    assert_eq!(replaced.spec.addresses, vec!["10.1.0.0/24".to_string()]);
    assert_eq!(replaced.status, patched.status);
    assert_eq!(replaced.metadata.generation, Some(2));
}

#[tokio::test]
async fn test_injected_status_conflict() {
    let store = MockResourceStore::new();
    let created = store
        .add_metallb(MetalLB {
            metadata: ObjectMeta {
                name: Some("metallb".to_string()),
                namespace: Some(NS.to_string()),
                ..Default::default()
            },
            spec: MetalLBSpec::default(),
            status: None,
        })
        .unwrap();
    store.fail_next_status_writes_with_conflict(1);

    let err = store.patch_metallb_status(&created).await.unwrap_err();
    assert!(err.is_conflict());
    let reread = store.get_metallb(NS, "metallb").await.unwrap().unwrap();
    store.patch_metallb_status(&reread).await.unwrap();
    assert_eq!(store.status_writes(), 1);
}

#[tokio::test]
async fn test_unregistered_kind_is_fatal() {
    let store = MockResourceStore::new();
    store.set_address_pool_kind_registered(false);
    let err = store.list_address_pools(NS).await.unwrap_err();
    assert!(err.is_fatal());

    let mut watch = store.watch_address_pools();
    assert!(watch.next().await.unwrap().is_err());
}

#[tokio::test]
async fn test_watch_replays_existing_then_streams_changes() {
    let store = MockResourceStore::new();
    store.add_address_pool(pool("gold", &["10.0.0.0/24"])).unwrap();

    let mut watch = store.watch_address_pools();
    match watch.next().await.unwrap().unwrap() {
        WatchEvent::Added(p) => assert_eq!(p.metadata.name.as_deref(), Some("gold")),
        other => panic!("expected replayed Added, got {}", other.kind_str()),
    }

    store.delete_address_pool(NS, "gold").await.unwrap();
    match watch.next().await.unwrap().unwrap() {
        WatchEvent::Deleted(p) => assert_eq!(p.metadata.name.as_deref(), Some("gold")),
        other => panic!("expected Deleted, got {}", other.kind_str()),
    }
}

#[tokio::test]
async fn test_list_is_namespace_scoped() {
    let store = MockResourceStore::new();
    store.add_address_pool(pool("gold", &["10.0.0.0/24"])).unwrap();
    let mut other = pool("silver", &["10.1.0.0/24"]);
    other.metadata.namespace = Some("other".to_string());
    store.add_address_pool(other).unwrap();

    let pools = store.list_address_pools(NS).await.unwrap();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].metadata.name.as_deref(), Some("gold"));
}
