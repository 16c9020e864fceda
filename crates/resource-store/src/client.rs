//! Kubernetes-backed resource store
//!
//! Implements [`ResourceStoreTrait`] on top of kube `Api<K>` handles.
//! Optimistic concurrency relies on the API server: `replace` carries the
//! object's resourceVersion, status patches and deletes carry it as a
//! precondition.

use crate::error::StoreError;
use crate::models::{WatchEvent, WatchStream};
use crate::store_trait::ResourceStoreTrait;
use crds::{AddressPool, MetalLB};
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams, Preconditions};
use kube::{Api, Client};
use kube_runtime::{watcher, WatchStreamExt};
use serde::Serialize;
use tracing::debug;

/// Resource store talking to a live API server
#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
    watch_namespace: String,
}

impl KubeResourceStore {
    /// Create a new store
    ///
    /// # Arguments
    /// * `client` - Kubernetes client
    /// * `watch_namespace` - Namespace whose AddressPool and MetalLB objects are watched
    pub fn new(client: Client, watch_namespace: impl Into<String>) -> Self {
        Self {
            client,
            watch_namespace: watch_namespace.into(),
        }
    }

    /// Namespace this store watches
    pub fn watch_namespace(&self) -> &str {
        &self.watch_namespace
    }

    fn address_pools(&self, namespace: &str) -> Api<AddressPool> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn metallbs(&self, namespace: &str) -> Api<MetalLB> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn namespace_of<'a>(&'a self, meta: &'a ObjectMeta) -> &'a str {
        meta.namespace.as_deref().unwrap_or(&self.watch_namespace)
    }
}

/// Name of an object about to be written; the API server needs it in the path
fn name_of<'a>(meta: &'a ObjectMeta, kind: &str) -> Result<&'a str, StoreError> {
    meta.name
        .as_deref()
        .ok_or_else(|| StoreError::InvalidObject(format!("{} is missing metadata.name", kind)))
}

/// Merge patch touching only `status`, guarded by the caller's resourceVersion
fn status_patch<S: Serialize>(resource_version: Option<&str>, status: &S) -> Result<serde_json::Value, StoreError> {
    let mut patch = serde_json::json!({ "status": serde_json::to_value(status)? });
    if let Some(rv) = resource_version {
        patch["metadata"] = serde_json::json!({ "resourceVersion": rv });
    }
    Ok(patch)
}

/// Lists map a 404 to "kind not registered": the collection itself is missing
fn list_error(kind: &str, error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(ae) if ae.code == 404 => {
            StoreError::KindNotRegistered(format!("{}: {}", kind, ae.message))
        }
        other => other.into(),
    }
}

fn map_watch<K, S>(stream: S) -> WatchStream<K>
where
    K: Send + 'static,
    S: Stream<Item = Result<watcher::Event<K>, watcher::Error>> + Send + 'static,
{
    stream
        .filter_map(|event| async move {
            match event {
                Ok(watcher::Event::InitApply(obj)) => Some(Ok(WatchEvent::Added(obj))),
                Ok(watcher::Event::Apply(obj)) => Some(Ok(WatchEvent::Modified(obj))),
                Ok(watcher::Event::Delete(obj)) => Some(Ok(WatchEvent::Deleted(obj))),
                Ok(watcher::Event::Init) | Ok(watcher::Event::InitDone) => None,
                Err(e) => Some(Err(StoreError::Watch(e.to_string()))),
            }
        })
        .boxed()
}

#[async_trait::async_trait]
impl ResourceStoreTrait for KubeResourceStore {
    async fn list_address_pools(&self, namespace: &str) -> Result<Vec<AddressPool>, StoreError> {
        debug!("Listing AddressPools in {}", namespace);
        self.address_pools(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| list_error("AddressPool", e))
    }

    async fn get_address_pool(&self, namespace: &str, name: &str) -> Result<Option<AddressPool>, StoreError> {
        Ok(self.address_pools(namespace).get_opt(name).await?)
    }

    async fn create_address_pool(&self, pool: &AddressPool) -> Result<AddressPool, StoreError> {
        let namespace = self.namespace_of(&pool.metadata);
        Ok(self.address_pools(namespace).create(&PostParams::default(), pool).await?)
    }

    async fn replace_address_pool(&self, pool: &AddressPool) -> Result<AddressPool, StoreError> {
        let name = name_of(&pool.metadata, "AddressPool")?;
        let namespace = self.namespace_of(&pool.metadata);
        Ok(self.address_pools(namespace).replace(name, &PostParams::default(), pool).await?)
    }

    async fn delete_address_pool(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.address_pools(namespace).delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn patch_address_pool_status(&self, pool: &AddressPool) -> Result<AddressPool, StoreError> {
        let name = name_of(&pool.metadata, "AddressPool")?;
        let namespace = self.namespace_of(&pool.metadata);
        let patch = status_patch(pool.metadata.resource_version.as_deref(), &pool.status)?;
        Ok(self
            .address_pools(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError> {
        Ok(self.config_maps(namespace).get_opt(name).await?)
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        let namespace = self.namespace_of(&config_map.metadata);
        Ok(self.config_maps(namespace).create(&PostParams::default(), config_map).await?)
    }

    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        let name = name_of(&config_map.metadata, "ConfigMap")?;
        let namespace = self.namespace_of(&config_map.metadata);
        Ok(self.config_maps(namespace).replace(name, &PostParams::default(), config_map).await?)
    }

    async fn delete_config_map(&self, namespace: &str, name: &str, resource_version: Option<&str>) -> Result<(), StoreError> {
        let dp = DeleteParams {
            preconditions: resource_version.map(|rv| Preconditions {
                resource_version: Some(rv.to_string()),
                uid: None,
            }),
            ..DeleteParams::default()
        };
        self.config_maps(namespace).delete(name, &dp).await?;
        Ok(())
    }

    async fn list_metallbs(&self, namespace: &str) -> Result<Vec<MetalLB>, StoreError> {
        debug!("Listing MetalLBs in {}", namespace);
        self.metallbs(namespace)
            .list(&ListParams::default())
            .await
            .map(|list| list.items)
            .map_err(|e| list_error("MetalLB", e))
    }

    async fn get_metallb(&self, namespace: &str, name: &str) -> Result<Option<MetalLB>, StoreError> {
        Ok(self.metallbs(namespace).get_opt(name).await?)
    }

    async fn create_metallb(&self, metallb: &MetalLB) -> Result<MetalLB, StoreError> {
        let namespace = self.namespace_of(&metallb.metadata);
        Ok(self.metallbs(namespace).create(&PostParams::default(), metallb).await?)
    }

    async fn delete_metallb(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.metallbs(namespace).delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn patch_metallb_status(&self, metallb: &MetalLB) -> Result<MetalLB, StoreError> {
        let name = name_of(&metallb.metadata, "MetalLB")?;
        let namespace = self.namespace_of(&metallb.metadata);
        let patch = status_patch(metallb.metadata.resource_version.as_deref(), &metallb.status)?;
        Ok(self
            .metallbs(namespace)
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }

    fn watch_address_pools(&self) -> WatchStream<AddressPool> {
        let api = self.address_pools(&self.watch_namespace);
        map_watch(watcher(api, watcher::Config::default()).default_backoff())
    }

    fn watch_metallbs(&self) -> WatchStream<MetalLB> {
        let api = self.metallbs(&self.watch_namespace);
        map_watch(watcher(api, watcher::Config::default()).default_backoff())
    }
}
