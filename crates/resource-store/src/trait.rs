//! ResourceStore trait for mocking
//!
//! This trait abstracts the Kubernetes API so the reconcilers can be unit
//! tested against an in-memory store. The concrete `KubeResourceStore`
//! implements it for a live cluster.
//!
//! Write operations use `metadata.resourceVersion` of the object passed in
//! as an optimistic-concurrency precondition and return
//! [`StoreError::Conflict`] when it is stale.

use crate::error::StoreError;
use crate::models::WatchStream;
use crds::{AddressPool, MetalLB};
use k8s_openapi::api::core::v1::ConfigMap;

/// Trait for resource store operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ResourceStoreTrait: Send + Sync {
    // AddressPool operations
    async fn list_address_pools(&self, namespace: &str) -> Result<Vec<AddressPool>, StoreError>;
    async fn get_address_pool(&self, namespace: &str, name: &str) -> Result<Option<AddressPool>, StoreError>;
    async fn create_address_pool(&self, pool: &AddressPool) -> Result<AddressPool, StoreError>;
    async fn replace_address_pool(&self, pool: &AddressPool) -> Result<AddressPool, StoreError>;
    async fn delete_address_pool(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
    /// Status-only write; `spec` of the passed object is ignored
    async fn patch_address_pool_status(&self, pool: &AddressPool) -> Result<AddressPool, StoreError>;

    // ConfigMap operations (the merged configuration artifact)
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError>;
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError>;
    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError>;
    /// Deletes only if the stored resourceVersion still matches `resource_version`
    async fn delete_config_map(&self, namespace: &str, name: &str, resource_version: Option<&str>) -> Result<(), StoreError>;

    // MetalLB operations
    async fn list_metallbs(&self, namespace: &str) -> Result<Vec<MetalLB>, StoreError>;
    async fn get_metallb(&self, namespace: &str, name: &str) -> Result<Option<MetalLB>, StoreError>;
    async fn create_metallb(&self, metallb: &MetalLB) -> Result<MetalLB, StoreError>;
    async fn delete_metallb(&self, namespace: &str, name: &str) -> Result<(), StoreError>;
    /// Status-only write; `spec` of the passed object is ignored
    async fn patch_metallb_status(&self, metallb: &MetalLB) -> Result<MetalLB, StoreError>;

    // Watches
    fn watch_address_pools(&self) -> WatchStream<AddressPool>;
    fn watch_metallbs(&self) -> WatchStream<MetalLB>;
}
