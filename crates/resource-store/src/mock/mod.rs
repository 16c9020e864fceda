//! Mock resource store for unit testing
//!
//! In-memory implementation of [`ResourceStoreTrait`] that behaves like the
//! API server where the operator depends on it:
//! - every write bumps a global resourceVersion counter
//! - writes carrying a stale resourceVersion fail with `Conflict`
//! - `replace` keeps the stored status, status writes keep the stored spec
//! - watches replay existing objects as `Added` before streaming live events
//!
//! It also exposes fault injection (conflicts, unregistered kinds) and write
//! counters so tests can assert idempotence.
//!
//! The mock is organized into per-kind modules:
//! - `address_pools.rs` - AddressPool operations
//! - `config_maps.rs` - ConfigMap operations
//! - `metallbs.rs` - MetalLB operations

mod address_pools;
mod config_maps;
mod metallbs;

use crate::error::StoreError;
use crate::models::{ObjectKey, WatchEvent, WatchStream};
use crate::store_trait::ResourceStoreTrait;
use crds::{AddressPool, MetalLB};
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Mock resource store for testing
#[derive(Clone)]
pub struct MockResourceStore {
    pub(crate) address_pools: Arc<Mutex<HashMap<ObjectKey, AddressPool>>>,
    pub(crate) config_maps: Arc<Mutex<HashMap<ObjectKey, ConfigMap>>>,
    pub(crate) metallbs: Arc<Mutex<HashMap<ObjectKey, MetalLB>>>,
    pub(crate) address_pool_events: broadcast::Sender<WatchEvent<AddressPool>>,
    pub(crate) metallb_events: broadcast::Sender<WatchEvent<MetalLB>>,
    // Counter for resourceVersion and uid generation
    pub(crate) next_version: Arc<AtomicU64>,
    // Fault injection
    pub(crate) pending_config_map_conflicts: Arc<AtomicUsize>,
    pub(crate) pending_status_conflicts: Arc<AtomicUsize>,
    pub(crate) address_pool_kind_registered: Arc<AtomicBool>,
    pub(crate) metallb_kind_registered: Arc<AtomicBool>,
    // Successful write counters
    pub(crate) config_map_writes: Arc<AtomicUsize>,
    pub(crate) status_writes: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockResourceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockResourceStore")
            .field("config_map_writes", &self.config_map_writes())
            .field("status_writes", &self.status_writes())
            .finish_non_exhaustive()
    }
}

impl Default for MockResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResourceStore {
    /// Create an empty mock store with every kind registered
    pub fn new() -> Self {
        let (address_pool_events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (metallb_events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            address_pools: Arc::new(Mutex::new(HashMap::new())),
            config_maps: Arc::new(Mutex::new(HashMap::new())),
            metallbs: Arc::new(Mutex::new(HashMap::new())),
            address_pool_events,
            metallb_events,
            next_version: Arc::new(AtomicU64::new(1)),
            pending_config_map_conflicts: Arc::new(AtomicUsize::new(0)),
            pending_status_conflicts: Arc::new(AtomicUsize::new(0)),
            address_pool_kind_registered: Arc::new(AtomicBool::new(true)),
            metallb_kind_registered: Arc::new(AtomicBool::new(true)),
            config_map_writes: Arc::new(AtomicUsize::new(0)),
            status_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add an AddressPool to the mock store (for test setup)
    pub fn add_address_pool(&self, pool: AddressPool) -> Result<AddressPool, StoreError> {
        address_pools::insert(self, pool)
    }

    /// Add a ConfigMap to the mock store without counting it as an operator write
    pub fn add_config_map(&self, config_map: ConfigMap) -> Result<ConfigMap, StoreError> {
        config_maps::insert(self, config_map)
    }

    /// Add a MetalLB to the mock store (for test setup)
    pub fn add_metallb(&self, metallb: MetalLB) -> Result<MetalLB, StoreError> {
        metallbs::insert(self, metallb)
    }

    /// Current stored AddressPool, if any
    pub fn address_pool(&self, namespace: &str, name: &str) -> Option<AddressPool> {
        lock(&self.address_pools).get(&ObjectKey::new(namespace, name)).cloned()
    }

    /// Current stored ConfigMap, if any
    pub fn config_map(&self, namespace: &str, name: &str) -> Option<ConfigMap> {
        lock(&self.config_maps).get(&ObjectKey::new(namespace, name)).cloned()
    }

    /// Current stored MetalLB, if any
    pub fn metallb(&self, namespace: &str, name: &str) -> Option<MetalLB> {
        lock(&self.metallbs).get(&ObjectKey::new(namespace, name)).cloned()
    }

    /// Make the next `count` ConfigMap writes fail with `Conflict`
    ///
    /// Each injected conflict also bumps the stored object's resourceVersion,
    /// as if another writer got there first.
    pub fn fail_next_config_map_writes_with_conflict(&self, count: usize) {
        self.pending_config_map_conflicts.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` status writes fail with `Conflict`
    pub fn fail_next_status_writes_with_conflict(&self, count: usize) {
        self.pending_status_conflicts.store(count, Ordering::SeqCst);
    }

    /// Simulate the AddressPool CRD being absent from the cluster
    pub fn set_address_pool_kind_registered(&self, registered: bool) {
        self.address_pool_kind_registered.store(registered, Ordering::SeqCst);
    }

    /// Simulate the MetalLB CRD being absent from the cluster
    pub fn set_metallb_kind_registered(&self, registered: bool) {
        self.metallb_kind_registered.store(registered, Ordering::SeqCst);
    }

    /// Successful ConfigMap creates, replaces and deletes so far
    pub fn config_map_writes(&self) -> usize {
        self.config_map_writes.load(Ordering::SeqCst)
    }

    /// Successful status writes (any kind) so far
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    pub(crate) fn next_resource_version(&self) -> String {
        self.next_version.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Stamp server-populated metadata on a newly created object
    pub(crate) fn stamp_created(&self, meta: &mut ObjectMeta) {
        let version = self.next_resource_version();
        meta.uid = Some(format!("uid-{}", version));
        meta.resource_version = Some(version);
        meta.generation = Some(1);
    }

    /// Stamp server-populated metadata on a replaced object
    pub(crate) fn stamp_replaced(&self, meta: &mut ObjectMeta, stored: &ObjectMeta) {
        meta.uid = stored.uid.clone();
        meta.generation = Some(stored.generation.unwrap_or(0) + 1);
        meta.resource_version = Some(self.next_resource_version());
    }

    pub(crate) fn take_config_map_conflict(&self) -> bool {
        take_one(&self.pending_config_map_conflicts)
    }

    pub(crate) fn take_status_conflict(&self) -> bool {
        take_one(&self.pending_status_conflicts)
    }

    pub(crate) fn ensure_address_pool_kind(&self) -> Result<(), StoreError> {
        if self.address_pool_kind_registered.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::KindNotRegistered("AddressPool".to_string()))
        }
    }

    pub(crate) fn ensure_metallb_kind(&self) -> Result<(), StoreError> {
        if self.metallb_kind_registered.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::KindNotRegistered("MetalLB".to_string()))
        }
    }
}

/// Lock a mutex, recovering the data if a panicking test poisoned it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Namespaced key of an object being written; name and namespace are required
pub(crate) fn key_of(meta: &ObjectMeta, kind: &str) -> Result<ObjectKey, StoreError> {
    match (&meta.namespace, &meta.name) {
        (Some(namespace), Some(name)) => Ok(ObjectKey::new(namespace.clone(), name.clone())),
        _ => Err(StoreError::InvalidObject(format!(
            "{} requires metadata.namespace and metadata.name",
            kind
        ))),
    }
}

/// Optimistic concurrency check; `None` means an unconditional write
pub(crate) fn check_resource_version(
    kind: &str,
    key: &ObjectKey,
    stored: &ObjectMeta,
    expected: Option<&str>,
) -> Result<(), StoreError> {
    match expected {
        Some(expected) if stored.resource_version.as_deref() != Some(expected) => {
            Err(StoreError::Conflict(format!(
                "{} {} has resourceVersion {}, not {}",
                kind,
                key,
                stored.resource_version.as_deref().unwrap_or("<none>"),
                expected
            )))
        }
        _ => Ok(()),
    }
}

/// Replay `snapshot` as `Added`, then forward live events from `receiver`
///
/// The receiver must be subscribed before the snapshot is taken so that no
/// write falls between the two.
pub(crate) fn replay_then_follow<K>(
    snapshot: Vec<K>,
    receiver: broadcast::Receiver<WatchEvent<K>>,
) -> WatchStream<K>
where
    K: Clone + Send + 'static,
{
    let replay = futures::stream::iter(snapshot.into_iter().map(|obj| Ok(WatchEvent::Added(obj))));
    let live = futures::stream::unfold(receiver, |mut receiver| async move {
        match receiver.recv().await {
            Ok(event) => Some((Ok(event), receiver)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => Some((
                Err(StoreError::Watch(format!("watch fell behind by {} events", skipped))),
                receiver,
            )),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    });
    replay.chain(live).boxed()
}

/// Stream for a kind the API server does not serve: one error, then silence
pub(crate) fn unregistered_watch<K: Send + 'static>(kind: &str) -> WatchStream<K> {
    let error = StoreError::Watch(format!("{}: the server could not find the requested resource", kind));
    futures::stream::once(async move { Err(error) })
        .chain(futures::stream::pending())
        .boxed()
}

#[async_trait::async_trait]
impl ResourceStoreTrait for MockResourceStore {
    // AddressPool operations - delegated to address_pools module
    async fn list_address_pools(&self, namespace: &str) -> Result<Vec<AddressPool>, StoreError> {
        address_pools::list_address_pools(self, namespace).await
    }

    async fn get_address_pool(&self, namespace: &str, name: &str) -> Result<Option<AddressPool>, StoreError> {
        address_pools::get_address_pool(self, namespace, name).await
    }

    async fn create_address_pool(&self, pool: &AddressPool) -> Result<AddressPool, StoreError> {
        address_pools::create_address_pool(self, pool).await
    }

    async fn replace_address_pool(&self, pool: &AddressPool) -> Result<AddressPool, StoreError> {
        address_pools::replace_address_pool(self, pool).await
    }

    async fn delete_address_pool(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        address_pools::delete_address_pool(self, namespace, name).await
    }

    async fn patch_address_pool_status(&self, pool: &AddressPool) -> Result<AddressPool, StoreError> {
        address_pools::patch_address_pool_status(self, pool).await
    }

    // ConfigMap operations - delegated to config_maps module
    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError> {
        config_maps::get_config_map(self, namespace, name).await
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        config_maps::create_config_map(self, config_map).await
    }

    async fn replace_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
        config_maps::replace_config_map(self, config_map).await
    }

    async fn delete_config_map(&self, namespace: &str, name: &str, resource_version: Option<&str>) -> Result<(), StoreError> {
        config_maps::delete_config_map(self, namespace, name, resource_version).await
    }

    // MetalLB operations - delegated to metallbs module
    async fn list_metallbs(&self, namespace: &str) -> Result<Vec<MetalLB>, StoreError> {
        metallbs::list_metallbs(self, namespace).await
    }

    async fn get_metallb(&self, namespace: &str, name: &str) -> Result<Option<MetalLB>, StoreError> {
        metallbs::get_metallb(self, namespace, name).await
    }

    async fn create_metallb(&self, metallb: &MetalLB) -> Result<MetalLB, StoreError> {
        metallbs::create_metallb(self, metallb).await
    }

    async fn delete_metallb(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        metallbs::delete_metallb(self, namespace, name).await
    }

    async fn patch_metallb_status(&self, metallb: &MetalLB) -> Result<MetalLB, StoreError> {
        metallbs::patch_metallb_status(self, metallb).await
    }

    fn watch_address_pools(&self) -> WatchStream<AddressPool> {
        address_pools::watch_address_pools(self)
    }

    fn watch_metallbs(&self) -> WatchStream<MetalLB> {
        metallbs::watch_metallbs(self)
    }
}

#[cfg(test)]
mod tests;
