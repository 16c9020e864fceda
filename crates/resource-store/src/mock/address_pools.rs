//! AddressPool operations for MockResourceStore

use super::{check_resource_version, key_of, lock, replay_then_follow, unregistered_watch, MockResourceStore};
use crate::error::StoreError;
use crate::models::{ObjectKey, WatchEvent, WatchStream};
use crds::AddressPool;
use std::sync::atomic::Ordering;

pub(crate) fn insert(store: &MockResourceStore, pool: AddressPool) -> Result<AddressPool, StoreError> {
    let key = key_of(&pool.metadata, "AddressPool")?;
    let mut pools = lock(&store.address_pools);
    if pools.contains_key(&key) {
        return Err(StoreError::Conflict(format!("AddressPool {} already exists", key)));
    }
    let mut created = pool;
    store.stamp_created(&mut created.metadata);
    pools.insert(key, created.clone());
    let _ = store.address_pool_events.send(WatchEvent::Added(created.clone()));
    Ok(created)
}

pub async fn list_address_pools(store: &MockResourceStore, namespace: &str) -> Result<Vec<AddressPool>, StoreError> {
    store.ensure_address_pool_kind()?;
    Ok(lock(&store.address_pools)
        .iter()
        .filter(|(key, _)| key.namespace == namespace)
        .map(|(_, pool)| pool.clone())
        .collect())
}

pub async fn get_address_pool(store: &MockResourceStore, namespace: &str, name: &str) -> Result<Option<AddressPool>, StoreError> {
    store.ensure_address_pool_kind()?;
    Ok(lock(&store.address_pools).get(&ObjectKey::new(namespace, name)).cloned())
}

pub async fn create_address_pool(store: &MockResourceStore, pool: &AddressPool) -> Result<AddressPool, StoreError> {
    store.ensure_address_pool_kind()?;
    insert(store, pool.clone())
}

pub async fn replace_address_pool(store: &MockResourceStore, pool: &AddressPool) -> Result<AddressPool, StoreError> {
    store.ensure_address_pool_kind()?;
    let key = key_of(&pool.metadata, "AddressPool")?;
    let mut pools = lock(&store.address_pools);
    let stored = pools
        .get_mut(&key)
        .ok_or_else(|| StoreError::NotFound(format!("AddressPool {} not found", key)))?;
    check_resource_version("AddressPool", &key, &stored.metadata, pool.metadata.resource_version.as_deref())?;

    let mut replaced = pool.clone();
    // Status is a subresource: a main-resource write never changes it
    replaced.status = stored.status.clone();
    store.stamp_replaced(&mut replaced.metadata, &stored.metadata);
    *stored = replaced.clone();
    let _ = store.address_pool_events.send(WatchEvent::Modified(replaced.clone()));
    Ok(replaced)
}

pub async fn delete_address_pool(store: &MockResourceStore, namespace: &str, name: &str) -> Result<(), StoreError> {
    store.ensure_address_pool_kind()?;
    let key = ObjectKey::new(namespace, name);
    let mut pools = lock(&store.address_pools);
    let removed = pools
        .remove(&key)
        .ok_or_else(|| StoreError::NotFound(format!("AddressPool {} not found", key)))?;
    let _ = store.address_pool_events.send(WatchEvent::Deleted(removed));
    Ok(())
}

pub async fn patch_address_pool_status(store: &MockResourceStore, pool: &AddressPool) -> Result<AddressPool, StoreError> {
    store.ensure_address_pool_kind()?;
    let key = key_of(&pool.metadata, "AddressPool")?;
    let mut pools = lock(&store.address_pools);
    let stored = pools
        .get_mut(&key)
        .ok_or_else(|| StoreError::NotFound(format!("AddressPool {} not found", key)))?;

    if store.take_status_conflict() {
        stored.metadata.resource_version = Some(store.next_resource_version());
        return Err(StoreError::Conflict(format!("AddressPool {} status was modified concurrently", key)));
    }
    check_resource_version("AddressPool", &key, &stored.metadata, pool.metadata.resource_version.as_deref())?;

    stored.status = pool.status.clone();
    stored.metadata.resource_version = Some(store.next_resource_version());
    store.status_writes.fetch_add(1, Ordering::SeqCst);
    let updated = stored.clone();
    let _ = store.address_pool_events.send(WatchEvent::Modified(updated.clone()));
    Ok(updated)
}

pub fn watch_address_pools(store: &MockResourceStore) -> WatchStream<AddressPool> {
    if store.ensure_address_pool_kind().is_err() {
        return unregistered_watch("addresspools.metallb.io");
    }
    let pools = lock(&store.address_pools);
    let receiver = store.address_pool_events.subscribe();
    let snapshot = pools.values().cloned().collect();
    drop(pools);
    replay_then_follow(snapshot, receiver)
}
