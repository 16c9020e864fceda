//! MetalLB operations for MockResourceStore

use super::{check_resource_version, key_of, lock, replay_then_follow, unregistered_watch, MockResourceStore};
use crate::error::StoreError;
use crate::models::{ObjectKey, WatchEvent, WatchStream};
use crds::MetalLB;
use std::sync::atomic::Ordering;

pub(crate) fn insert(store: &MockResourceStore, metallb: MetalLB) -> Result<MetalLB, StoreError> {
    let key = key_of(&metallb.metadata, "MetalLB")?;
    let mut metallbs = lock(&store.metallbs);
    if metallbs.contains_key(&key) {
        return Err(StoreError::Conflict(format!("MetalLB {} already exists", key)));
    }
    let mut created = metallb;
    store.stamp_created(&mut created.metadata);
    metallbs.insert(key, created.clone());
    let _ = store.metallb_events.send(WatchEvent::Added(created.clone()));
    Ok(created)
}

pub async fn list_metallbs(store: &MockResourceStore, namespace: &str) -> Result<Vec<MetalLB>, StoreError> {
    store.ensure_metallb_kind()?;
    Ok(lock(&store.metallbs)
        .iter()
        .filter(|(key, _)| key.namespace == namespace)
        .map(|(_, metallb)| metallb.clone())
        .collect())
}

pub async fn get_metallb(store: &MockResourceStore, namespace: &str, name: &str) -> Result<Option<MetalLB>, StoreError> {
    store.ensure_metallb_kind()?;
    Ok(lock(&store.metallbs).get(&ObjectKey::new(namespace, name)).cloned())
}

pub async fn create_metallb(store: &MockResourceStore, metallb: &MetalLB) -> Result<MetalLB, StoreError> {
    store.ensure_metallb_kind()?;
    insert(store, metallb.clone())
}

pub async fn delete_metallb(store: &MockResourceStore, namespace: &str, name: &str) -> Result<(), StoreError> {
    store.ensure_metallb_kind()?;
    let key = ObjectKey::new(namespace, name);
    let removed = lock(&store.metallbs)
        .remove(&key)
        .ok_or_else(|| StoreError::NotFound(format!("MetalLB {} not found", key)))?;
    let _ = store.metallb_events.send(WatchEvent::Deleted(removed));
    Ok(())
}

pub async fn patch_metallb_status(store: &MockResourceStore, metallb: &MetalLB) -> Result<MetalLB, StoreError> {
    store.ensure_metallb_kind()?;
    let key = key_of(&metallb.metadata, "MetalLB")?;
    let mut metallbs = lock(&store.metallbs);
    let stored = metallbs
        .get_mut(&key)
        .ok_or_else(|| StoreError::NotFound(format!("MetalLB {} not found", key)))?;

    if store.take_status_conflict() {
        stored.metadata.resource_version = Some(store.next_resource_version());
        return Err(StoreError::Conflict(format!("MetalLB {} status was modified concurrently", key)));
    }
    check_resource_version("MetalLB", &key, &stored.metadata, metallb.metadata.resource_version.as_deref())?;

    stored.status = metallb.status.clone();
    stored.metadata.resource_version = Some(store.next_resource_version());
    store.status_writes.fetch_add(1, Ordering::SeqCst);
    let updated = stored.clone();
    let _ = store.metallb_events.send(WatchEvent::Modified(updated.clone()));
    Ok(updated)
}

pub fn watch_metallbs(store: &MockResourceStore) -> WatchStream<MetalLB> {
    if store.ensure_metallb_kind().is_err() {
        return unregistered_watch("metallbs.metallb.io");
    }
    let metallbs = lock(&store.metallbs);
    let receiver = store.metallb_events.subscribe();
    let snapshot = metallbs.values().cloned().collect();
    drop(metallbs);
    replay_then_follow(snapshot, receiver)
}
