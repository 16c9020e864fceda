//! ConfigMap operations for MockResourceStore
//!
//! ConfigMaps are never watched by the operator, so no events are emitted.

use super::{check_resource_version, key_of, lock, MockResourceStore};
use crate::error::StoreError;
use crate::models::ObjectKey;
use k8s_openapi::api::core::v1::ConfigMap;
use std::sync::atomic::Ordering;

pub(crate) fn insert(store: &MockResourceStore, config_map: ConfigMap) -> Result<ConfigMap, StoreError> {
    let key = key_of(&config_map.metadata, "ConfigMap")?;
    let mut config_maps = lock(&store.config_maps);
    if config_maps.contains_key(&key) {
        return Err(StoreError::Conflict(format!("ConfigMap {} already exists", key)));
    }
    let mut created = config_map;
    store.stamp_created(&mut created.metadata);
    config_maps.insert(key, created.clone());
    Ok(created)
}

/// Consume one injected conflict, bumping the stored version like a racing writer would
fn injected_conflict(store: &MockResourceStore, key: &ObjectKey, stored: Option<&mut ConfigMap>) -> Result<(), StoreError> {
    if !store.take_config_map_conflict() {
        return Ok(());
    }
    if let Some(stored) = stored {
        stored.metadata.resource_version = Some(store.next_resource_version());
    }
    Err(StoreError::Conflict(format!("ConfigMap {} was modified concurrently", key)))
}

pub async fn get_config_map(store: &MockResourceStore, namespace: &str, name: &str) -> Result<Option<ConfigMap>, StoreError> {
    Ok(lock(&store.config_maps).get(&ObjectKey::new(namespace, name)).cloned())
}

pub async fn create_config_map(store: &MockResourceStore, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
    let key = key_of(&config_map.metadata, "ConfigMap")?;
    {
        let mut config_maps = lock(&store.config_maps);
        injected_conflict(store, &key, config_maps.get_mut(&key))?;
    }
    let created = insert(store, config_map.clone())?;
    store.config_map_writes.fetch_add(1, Ordering::SeqCst);
    Ok(created)
}

pub async fn replace_config_map(store: &MockResourceStore, config_map: &ConfigMap) -> Result<ConfigMap, StoreError> {
    let key = key_of(&config_map.metadata, "ConfigMap")?;
    let mut config_maps = lock(&store.config_maps);
    let stored = config_maps
        .get_mut(&key)
        .ok_or_else(|| StoreError::NotFound(format!("ConfigMap {} not found", key)))?;
    injected_conflict(store, &key, Some(&mut *stored))?;
    check_resource_version("ConfigMap", &key, &stored.metadata, config_map.metadata.resource_version.as_deref())?;

    let mut replaced = config_map.clone();
    store.stamp_replaced(&mut replaced.metadata, &stored.metadata);
    *stored = replaced.clone();
    store.config_map_writes.fetch_add(1, Ordering::SeqCst);
    Ok(replaced)
}

pub async fn delete_config_map(store: &MockResourceStore, namespace: &str, name: &str, resource_version: Option<&str>) -> Result<(), StoreError> {
    let key = ObjectKey::new(namespace, name);
    let mut config_maps = lock(&store.config_maps);
    let stored = config_maps
        .get_mut(&key)
        .ok_or_else(|| StoreError::NotFound(format!("ConfigMap {} not found", key)))?;
    injected_conflict(store, &key, Some(&mut *stored))?;
    check_resource_version("ConfigMap", &key, &stored.metadata, resource_version)?;

    config_maps.remove(&key);
    store.config_map_writes.fetch_add(1, Ordering::SeqCst);
    Ok(())
}
