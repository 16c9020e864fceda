//! AddressPool aggregator
//!
//! Rebuilds the merged MetalLB configuration of a namespace from the live
//! AddressPool set and writes it to the `config` ConfigMap only when it
//! differs from what is stored. Nothing is cached between runs.

use super::Reconciler;
use crate::codec::{self, MergedConfig, PoolEntry};
use crate::error::ControllerError;
use crds::{
    AddressPool, Condition, CONDITION_AVAILABLE, CONDITION_DEGRADED, MANAGED_BY_LABEL, MANAGED_BY_VALUE,
    METALLB_CONFIG_KEY, METALLB_CONFIG_MAP_NAME,
};
use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use resource_store::StoreError;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub const REASON_MERGED: &str = "Merged";
pub const REASON_INVALID_SPEC: &str = "InvalidSpec";

/// What a namespace reconcile did to the merged ConfigMap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOutcome {
    Created,
    Updated,
    Deleted,
    Unchanged,
    /// No valid pool and no ConfigMap
    Absent,
}

/// Conditions for a pool that made it into the merged configuration
pub fn merged_conditions() -> Vec<Condition> {
    vec![
        Condition::new(CONDITION_AVAILABLE, true, REASON_MERGED, "Address pool is part of the MetalLB configuration"),
        Condition::new(CONDITION_DEGRADED, false, REASON_MERGED, ""),
    ]
}

/// Conditions for a pool whose spec was rejected
pub fn invalid_spec_conditions(message: &str) -> Vec<Condition> {
    vec![
        Condition::new(CONDITION_AVAILABLE, false, REASON_INVALID_SPEC, message),
        Condition::new(CONDITION_DEGRADED, true, REASON_INVALID_SPEC, message),
    ]
}

/// Pool name plus the conditions it should carry after this run
struct PoolVerdict {
    name: String,
    conditions: Vec<Condition>,
}

impl Reconciler {
    /// Bring the namespace's merged ConfigMap in line with its AddressPools
    ///
    /// A version conflict restarts the whole rebuild from a fresh list.
    pub async fn reconcile_address_pools(&self, namespace: &str) -> Result<AggregateOutcome, ControllerError> {
        let attempts = self.config.max_conflict_retries;
        for attempt in 1..=attempts {
            match self.aggregate_once(namespace).await {
                Err(ControllerError::Store(e)) if e.is_conflict() => {
                    warn!(
                        "Conflict writing MetalLB config in {} (attempt {}/{}): {}",
                        namespace, attempt, attempts, e
                    );
                }
                result => return result,
            }
        }

        Err(ControllerError::ConflictRetriesExhausted {
            resource: format!("ConfigMap {}/{}", namespace, METALLB_CONFIG_MAP_NAME),
            attempts,
        })
    }

    async fn aggregate_once(&self, namespace: &str) -> Result<AggregateOutcome, ControllerError> {
        let pools = self.store.list_address_pools(namespace).await?;

        let mut entries = Vec::new();
        let mut verdicts = Vec::new();
        for pool in pools.iter().filter(|p| !p.is_being_deleted()) {
            let name = pool.metadata.name.clone().unwrap_or_default();
            match PoolEntry::from_pool(pool) {
                Ok(entry) => {
                    entries.push(entry);
                    verdicts.push(PoolVerdict {
                        name,
                        conditions: merged_conditions(),
                    });
                }
                Err(e) => {
                    warn!("Excluding address pool {}/{} from MetalLB config: {}", namespace, name, e);
                    if !name.is_empty() {
                        verdicts.push(PoolVerdict {
                            name,
                            conditions: invalid_spec_conditions(&e.to_string()),
                        });
                    }
                }
            }
        }

        let desired = MergedConfig::new(entries);
        let outcome = self.write_config(namespace, &desired).await?;
        self.report_pool_verdicts(namespace, verdicts).await;
        Ok(outcome)
    }

    async fn write_config(&self, namespace: &str, desired: &MergedConfig) -> Result<AggregateOutcome, ControllerError> {
        let current = self.store.get_config_map(namespace, METALLB_CONFIG_MAP_NAME).await?;

        if desired.is_empty() {
            let Some(current) = current else {
                debug!("No address pools in {}, MetalLB config already absent", namespace);
                return Ok(AggregateOutcome::Absent);
            };
            let resource_version = current.metadata.resource_version.as_deref();
            return match self
                .store
                .delete_config_map(namespace, METALLB_CONFIG_MAP_NAME, resource_version)
                .await
            {
                Ok(()) => {
                    self.metrics.record_artifact_write("delete");
                    info!("Deleted MetalLB config {}/{}: no address pools left", namespace, METALLB_CONFIG_MAP_NAME);
                    Ok(AggregateOutcome::Deleted)
                }
                Err(StoreError::NotFound(_)) => Ok(AggregateOutcome::Absent),
                Err(e) => Err(e.into()),
            };
        }

        let text = codec::encode(desired)?;
        match current {
            None => {
                let config_map = ConfigMap {
                    metadata: ObjectMeta {
                        name: Some(METALLB_CONFIG_MAP_NAME.to_string()),
                        namespace: Some(namespace.to_string()),
                        labels: Some(managed_by_labels(None)),
                        ..Default::default()
                    },
                    data: Some(BTreeMap::from([(METALLB_CONFIG_KEY.to_string(), text)])),
                    ..Default::default()
                };
                self.store.create_config_map(&config_map).await?;
                self.metrics.record_artifact_write("create");
                info!(
                    "Created MetalLB config {}/{} with {} address pool(s)",
                    namespace,
                    METALLB_CONFIG_MAP_NAME,
                    desired.address_pools.len()
                );
                Ok(AggregateOutcome::Created)
            }
            Some(current) => {
                let stored = current
                    .data
                    .as_ref()
                    .and_then(|data| data.get(METALLB_CONFIG_KEY))
                    .map(String::as_str)
                    .unwrap_or_default();
                if codec::semantically_equal(stored, desired) {
                    debug!("MetalLB config {}/{} is up to date", namespace, METALLB_CONFIG_MAP_NAME);
                    return Ok(AggregateOutcome::Unchanged);
                }

                // Keeps the stored resourceVersion, so a concurrent writer surfaces as a conflict
                let mut updated = current;
                let labels = managed_by_labels(updated.metadata.labels.take());
                updated.metadata.labels = Some(labels);
                updated
                    .data
                    .get_or_insert_with(BTreeMap::new)
                    .insert(METALLB_CONFIG_KEY.to_string(), text);
                self.store.replace_config_map(&updated).await?;
                self.metrics.record_artifact_write("replace");
                info!(
                    "Updated MetalLB config {}/{} with {} address pool(s)",
                    namespace,
                    METALLB_CONFIG_MAP_NAME,
                    desired.address_pools.len()
                );
                Ok(AggregateOutcome::Updated)
            }
        }
    }

    /// Best effort: a failed status write never fails the namespace
    async fn report_pool_verdicts(&self, namespace: &str, verdicts: Vec<PoolVerdict>) {
        for verdict in verdicts {
            if let Err(e) = self
                .report_conditions::<AddressPool>(namespace, &verdict.name, &verdict.conditions)
                .await
            {
                warn!("Failed to update status of address pool {}/{}: {}", namespace, verdict.name, e);
            }
        }
    }
}

fn managed_by_labels(existing: Option<BTreeMap<String, String>>) -> BTreeMap<String, String> {
    let mut labels = existing.unwrap_or_default();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY_VALUE.to_string());
    labels
}
