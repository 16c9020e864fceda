//! Status reporter
//!
//! Writes a target condition set onto a resource's status. Every attempt
//! starts from a fresh read so the write carries a current resourceVersion;
//! on a conflict the same target conditions are applied again to the newer
//! object, up to `max_conflict_retries` attempts.

use super::Reconciler;
use crate::error::ControllerError;
use crds::{merge_conditions, AddressPool, AddressPoolStatus, Condition, MetalLB, MetalLBStatus};
use resource_store::{ResourceStoreTrait, StoreError};
use tracing::{debug, info};

/// A resource kind whose status carries conditions
#[async_trait::async_trait]
pub trait ConditionedResource: Clone + Send + Sync + Sized {
    const KIND: &'static str;

    fn conditions(&self) -> &[Condition];
    fn set_conditions(&mut self, conditions: Vec<Condition>);

    async fn fetch(store: &dyn ResourceStoreTrait, namespace: &str, name: &str) -> Result<Option<Self>, StoreError>;
    async fn write_status(store: &dyn ResourceStoreTrait, resource: &Self) -> Result<Self, StoreError>;
}

#[async_trait::async_trait]
impl ConditionedResource for AddressPool {
    const KIND: &'static str = "AddressPool";

    fn conditions(&self) -> &[Condition] {
        AddressPool::conditions(self)
    }

    fn set_conditions(&mut self, conditions: Vec<Condition>) {
        self.status.get_or_insert_with(AddressPoolStatus::default).conditions = conditions;
    }

    async fn fetch(store: &dyn ResourceStoreTrait, namespace: &str, name: &str) -> Result<Option<Self>, StoreError> {
        store.get_address_pool(namespace, name).await
    }

    async fn write_status(store: &dyn ResourceStoreTrait, resource: &Self) -> Result<Self, StoreError> {
        store.patch_address_pool_status(resource).await
    }
}

#[async_trait::async_trait]
impl ConditionedResource for MetalLB {
    const KIND: &'static str = "MetalLB";

    fn conditions(&self) -> &[Condition] {
        MetalLB::conditions(self)
    }

    fn set_conditions(&mut self, conditions: Vec<Condition>) {
        self.status.get_or_insert_with(MetalLBStatus::default).conditions = conditions;
    }

    async fn fetch(store: &dyn ResourceStoreTrait, namespace: &str, name: &str) -> Result<Option<Self>, StoreError> {
        store.get_metallb(namespace, name).await
    }

    async fn write_status(store: &dyn ResourceStoreTrait, resource: &Self) -> Result<Self, StoreError> {
        store.patch_metallb_status(resource).await
    }
}

impl Reconciler {
    /// Apply `desired` conditions to the resource's status
    ///
    /// Returns `true` when a write happened, `false` when the resource is gone
    /// or already carries the same observations.
    pub async fn report_conditions<R: ConditionedResource>(
        &self,
        namespace: &str,
        name: &str,
        desired: &[Condition],
    ) -> Result<bool, ControllerError> {
        let attempts = self.config.max_conflict_retries;
        for attempt in 1..=attempts {
            let Some(mut current) = R::fetch(self.store.as_ref(), namespace, name).await? else {
                debug!("{} {}/{} is gone, skipping status update", R::KIND, namespace, name);
                return Ok(false);
            };
            let Some(merged) = merge_conditions(current.conditions(), desired) else {
                debug!("{} {}/{} status already up to date", R::KIND, namespace, name);
                return Ok(false);
            };
            current.set_conditions(merged);

            match R::write_status(self.store.as_ref(), &current).await {
                Ok(_) => {
                    info!("Updated {} {}/{} status conditions", R::KIND, namespace, name);
                    return Ok(true);
                }
                Err(e) if e.is_conflict() => {
                    debug!(
                        "Status write for {} {}/{} conflicted (attempt {}/{}), retrying",
                        R::KIND, namespace, name, attempt, attempts
                    );
                }
                Err(e) if e.is_not_found() => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }

        Err(ControllerError::ConflictRetriesExhausted {
            resource: format!("{} {}/{} status", R::KIND, namespace, name),
            attempts,
        })
    }
}
