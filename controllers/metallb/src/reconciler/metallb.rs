//! MetalLB identity validator
//!
//! Only the instance named `metallb` is honoured. Every instance is judged
//! on its own name and its own conditions, so an invalid instance never
//! changes the state of the valid one.

use super::Reconciler;
use crate::error::ControllerError;
use crds::{
    is_condition_true, Condition, MetalLB, CONDITION_AVAILABLE, CONDITION_DEGRADED, CONDITION_PROGRESSING,
    CONDITION_UPGRADEABLE, METALLB_RESOURCE_NAME,
};
use kube_runtime::controller::Action;
use resource_store::ObjectKey;
use tracing::{debug, info, warn};

pub const REASON_INCORRECT_NAME: &str = "IncorrectMetalLBResourceName";
pub const REASON_DEPENDENCIES_NOT_READY: &str = "DependenciesNotReady";
pub const REASON_AVAILABLE: &str = "MetalLBAvailable";

/// Observable state of a MetalLB instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityState {
    /// Not yet validated, or waiting for dependencies
    Pending,
    /// Canonical instance with every dependency ready
    Available,
    /// Instance the operator refuses to act on
    Degraded,
}

impl IdentityState {
    /// Derive the state recorded in an instance's conditions
    pub fn from_conditions(conditions: &[Condition]) -> Self {
        if is_condition_true(conditions, CONDITION_DEGRADED) {
            IdentityState::Degraded
        } else if is_condition_true(conditions, CONDITION_AVAILABLE) {
            IdentityState::Available
        } else {
            IdentityState::Pending
        }
    }

    /// What the controller does with the instance afterwards
    pub fn action(self, resync: std::time::Duration) -> Action {
        match self {
            IdentityState::Pending => Action::requeue(resync),
            IdentityState::Available | IdentityState::Degraded => Action::await_change(),
        }
    }
}

/// Full condition set for the canonical, ready instance
pub fn available_conditions() -> Vec<Condition> {
    vec![
        Condition::new(CONDITION_AVAILABLE, true, REASON_AVAILABLE, "MetalLB is available"),
        Condition::new(CONDITION_PROGRESSING, false, REASON_AVAILABLE, ""),
        Condition::new(CONDITION_DEGRADED, false, REASON_AVAILABLE, ""),
        Condition::new(CONDITION_UPGRADEABLE, true, REASON_AVAILABLE, ""),
    ]
}

/// Full condition set for the canonical instance while dependencies settle
pub fn pending_conditions(message: &str) -> Vec<Condition> {
    vec![
        Condition::new(CONDITION_AVAILABLE, false, REASON_DEPENDENCIES_NOT_READY, message),
        Condition::new(CONDITION_PROGRESSING, true, REASON_DEPENDENCIES_NOT_READY, message),
        Condition::new(CONDITION_DEGRADED, false, REASON_DEPENDENCIES_NOT_READY, ""),
        Condition::new(CONDITION_UPGRADEABLE, false, REASON_DEPENDENCIES_NOT_READY, message),
    ]
}

/// Full condition set for an instance with the wrong name
pub fn degraded_conditions(name: &str) -> Vec<Condition> {
    let message = format!(
        "MetalLB resource name must be '{}', found '{}'",
        METALLB_RESOURCE_NAME, name
    );
    vec![
        Condition::new(CONDITION_AVAILABLE, false, REASON_INCORRECT_NAME, message.clone()),
        Condition::new(CONDITION_PROGRESSING, false, REASON_INCORRECT_NAME, ""),
        Condition::new(CONDITION_DEGRADED, true, REASON_INCORRECT_NAME, message.clone()),
        Condition::new(CONDITION_UPGRADEABLE, false, REASON_INCORRECT_NAME, message),
    ]
}

/// Result of checking the external dependencies of a MetalLB instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyStatus {
    Ready,
    NotReady(String),
}

/// Checks whatever the data plane needs before an instance counts as available
#[async_trait::async_trait]
pub trait DependencyProbe: Send + Sync {
    async fn check(&self, metallb: &MetalLB) -> Result<DependencyStatus, ControllerError>;
}

/// Probe for deployments with nothing to wait on
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependencies;

#[async_trait::async_trait]
impl DependencyProbe for NoDependencies {
    async fn check(&self, _metallb: &MetalLB) -> Result<DependencyStatus, ControllerError> {
        Ok(DependencyStatus::Ready)
    }
}

impl Reconciler {
    /// Validate one MetalLB instance and record the verdict on its status
    ///
    /// Returns `None` when the instance no longer exists.
    pub async fn reconcile_metallb(&self, key: &ObjectKey) -> Result<Option<IdentityState>, ControllerError> {
        let Some(metallb) = self.store.get_metallb(&key.namespace, &key.name).await? else {
            info!("MetalLB {} was deleted, nothing to do", key);
            return Ok(None);
        };
        let recorded = IdentityState::from_conditions(metallb.conditions());

        if key.name != METALLB_RESOURCE_NAME {
            if recorded == IdentityState::Degraded {
                debug!("MetalLB {} already marked degraded", key);
                return Ok(Some(IdentityState::Degraded));
            }
            warn!(
                "MetalLB {} has an incorrect name, only '{}' is honoured",
                key, METALLB_RESOURCE_NAME
            );
            self.report_conditions::<MetalLB>(&key.namespace, &key.name, &degraded_conditions(&key.name))
                .await?;
            return Ok(Some(IdentityState::Degraded));
        }

        let (state, conditions) = match self.probe.check(&metallb).await? {
            DependencyStatus::Ready => (IdentityState::Available, available_conditions()),
            DependencyStatus::NotReady(reason) => {
                info!("MetalLB {} waiting on dependencies: {}", key, reason);
                (IdentityState::Pending, pending_conditions(&reason))
            }
        };
        if self.report_conditions::<MetalLB>(&key.namespace, &key.name, &conditions).await? {
            info!("MetalLB {} is {:?}", key, state);
        }
        Ok(Some(state))
    }
}
