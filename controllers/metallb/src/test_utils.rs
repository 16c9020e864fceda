//! Test utilities for unit testing reconcilers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::health::Metrics;
use crate::reconciler::metallb::{DependencyProbe, DependencyStatus, NoDependencies};
use crate::reconciler::Reconciler;
use crds::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use resource_store::MockResourceStore;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_NAMESPACE: &str = "metallb-system";

/// Configuration with a small backoff window so retry delays are easy to assert
pub fn create_test_config() -> OperatorConfig {
    OperatorConfig {
        namespace: TEST_NAMESPACE.to_string(),
        resync_interval: Duration::from_secs(300),
        max_conflict_retries: 5,
        backoff_min: Duration::from_secs(1),
        backoff_max: Duration::from_secs(4),
        ..Default::default()
    }
}

/// Reconciler over the given mock store, wired with a probe that is always ready
pub fn create_test_reconciler(store: MockResourceStore) -> (Reconciler, MockResourceStore) {
    create_test_reconciler_with_probe(store, Arc::new(NoDependencies))
}

pub fn create_test_reconciler_with_probe(
    store: MockResourceStore,
    probe: Arc<dyn DependencyProbe>,
) -> (Reconciler, MockResourceStore) {
    let reconciler = Reconciler::new(
        Arc::new(store.clone()),
        probe,
        create_test_config(),
        Metrics::new().unwrap(),
    );
    (reconciler, store)
}

/// Helper to create test AddressPool CRD
pub fn create_test_address_pool(
    name: &str,
    namespace: &str,
    addresses: &[&str],
    auto_assign: Option<bool>,
) -> AddressPool {
    AddressPool {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: AddressPoolSpec {
            protocol: "layer2".to_string(),
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
            auto_assign,
        },
        status: None,
    }
}

/// Helper to create test MetalLB CRD
pub fn create_test_metallb(name: &str, namespace: &str) -> MetalLB {
    MetalLB {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        spec: MetalLBSpec::default(),
        status: None,
    }
}

/// Dependency probe that never reports ready
#[derive(Debug, Clone)]
pub struct NotReadyProbe(pub String);

#[async_trait::async_trait]
impl DependencyProbe for NotReadyProbe {
    async fn check(&self, _metallb: &MetalLB) -> Result<DependencyStatus, ControllerError> {
        Ok(DependencyStatus::NotReady(self.0.clone()))
    }
}
