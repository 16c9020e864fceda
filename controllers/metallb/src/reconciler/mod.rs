//! Reconciliation logic for the MetalLB operator CRDs.
//!
//! - `address_pool`: folds every AddressPool of a namespace into the MetalLB ConfigMap
//! - `metallb`: validates MetalLB instances against the singleton identity
//! - `status`: condition writes shared by both

pub mod address_pool;
pub mod metallb;
#[cfg(test)]
mod metallb_test;
pub mod status;

use crate::backoff::FibonacciBackoff;
use crate::config::OperatorConfig;
use crate::health::Metrics;
use metallb::DependencyProbe;
use resource_store::ResourceStoreTrait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min: Duration, max: Duration) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min.as_secs(), max.as_secs()),
            error_count: 0,
        }
    }

    fn increment_error(&mut self) {
        self.error_count += 1;
    }
}

/// Reconciles MetalLB operator resources.
pub struct Reconciler {
    pub(crate) store: Arc<dyn ResourceStoreTrait>,
    pub(crate) probe: Arc<dyn DependencyProbe>,
    pub(crate) config: OperatorConfig,
    pub(crate) metrics: Metrics,
    /// Error count tracking per key (pipeline/key -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a new reconciler.
    pub fn new(
        store: Arc<dyn ResourceStoreTrait>,
        probe: Arc<dyn DependencyProbe>,
        config: OperatorConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            probe,
            config,
            metrics,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Namespace the operator watches
    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Get the Fibonacci backoff duration for a resource based on its error count
    ///
    /// Returns (backoff, error_count)
    pub fn get_backoff_for_resource(&self, resource_key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(|| BackoffState::new(self.config.backoff_min, self.config.backoff_max));
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using maximum backoff", e);
                (self.config.backoff_max, 0)
            }
        }
    }

    /// Increment error count for a resource
    pub fn increment_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states
                .entry(resource_key.to_string())
                .or_insert_with(|| BackoffState::new(self.config.backoff_min, self.config.backoff_max))
                .increment_error();
        }
    }

    /// Forget a resource's backoff state (on successful reconciliation)
    pub fn reset_error(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_backoffs(&self) -> usize {
        self.backoff_states.lock().map(|states| states.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use crate::test_utils::create_test_reconciler;
    use resource_store::MockResourceStore;

    #[test]
    fn test_backoff_grows_and_resets_per_key() {
        let (reconciler, _) = create_test_reconciler(MockResourceStore::new());

        reconciler.increment_error("addresspool/metallb-system");
        let (first, count) = reconciler.get_backoff_for_resource("addresspool/metallb-system");
        assert_eq!(count, 1);
        reconciler.get_backoff_for_resource("addresspool/metallb-system");
        let (third, _) = reconciler.get_backoff_for_resource("addresspool/metallb-system");
        assert!(third > first);

        // Other keys are unaffected
        let (other, count) = reconciler.get_backoff_for_resource("metallb/metallb-system/metallb");
        assert_eq!(other, first);
        assert_eq!(count, 0);

        reconciler.reset_error("addresspool/metallb-system");
        assert_eq!(reconciler.tracked_backoffs(), 1);
        let (after_reset, count) = reconciler.get_backoff_for_resource("addresspool/metallb-system");
        assert_eq!(after_reset, first);
        assert_eq!(count, 0);
    }
}
