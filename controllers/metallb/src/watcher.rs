//! Kubernetes resource watchers.
//!
//! Both pipelines run on `kube_runtime::Controller`, which owns event
//! deduplication, one reconcile at a time per object, requeues and watch
//! reconnection:
//!
//! - AddressPool: a `Controller<Namespace>` scoped to the operator namespace.
//!   Every pool event maps onto that namespace, so removing the last pool
//!   still triggers a rebuild.
//! - MetalLB: a `Controller<MetalLB>` keyed by the instance itself.
//!
//! Transient failures are retried with a per-object Fibonacci backoff. A
//! fatal error stops only the pipeline that hit it and marks readiness failed.

use crate::error::ControllerError;
use crate::health::HealthState;
use crate::reconciler::Reconciler;
use crds::{AddressPool, MetalLB};
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, ResourceExt};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{
    controller::{self, Action, Config as ControllerConfig},
    watcher, Controller,
};
use resource_store::{ObjectKey, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const ADDRESS_POOL_PIPELINE: &str = "addresspool";
pub const METALLB_PIPELINE: &str = "metallb";

/// Result item of a running controller
type ControllerResult<T> = Result<T, controller::Error<ControllerError, watcher::Error>>;

// Debounce batches the status writes the aggregator makes on its own pools
fn controller_config() -> ControllerConfig {
    ControllerConfig::default()
        .debounce(Duration::from_secs(1))
        .concurrency(3)
}

/// Watch AddressPools and keep the operator namespace's merged ConfigMap current
pub async fn watch_address_pools(
    namespaces: Api<Namespace>,
    pools: Api<AddressPool>,
    reconciler: Arc<Reconciler>,
    health: HealthState,
) -> Result<(), ControllerError> {
    let namespace = reconciler.namespace().to_string();
    info!("Starting AddressPool watcher for namespace {}", namespace);

    let results = Controller::new(
        namespaces,
        watcher::Config::default().fields(&format!("metadata.name={}", namespace)),
    )
    .watches(pools, watcher::Config::default(), |pool: AddressPool| {
        pool.namespace().map(|ns| ObjectRef::<Namespace>::new(&ns))
    })
    .with_config(controller_config())
    .run(
        reconcile_namespace,
        |namespace: Arc<Namespace>, error: &ControllerError, ctx: Arc<Reconciler>| {
            retry_after_error(ADDRESS_POOL_PIPELINE, &namespace.name_any(), error, &ctx)
        },
        reconciler,
    );

    drive(ADDRESS_POOL_PIPELINE, results, &health).await
}

/// Watch MetalLB instances and validate each against the singleton identity
pub async fn watch_metallbs(
    metallbs: Api<MetalLB>,
    reconciler: Arc<Reconciler>,
    health: HealthState,
) -> Result<(), ControllerError> {
    info!("Starting MetalLB watcher for namespace {}", reconciler.namespace());

    let results = Controller::new(metallbs, watcher::Config::default())
        .with_config(controller_config())
        .run(
            reconcile_metallb_instance,
            |metallb: Arc<MetalLB>, error: &ControllerError, ctx: Arc<Reconciler>| {
                let key = instance_key(&metallb, &ctx);
                retry_after_error(METALLB_PIPELINE, &key.to_string(), error, &ctx)
            },
            reconciler,
        );

    drive(METALLB_PIPELINE, results, &health).await
}

/// Rebuild the merged ConfigMap of the triggering namespace
async fn reconcile_namespace(namespace: Arc<Namespace>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let name = namespace.name_any();
    let outcome = ctx.reconcile_address_pools(&name).await?;
    debug!("Address pools in {} reconciled: {:?}", name, outcome);

    ctx.reset_error(&backoff_key(ADDRESS_POOL_PIPELINE, &name));
    ctx.metrics.record_reconcile(ADDRESS_POOL_PIPELINE, "success");
    // Periodic pass corrects edits made to the ConfigMap by other writers
    Ok(Action::requeue(ctx.config.resync_interval))
}

async fn reconcile_metallb_instance(metallb: Arc<MetalLB>, ctx: Arc<Reconciler>) -> Result<Action, ControllerError> {
    let key = instance_key(&metallb, &ctx);
    let action = match ctx.reconcile_metallb(&key).await? {
        Some(state) => state.action(ctx.config.resync_interval),
        None => Action::await_change(),
    };

    ctx.reset_error(&backoff_key(METALLB_PIPELINE, &key.to_string()));
    ctx.metrics.record_reconcile(METALLB_PIPELINE, "success");
    Ok(action)
}

fn instance_key(metallb: &MetalLB, ctx: &Reconciler) -> ObjectKey {
    let namespace = metallb.namespace().unwrap_or_else(|| ctx.namespace().to_string());
    ObjectKey::new(namespace, metallb.name_any())
}

fn backoff_key(pipeline: &str, key: &str) -> String {
    format!("{}/{}", pipeline, key)
}

/// Error policy shared by both controllers
///
/// Transient errors requeue after the object's next Fibonacci delay. Fatal
/// errors are not retried; `drive` stops the pipeline when it sees them.
fn retry_after_error(pipeline: &str, key: &str, error: &ControllerError, ctx: &Reconciler) -> Action {
    if error.is_fatal() {
        ctx.metrics.record_reconcile(pipeline, "fatal");
        error!("Fatal error reconciling {} {}: {}", pipeline, key, error);
        return Action::await_change();
    }

    let backoff_key = backoff_key(pipeline, key);
    ctx.increment_error(&backoff_key);
    let (delay, error_count) = ctx.get_backoff_for_resource(&backoff_key);
    ctx.metrics.record_reconcile(pipeline, "error");
    warn!(
        "Reconciling {} {} failed (error {}), retrying in {:?}: {}",
        pipeline, key, error_count, delay, error
    );
    Action::requeue(delay)
}

/// A list that 404s means the CRD is not installed
fn kind_not_registered(error: &watcher::Error) -> bool {
    matches!(
        error,
        watcher::Error::InitialListFailed(kube::Error::Api(status)) if status.code == 404
    )
}

/// Consume a controller's results until a fatal error or the end of the stream
///
/// Either way the pipeline is marked failed on the readiness endpoint.
async fn drive<T, S>(pipeline: &'static str, results: S, health: &HealthState) -> Result<(), ControllerError>
where
    S: Stream<Item = ControllerResult<T>>,
{
    let mut results = std::pin::pin!(results);
    while let Some(result) = results.next().await {
        let fatal = match result {
            Ok(_) => None,
            Err(controller::Error::ReconcilerFailed(e, _)) if e.is_fatal() => Some(e),
            Err(controller::Error::QueueError(e)) if kind_not_registered(&e) => {
                Some(ControllerError::Store(StoreError::KindNotRegistered(e.to_string())))
            }
            Err(e) => {
                debug!("{} controller: {}", pipeline, e);
                None
            }
        };
        if let Some(e) = fatal {
            error!("Stopping {} pipeline: {}", pipeline, e);
            health.mark_failed(pipeline, e.to_string());
            return Err(e);
        }
    }

    let e = ControllerError::Watch(format!("{} controller stream ended", pipeline));
    health.mark_failed(pipeline, e.to_string());
    Err(e)
}
