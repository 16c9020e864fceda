//! Main controller implementation.
//!
//! This module contains the `Controller` struct that wires the resource
//! store, the reconciler, both watchers and the health server.

use crate::config::OperatorConfig;
use crate::error::ControllerError;
use crate::health::{self, HealthState, Metrics};
use crate::reconciler::metallb::NoDependencies;
use crate::reconciler::Reconciler;
use crate::watcher::{watch_address_pools, watch_metallbs};
use crds::{AddressPool, MetalLB};
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client};
use resource_store::KubeResourceStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Main controller for the MetalLB operator.
pub struct Controller {
    address_pool_pipeline: JoinHandle<Result<(), ControllerError>>,
    metallb_pipeline: JoinHandle<Result<(), ControllerError>>,
    health_server: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts its background tasks.
    pub async fn new(config: OperatorConfig) -> Result<Self, ControllerError> {
        info!("Initializing MetalLB operator");

        let client = Client::try_default().await?;
        let namespace = config.namespace.clone();
        let store = KubeResourceStore::new(client.clone(), namespace.clone());

        let metrics = Metrics::new()?;
        let health = HealthState::new();
        let bind_address = config.health_probe_bind_address;
        let reconciler = Arc::new(Reconciler::new(
            Arc::new(store),
            Arc::new(NoDependencies),
            config,
            metrics.clone(),
        ));

        let namespaces: Api<Namespace> = Api::all(client.clone());
        let address_pools: Api<AddressPool> = Api::namespaced(client.clone(), &namespace);
        let metallbs: Api<MetalLB> = Api::namespaced(client, &namespace);

        let address_pool_pipeline = tokio::spawn(watch_address_pools(
            namespaces,
            address_pools,
            Arc::clone(&reconciler),
            health.clone(),
        ));
        let metallb_pipeline = tokio::spawn(watch_metallbs(metallbs, Arc::clone(&reconciler), health.clone()));
        let health_server = tokio::spawn(health::serve(bind_address, health, metrics));

        Ok(Self {
            address_pool_pipeline,
            metallb_pipeline,
            health_server,
        })
    }

    /// Runs the controller until shutdown.
    ///
    /// A pipeline that stops fatally only flips readiness; the process keeps
    /// running until both pipelines are gone, the health server fails, or a
    /// shutdown signal arrives.
    pub async fn run(self) -> Result<(), ControllerError> {
        info!("MetalLB operator running");
        let Controller {
            address_pool_pipeline,
            metallb_pipeline,
            health_server,
        } = self;

        let pipelines = async move {
            let (address_pools, metallbs) = tokio::join!(address_pool_pipeline, metallb_pipeline);
            for (name, result) in [("AddressPool", address_pools), ("MetalLB", metallbs)] {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("{} pipeline exited: {}", name, e),
                    Err(e) => warn!("{} pipeline panicked: {}", name, e),
                }
            }
            ControllerError::Watch("all pipelines stopped".to_string())
        };

        tokio::select! {
            e = pipelines => Err(e),
            result = health_server => {
                result.map_err(|e| ControllerError::Watch(format!("Health server panicked: {}", e)))?
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Shutdown signal received, stopping MetalLB operator");
                Ok(())
            }
        }
    }
}
