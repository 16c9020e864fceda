//! Versioned resource store for the MetalLB operator
//!
//! The operator only ever talks to the cluster through [`ResourceStoreTrait`]:
//! reads of AddressPool, MetalLB and ConfigMap objects, guarded writes that
//! carry `metadata.resourceVersion`, status-only writes, and change streams.
//!
//! # Example
//!
//! ```no_run
//! use resource_store::{KubeResourceStore, ResourceStoreTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeResourceStore::new(client, "metallb-system");
//!
//! let pools = store.list_address_pools("metallb-system").await?;
//! println!("{} address pools", pools.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Implementations
//!
//! - **KubeResourceStore**: live API server via kube `Api<K>` and `kube_runtime::watcher`
//! - **MockResourceStore** (`test-util` feature): in-memory store with
//!   resourceVersion tracking, replayed watches and fault injection

pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeResourceStore;
pub use error::StoreError;
pub use models::*;
pub use store_trait::ResourceStoreTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockResourceStore;
