//! Controller-specific error types.
//!
//! This module defines error types specific to the MetalLB operator
//! that are not covered by upstream library errors.

use crate::codec::CodecError;
use kube::Error as KubeError;
use resource_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the MetalLB operator.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes client setup error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Resource store error
    #[error("Resource store error: {0}")]
    Store(#[from] StoreError),

    /// Merged configuration could not be encoded
    #[error("Config codec error: {0}")]
    Codec(#[from] CodecError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Optimistic concurrency retries ran out
    #[error("Gave up on {resource} after {attempts} conflicting writes")]
    ConflictRetriesExhausted { resource: String, attempts: u32 },

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Health server I/O error
    #[error("Health server error: {0}")]
    Health(#[from] std::io::Error),
}

impl ControllerError {
    /// Errors a retry can never fix; the pipeline that hit one stops
    pub fn is_fatal(&self) -> bool {
        match self {
            ControllerError::Store(e) => e.is_fatal(),
            ControllerError::InvalidConfig(_) => true,
            _ => false,
        }
    }
}
