//! Resource store errors

use thiserror::Error;

/// Errors that can occur when talking to the resource store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Optimistic concurrency check failed (stale resourceVersion, or the
    /// object was created by someone else first)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The resource kind is not served by the API server (CRD missing)
    #[error("Resource kind not registered: {0}")]
    KindNotRegistered(String),

    /// Store could not be reached or returned a server-side failure
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Object cannot be written as given (e.g. no name)
    #[error("Invalid object: {0}")]
    InvalidObject(String),

    /// Watch stream failed
    #[error("Watch error: {0}")]
    Watch(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(kube::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Errors that can never succeed on retry
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::KindNotRegistered(_))
    }
}

impl From<kube::Error> for StoreError {
    fn from(error: kube::Error) -> Self {
        match error {
            kube::Error::Api(ae) if ae.code == 409 => StoreError::Conflict(ae.message),
            kube::Error::Api(ae) if ae.code == 404 => StoreError::NotFound(ae.message),
            kube::Error::Api(ae) if ae.code >= 500 => StoreError::Unavailable(ae.message),
            other => StoreError::Kube(other),
        }
    }
}
