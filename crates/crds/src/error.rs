//! CRD-level errors

use thiserror::Error;

/// Errors raised while interpreting CRD field values
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CrdError {
    /// Protocol string is not one the operator knows how to render
    #[error("unsupported protocol '{0}', expected one of: layer2")]
    UnsupportedProtocol(String),
}
