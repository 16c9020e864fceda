//! MetalLB Operator CRD Definitions
//!
//! Kubernetes Custom Resource Definitions and shared status types for the
//! MetalLB operator controllers.

pub mod address_pool;
pub mod condition;
pub mod consts;
pub mod error;
pub mod metallb;

pub use address_pool::*;
pub use condition::*;
pub use consts::*;
pub use error::CrdError;
pub use metallb::*;
