//! AddressPool CRD
//!
//! Declares a pool of addresses MetalLB may hand out to LoadBalancer
//! services. Every AddressPool in a namespace is folded into that
//! namespace's MetalLB ConfigMap by the operator.

use crate::condition::Condition;
use crate::error::CrdError;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "metallb.io",
    version = "v1alpha1",
    kind = "AddressPool",
    namespaced,
    status = "AddressPoolStatus",
    printcolumn = r#"{"name":"Protocol", "type":"string", "jsonPath":".spec.protocol"}"#,
    printcolumn = r#"{"name":"Auto Assign", "type":"boolean", "jsonPath":".spec.autoAssign"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct AddressPoolSpec {
    /// Announcement protocol (currently only "layer2")
    pub protocol: String,

    /// Address ranges, CIDRs or single addresses, in the order MetalLB
    /// should consider them
    #[serde(default)]
    pub addresses: Vec<String>,

    /// Whether MetalLB may assign from this pool automatically (default true)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_assign: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressPoolStatus {
    /// Whether the pool made it into the merged configuration
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Announcement protocols MetalLB understands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Layer2,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Layer2 => "layer2",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = CrdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "layer2" => Ok(Protocol::Layer2),
            other => Err(CrdError::UnsupportedProtocol(other.to_string())),
        }
    }
}

impl AddressPool {
    /// Conditions currently recorded on the pool, empty when no status yet
    pub fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or_default()
    }

    /// Whether the pool is on its way out and must not be merged
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
