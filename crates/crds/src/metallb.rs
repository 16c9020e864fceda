//! MetalLB CRD
//!
//! Top-level operator configuration. Exactly one instance named
//! [`METALLB_RESOURCE_NAME`](crate::consts::METALLB_RESOURCE_NAME) is
//! honoured; any other instance is reported as degraded.

use crate::condition::Condition;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "metallb.io",
    version = "v1beta1",
    kind = "MetalLB",
    namespaced,
    status = "MetalLBStatus",
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MetalLBSpec {
    /// Log level passed to the MetalLB components (e.g. "info", "debug")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Node selector for the speaker DaemonSet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_node_selector: Option<BTreeMap<String, String>>,

    /// Node selector for the controller Deployment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_node_selector: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetalLBStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl MetalLB {
    /// Conditions currently recorded on the resource, empty when no status yet
    pub fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map(|s| s.conditions.as_slice()).unwrap_or_default()
    }
}
