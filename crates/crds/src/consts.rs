//! Well-known names shared by the operator and its consumers.

/// API group of all MetalLB operator CRDs
pub const API_GROUP: &str = "metallb.io";

/// Namespace the operator watches when none is configured
pub const DEFAULT_OPERATOR_NAMESPACE: &str = "metallb-system";

/// The only accepted name for a `MetalLB` resource
pub const METALLB_RESOURCE_NAME: &str = "metallb";

/// Name of the ConfigMap holding the merged MetalLB configuration
pub const METALLB_CONFIG_MAP_NAME: &str = "config";

/// Data key inside the ConfigMap that carries the rendered configuration
pub const METALLB_CONFIG_KEY: &str = "config";

/// Label marking objects written by the operator
pub const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";

/// Value of [`MANAGED_BY_LABEL`]
pub const MANAGED_BY_VALUE: &str = "metallb-operator";
