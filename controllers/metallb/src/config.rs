//! Operator configuration.
//!
//! Read once at startup from environment variables. Every value has a
//! default; a value that is present but unparsable is an error rather than
//! silently falling back.

use crate::error::ControllerError;
use crds::DEFAULT_OPERATOR_NAMESPACE;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_RESYNC_INTERVAL_SECS: u64 = 300;
const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 5;
const DEFAULT_BACKOFF_MIN_SECS: u64 = 1;
const DEFAULT_BACKOFF_MAX_SECS: u64 = 60;
const DEFAULT_HEALTH_PROBE_BIND_ADDRESS: &str = "0.0.0.0:8081";

/// Runtime settings for the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Namespace watched for AddressPool and MetalLB resources
    pub namespace: String,
    /// Requeue period for namespace rebuilds and pending MetalLB instances
    pub resync_interval: Duration,
    /// Attempts per reconcile before a version conflict becomes an error
    pub max_conflict_retries: u32,
    /// Lower bound of the per-key failure backoff
    pub backoff_min: Duration,
    /// Upper bound of the per-key failure backoff
    pub backoff_max: Duration,
    /// Listen address of the health and metrics server
    pub health_probe_bind_address: SocketAddr,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_OPERATOR_NAMESPACE.to_string(),
            resync_interval: Duration::from_secs(DEFAULT_RESYNC_INTERVAL_SECS),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            backoff_min: Duration::from_secs(DEFAULT_BACKOFF_MIN_SECS),
            backoff_max: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
            health_probe_bind_address: SocketAddr::from(([0, 0, 0, 0], 8081)),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let namespace = lookup("WATCH_NAMESPACE")
            .or_else(|| lookup("OPERATOR_NAMESPACE"))
            .filter(|ns| !ns.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OPERATOR_NAMESPACE.to_string());

        let resync_secs: u64 = parse_var(&lookup, "RESYNC_INTERVAL_SECS", DEFAULT_RESYNC_INTERVAL_SECS)?;
        let max_conflict_retries: u32 = parse_var(&lookup, "MAX_CONFLICT_RETRIES", DEFAULT_MAX_CONFLICT_RETRIES)?;
        let backoff_min_secs: u64 = parse_var(&lookup, "BACKOFF_MIN_SECS", DEFAULT_BACKOFF_MIN_SECS)?;
        let backoff_max_secs: u64 = parse_var(&lookup, "BACKOFF_MAX_SECS", DEFAULT_BACKOFF_MAX_SECS)?;
        let bind_address = lookup("HEALTH_PROBE_BIND_ADDRESS")
            .unwrap_or_else(|| DEFAULT_HEALTH_PROBE_BIND_ADDRESS.to_string());
        let health_probe_bind_address = bind_address.parse::<SocketAddr>().map_err(|e| {
            ControllerError::InvalidConfig(format!(
                "HEALTH_PROBE_BIND_ADDRESS '{}' is not a socket address: {}",
                bind_address, e
            ))
        })?;

        if resync_secs == 0 {
            return Err(ControllerError::InvalidConfig(
                "RESYNC_INTERVAL_SECS must be greater than 0".to_string(),
            ));
        }
        if max_conflict_retries == 0 {
            return Err(ControllerError::InvalidConfig(
                "MAX_CONFLICT_RETRIES must be at least 1".to_string(),
            ));
        }
        if backoff_min_secs == 0 || backoff_min_secs > backoff_max_secs {
            return Err(ControllerError::InvalidConfig(format!(
                "backoff bounds must satisfy 0 < BACKOFF_MIN_SECS <= BACKOFF_MAX_SECS (got {} and {})",
                backoff_min_secs, backoff_max_secs
            )));
        }

        Ok(Self {
            namespace,
            resync_interval: Duration::from_secs(resync_secs),
            max_conflict_retries,
            backoff_min: Duration::from_secs(backoff_min_secs),
            backoff_max: Duration::from_secs(backoff_max_secs),
            health_probe_bind_address,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ControllerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            ControllerError::InvalidConfig(format!("{} '{}' is invalid: {}", key, raw, e))
        }),
    }
}
