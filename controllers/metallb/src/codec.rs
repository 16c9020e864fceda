//! Config codec.
//!
//! Converts AddressPool resources into entries of the merged MetalLB
//! configuration and back and forth between that configuration and the YAML
//! text stored in the ConfigMap.
//!
//! ```yaml
//! address-pools:
//! - name: addresspool2
//!   protocol: layer2
//!   auto-assign: false
//!   addresses:
//!   - 2.2.2.1
//!   - 2.2.2.100
//! ```
//!
//! `auto-assign` is only written when it is `false`; decoding treats an
//! explicit `true` as absent so both spellings compare equal.

use crds::{AddressPool, CrdError, Protocol};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use thiserror::Error;

/// Errors produced while validating pools or (de)serializing the configuration
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("address pool has no name")]
    MissingName,

    #[error("address pool {pool}: {source}")]
    Protocol {
        pool: String,
        #[source]
        source: CrdError,
    },

    #[error("address pool {pool}: invalid address '{address}': {reason}")]
    InvalidAddress {
        pool: String,
        address: String,
        reason: String,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// One pool as MetalLB sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    pub name: String,
    pub protocol: Protocol,
    #[serde(rename = "auto-assign", default, skip_serializing_if = "Option::is_none")]
    pub auto_assign: Option<bool>,
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl PoolEntry {
    /// Validate a pool and convert it into its configuration entry
    pub fn from_pool(pool: &AddressPool) -> Result<Self, CodecError> {
        let name = pool
            .metadata
            .name
            .clone()
            .filter(|n| !n.is_empty())
            .ok_or(CodecError::MissingName)?;
        let protocol = pool
            .spec
            .protocol
            .parse::<Protocol>()
            .map_err(|source| CodecError::Protocol {
                pool: name.clone(),
                source,
            })?;
        for address in &pool.spec.addresses {
            validate_address(address).map_err(|reason| CodecError::InvalidAddress {
                pool: name.clone(),
                address: address.clone(),
                reason,
            })?;
        }

        Ok(Self {
            name,
            protocol,
            auto_assign: normalize_auto_assign(pool.spec.auto_assign),
            addresses: pool.spec.addresses.clone(),
        })
    }
}

/// The merged configuration artifact
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedConfig {
    #[serde(rename = "address-pools", default)]
    pub address_pools: Vec<PoolEntry>,
}

impl MergedConfig {
    /// Build the canonical configuration: entries ordered by pool name
    pub fn new(mut entries: Vec<PoolEntry>) -> Self {
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            address_pools: entries,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.address_pools.is_empty()
    }
}

/// Serialize the configuration to the YAML text stored in the ConfigMap
pub fn encode(config: &MergedConfig) -> Result<String, CodecError> {
    Ok(serde_yaml::to_string(config)?)
}

/// Parse stored YAML text back into a configuration
pub fn decode(text: &str) -> Result<MergedConfig, CodecError> {
    let mut config: MergedConfig = serde_yaml::from_str(text)?;
    for entry in &mut config.address_pools {
        entry.auto_assign = normalize_auto_assign(entry.auto_assign);
    }
    Ok(config)
}

/// Whether stored text already describes `desired`
///
/// Formatting is irrelevant; text that does not decode is never equal.
pub fn semantically_equal(stored: &str, desired: &MergedConfig) -> bool {
    decode(stored).is_ok_and(|current| &current == desired)
}

/// `auto-assign` defaults to true, so only an explicit false is kept
fn normalize_auto_assign(value: Option<bool>) -> Option<bool> {
    value.filter(|assign| !assign)
}

/// Accepts `IP`, `IP/prefix` and `IP-IP` (same family, ascending)
fn validate_address(address: &str) -> Result<(), String> {
    let address = address.trim();
    if address.is_empty() {
        return Err("empty address".to_string());
    }

    if let Some((ip, prefix)) = address.split_once('/') {
        let ip = parse_ip(ip)?;
        let prefix: u8 = prefix
            .trim()
            .parse()
            .map_err(|_| format!("prefix length '{}' is not a number", prefix))?;
        let max = if ip.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(format!("prefix length {} exceeds {}", prefix, max));
        }
        return Ok(());
    }

    if let Some((start, end)) = address.split_once('-') {
        let start = parse_ip(start)?;
        let end = parse_ip(end)?;
        if start.is_ipv4() != end.is_ipv4() {
            return Err("range mixes IPv4 and IPv6".to_string());
        }
        if start > end {
            return Err(format!("range start {} is after end {}", start, end));
        }
        return Ok(());
    }

    parse_ip(address).map(|_| ())
}

fn parse_ip(text: &str) -> Result<IpAddr, String> {
    text.trim()
        .parse::<IpAddr>()
        .map_err(|_| format!("'{}' is not an IP address", text.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::AddressPoolSpec;

    fn pool(name: &str, protocol: &str, addresses: &[&str], auto_assign: Option<bool>) -> AddressPool {
        AddressPool::new(
            name,
            AddressPoolSpec {
                protocol: protocol.to_string(),
                addresses: addresses.iter().map(|a| a.to_string()).collect(),
                auto_assign,
            },
        )
    }

    fn entry(name: &str, addresses: &[&str], auto_assign: Option<bool>) -> PoolEntry {
        PoolEntry {
            name: name.to_string(),
            protocol: Protocol::Layer2,
            auto_assign,
            addresses: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn test_encode_matches_metallb_layout() {
        let config = MergedConfig::new(vec![
            entry("addresspool2", &["2.2.2.1", "2.2.2.100"], Some(false)),
            entry("addresspool1", &["1.1.1.1", "1.1.1.100"], None),
        ]);
        let text = encode(&config).unwrap();
        assert_eq!(
            text,
            "address-pools:\n\
             - name: addresspool1\n  protocol: layer2\n  addresses:\n  - 1.1.1.1\n  - 1.1.1.100\n\
             - name: addresspool2\n  protocol: layer2\n  auto-assign: false\n  addresses:\n  - 2.2.2.1\n  - 2.2.2.100\n"
        );
    }

    #[test]
    fn test_auto_assign_default_is_omitted() {
        let default = PoolEntry::from_pool(&pool("p1", "layer2", &["1.1.1.1"], None)).unwrap();
        let explicit_true = PoolEntry::from_pool(&pool("p1", "layer2", &["1.1.1.1"], Some(true))).unwrap();
        let disabled = PoolEntry::from_pool(&pool("p1", "layer2", &["1.1.1.1"], Some(false))).unwrap();

        assert_eq!(default, explicit_true);
        assert!(!encode(&MergedConfig::new(vec![default])).unwrap().contains("auto-assign"));
        assert!(encode(&MergedConfig::new(vec![disabled]))
            .unwrap()
            .contains("auto-assign: false"));
    }

    #[test]
    fn test_semantic_equality_ignores_formatting() {
        let desired = MergedConfig::new(vec![entry("addresspool1", &["1.1.1.1", "1.1.1.100"], None)]);
        let stored = r#"
address-pools:
  - addresses: ["1.1.1.1", "1.1.1.100"]
    protocol: layer2
    auto-assign: true
    name: addresspool1
"#;
        assert!(semantically_equal(stored, &desired));
    }

    #[test]
    fn test_semantic_equality_detects_changes() {
        let desired = MergedConfig::new(vec![entry("addresspool1", &["1.1.1.1", "1.1.1.200"], Some(false))]);
        let stale = "address-pools:\n- name: addresspool1\n  protocol: layer2\n  addresses:\n  - 1.1.1.1\n  - 1.1.1.100\n";
        assert!(!semantically_equal(stale, &desired));
        assert!(!semantically_equal("address-pools: {not: a list}", &desired));
    }

    #[test]
    fn test_address_order_is_preserved() {
        let entry = PoolEntry::from_pool(&pool("p", "layer2", &["10.0.0.9", "10.0.0.1"], None)).unwrap();
        assert_eq!(entry.addresses, vec!["10.0.0.9", "10.0.0.1"]);
    }

    #[test]
    fn test_valid_address_forms() {
        for address in [
            "1.1.1.1",
            "10.0.0.0/24",
            "0.0.0.0/0",
            "1.1.1.1-1.1.1.100",
            "1.1.1.1 - 1.1.1.100",
            "2001:db8::1",
            "2001:db8::/64",
            "2001:db8::1-2001:db8::ff",
        ] {
            assert!(validate_address(address).is_ok(), "{}", address);
        }
    }

    #[test]
    fn test_invalid_address_forms() {
        for address in [
            "",
            "not-an-ip",
            "1.1.1",
            "10.0.0.0/33",
            "2001:db8::/129",
            "10.0.0.0/abc",
            "1.1.1.100-1.1.1.1",
            "1.1.1.1-2001:db8::1",
        ] {
            assert!(validate_address(address).is_err(), "{}", address);
        }
    }

    #[test]
    fn test_invalid_pools_are_rejected() {
        assert!(matches!(
            PoolEntry::from_pool(&pool("p", "bgp", &["1.1.1.1"], None)),
            Err(CodecError::Protocol { .. })
        ));
        assert!(matches!(
            PoolEntry::from_pool(&pool("p", "layer2", &["1.1.1.1", "300.1.1.1"], None)),
            Err(CodecError::InvalidAddress { .. })
        ));
        assert!(matches!(
            PoolEntry::from_pool(&pool("", "layer2", &[], None)),
            Err(CodecError::MissingName)
        ));
    }

    #[test]
    fn test_empty_address_list_is_valid() {
        let entry = PoolEntry::from_pool(&pool("empty", "layer2", &[], None)).unwrap();
        assert!(entry.addresses.is_empty());
    }
}
