//! Network name resolution.
//!
//! V1 messages name networks (`"base"`, `"base-sepolia"`). Signing needs the
//! EIP-155 chain id, so a [`NetworkRegistry`] maps one to the other.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A well-known network and its EIP-155 chain id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// V1 network name.
    pub name: &'static str,
    /// EIP-155 chain id.
    pub chain_id: u64,
}

/// Networks every registry starts with.
pub const EVM_NETWORKS: &[NetworkInfo] = &[
    NetworkInfo { name: "base", chain_id: 8453 },
    NetworkInfo { name: "base-sepolia", chain_id: 84532 },
    NetworkInfo { name: "avalanche", chain_id: 43114 },
    NetworkInfo { name: "avalanche-fuji", chain_id: 43113 },
    NetworkInfo { name: "polygon", chain_id: 137 },
    NetworkInfo { name: "polygon-amoy", chain_id: 80002 },
    NetworkInfo { name: "ethereum", chain_id: 1 },
    NetworkInfo { name: "sepolia", chain_id: 11_155_111 },
    NetworkInfo { name: "iotex", chain_id: 4689 },
    NetworkInfo { name: "sei", chain_id: 1329 },
    NetworkInfo { name: "sei-testnet", chain_id: 1328 },
];

/// Maps network names to chain ids and back.
///
/// [`NetworkRegistry::default`] knows [`EVM_NETWORKS`]; deployments add their
/// own entries with [`NetworkRegistry::with_network`] or by deserializing a
/// `{ "name": chainId }` map and merging it in.
///
/// ```
/// use x402_core::networks::NetworkRegistry;
///
/// let registry = NetworkRegistry::default().with_network("my-devnet", 31337);
/// assert_eq!(registry.chain_id("base-sepolia"), Some(84532));
/// assert_eq!(registry.chain_id("my-devnet"), Some(31337));
/// assert_eq!(registry.chain_id("eip155:10"), Some(10));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NetworkRegistry {
    by_name: HashMap<String, u64>,
}

impl Default for NetworkRegistry {
    fn default() -> Self {
        Self::from_networks(EVM_NETWORKS)
    }
}

impl NetworkRegistry {
    /// Creates a registry with no named networks.
    ///
    /// Numeric and `eip155:` identifiers still resolve.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    /// Creates a registry holding exactly `networks`.
    #[must_use]
    pub fn from_networks(networks: &[NetworkInfo]) -> Self {
        let by_name = networks
            .iter()
            .map(|n| (n.name.to_owned(), n.chain_id))
            .collect();
        Self { by_name }
    }

    /// Adds or replaces a named network.
    #[must_use]
    pub fn with_network(mut self, name: impl Into<String>, chain_id: u64) -> Self {
        self.by_name.insert(name.into(), chain_id);
        self
    }

    /// Merges every entry of `other` into `self`; `other` wins on conflicts.
    pub fn extend(&mut self, other: Self) {
        self.by_name.extend(other.by_name);
    }

    /// Resolves a network identifier to its chain id.
    ///
    /// Accepts a registered name, a bare chain id (`"84532"`) or a CAIP-2
    /// identifier (`"eip155:84532"`).
    #[must_use]
    pub fn chain_id(&self, network: &str) -> Option<u64> {
        if let Some(id) = self.by_name.get(network) {
            return Some(*id);
        }
        let reference = network.strip_prefix("eip155:").unwrap_or(network);
        reference.parse().ok()
    }

    /// Returns a registered name for `chain_id`.
    ///
    /// When several names share a chain id the lexicographically first wins.
    #[must_use]
    pub fn name(&self, chain_id: u64) -> Option<&str> {
        self.by_name
            .iter()
            .filter(|(_, id)| **id == chain_id)
            .map(|(name, _)| name.as_str())
            .min()
    }
}
