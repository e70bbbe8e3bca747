//! Token deployments used when pricing a resource.
//!
//! A server quoting `"$0.01"` needs to know which token contract to ask for,
//! how many decimals it has, and which EIP-712 domain the client must sign
//! against. That knowledge is configuration data held in an [`AssetRegistry`].

use std::collections::HashMap;

use alloy_primitives::{Address, address};
use serde::{Deserialize, Serialize};

/// EIP-712 domain name and version of a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eip712Info {
    /// Domain name (e.g. `"USD Coin"`).
    pub name: String,
    /// Domain version (e.g. `"2"`).
    pub version: String,
}

/// A token deployment on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
    /// Token contract address.
    pub address: Address,
    /// Number of decimals of the token.
    pub decimals: u8,
    /// EIP-712 domain of the token.
    pub eip712: Eip712Info,
}

impl AssetInfo {
    /// The `extra` object to put in payment requirements for this token.
    #[must_use]
    pub fn requirements_extra(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.eip712.name,
            "version": self.eip712.version,
        })
    }
}

/// USDC on Base mainnet.
pub const USDC_BASE: Address = address!("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// USDC on Base Sepolia.
pub const USDC_BASE_SEPOLIA: Address = address!("0x036CbD53842c5426634e7929541eC2318f3dCF7e");

/// Default EIP-712 domain version for USDC.
pub const DEFAULT_USDC_VERSION: &str = "2";

/// Default token decimals for USDC.
pub const DEFAULT_USDC_DECIMALS: u8 = 6;

/// Default token per network name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRegistry {
    by_network: HashMap<String, AssetInfo>,
}

impl Default for AssetRegistry {
    /// USDC on `base` and `base-sepolia`.
    fn default() -> Self {
        Self::empty()
            .with_asset(
                "base",
                AssetInfo {
                    address: USDC_BASE,
                    decimals: DEFAULT_USDC_DECIMALS,
                    eip712: Eip712Info {
                        name: "USD Coin".to_owned(),
                        version: DEFAULT_USDC_VERSION.to_owned(),
                    },
                },
            )
            .with_asset(
                "base-sepolia",
                AssetInfo {
                    address: USDC_BASE_SEPOLIA,
                    decimals: DEFAULT_USDC_DECIMALS,
                    eip712: Eip712Info {
                        name: "USDC".to_owned(),
                        version: DEFAULT_USDC_VERSION.to_owned(),
                    },
                },
            )
    }
}

impl AssetRegistry {
    /// Creates a registry with no deployments.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            by_network: HashMap::new(),
        }
    }

    /// Adds or replaces the deployment for `network`.
    #[must_use]
    pub fn with_asset(mut self, network: impl Into<String>, asset: AssetInfo) -> Self {
        self.by_network.insert(network.into(), asset);
        self
    }

    /// Merges `other` into `self`; `other` wins on conflicts.
    pub fn extend(&mut self, other: Self) {
        self.by_network.extend(other.by_network);
    }

    /// Returns the deployment configured for `network`.
    #[must_use]
    pub fn get(&self, network: &str) -> Option<&AssetInfo> {
        self.by_network.get(network)
    }
}
