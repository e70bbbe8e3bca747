//! Static configuration of a payment gate.
//!
//! A [`PaygateConfig`] prices one route (or a set of routes) in a single
//! token. It can be deserialized from any serde format or read from the
//! process environment:
//!
//! | Variable | Field | Default |
//! |---|---|---|
//! | `ADDRESS` | `pay_to` | required |
//! | `AMOUNT` | `amount` (money string) | required |
//! | `NETWORK` | `network` | `base-sepolia` |
//! | `FACILITATOR_URL` | `facilitator_url` | `https://x402.org/facilitator` |
//! | `PAYWALL_PATH` | `path` (`*` or comma-separated paths) | `*` |
//! | `DESCRIPTION` | `description` | empty |
//! | `MAX_DEADLINE_SECONDS` | `max_deadline_seconds` | `60` |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use x402_core::amount::{MoneyAmount, MoneyAmountParseError, TokenAmount};
use x402_core::assets::{AssetInfo, AssetRegistry};
use x402_core::networks::NetworkRegistry;
use x402_core::proto::{EXACT_SCHEME, PaymentRequirements};

use crate::constants::DEFAULT_FACILITATOR_URL;

/// Network quoted when none is configured.
pub const DEFAULT_NETWORK: &str = "base-sepolia";

/// Seconds a signed payment stays valid when not configured.
pub const DEFAULT_MAX_DEADLINE_SECONDS: u64 = 60;

const ENV_PAY_TO: &str = "ADDRESS";
const ENV_AMOUNT: &str = "AMOUNT";
const ENV_NETWORK: &str = "NETWORK";
const ENV_FACILITATOR_URL: &str = "FACILITATOR_URL";
const ENV_PATH: &str = "PAYWALL_PATH";
const ENV_DESCRIPTION: &str = "DESCRIPTION";
const ENV_MAX_DEADLINE_SECONDS: &str = "MAX_DEADLINE_SECONDS";

/// Errors in a gate configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The price cannot be expressed in the token.
    #[error("Invalid amount: {0}")]
    Amount(#[from] MoneyAmountParseError),
    /// The network is not in the registry.
    #[error("Unknown network {0}")]
    UnknownNetwork(String),
    /// No token is configured for the network.
    #[error("No asset configured for network {0}")]
    UnknownAsset(String),
    /// The facilitator URL is unusable.
    #[error("Invalid facilitator URL: {0}")]
    Facilitator(#[from] crate::facilitator::FacilitatorClientError),
    /// A required environment variable is not set.
    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
    /// An environment variable does not parse.
    #[error("Invalid environment variable {name}: {reason}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Price of a gated resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Price {
    /// Base units of the token, given as an integer (`10000`).
    Units(TokenAmount),
    /// A currency amount (`"$0.01"`, `"0.001"`, `0.10`), converted with the
    /// token's decimals.
    Money(MoneyAmount),
}

impl Price {
    /// The price in base units of a token with `decimals` decimals.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyAmountParseError::WrongPrecision`] if a money amount
    /// is finer than the token can represent.
    pub fn to_token_amount(&self, decimals: u8) -> Result<TokenAmount, MoneyAmountParseError> {
        match self {
            Self::Units(units) => Ok(*units),
            Self::Money(money) => money.to_token_amount(decimals),
        }
    }
}

impl FromStr for Price {
    type Err = MoneyAmountParseError;

    /// Strings are always money amounts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MoneyAmount::parse(s).map(Self::Money)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Units(u64),
            Decimal(f64),
            Text(String),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Units(units) => Ok(Self::Units(TokenAmount::from(units))),
            Repr::Decimal(value) => value.to_string().parse().map_err(serde::de::Error::custom),
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Which request paths the gate applies to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PathPattern {
    /// Every path (`"*"`).
    #[default]
    Any,
    /// Exactly this path.
    Exact(String),
    /// Any of these paths.
    Set(Vec<String>),
}

impl PathPattern {
    /// Returns `true` if requests to `path` must pay.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(exact) => exact == path,
            Self::Set(paths) => paths.iter().any(|p| p == path),
        }
    }
}

impl From<&str> for PathPattern {
    fn from(value: &str) -> Self {
        if value == "*" {
            Self::Any
        } else {
            Self::Exact(value.to_owned())
        }
    }
}

impl From<Vec<String>> for PathPattern {
    fn from(value: Vec<String>) -> Self {
        Self::Set(value)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("*"),
            Self::Exact(path) => f.write_str(path),
            Self::Set(paths) => f.write_str(&paths.join(",")),
        }
    }
}

impl<'de> Deserialize<'de> for PathPattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(path) => Self::from(path.as_str()),
            Repr::Many(paths) => Self::Set(paths),
        })
    }
}

/// Configuration of one payment gate.
#[derive(Debug, Clone, Deserialize)]
pub struct PaygateConfig {
    /// Price of the resource.
    pub amount: Price,
    /// Recipient address.
    pub pay_to: String,
    /// Gated paths.
    #[serde(default)]
    pub path: PathPattern,
    /// Human-readable description of the resource.
    #[serde(default)]
    pub description: String,
    /// MIME type of the resource.
    #[serde(default)]
    pub mime_type: String,
    /// Validity window granted to signed payments.
    #[serde(default = "default_max_deadline_seconds")]
    pub max_deadline_seconds: u64,
    /// JSON schema of the resource output.
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    /// Base URL of the facilitator.
    #[serde(default = "default_facilitator_url")]
    pub facilitator_url: String,
    /// Network name or chain id.
    #[serde(default = "default_network")]
    pub network: String,
    /// Fixed resource URL; the request URL is used when unset.
    #[serde(default)]
    pub resource: Option<String>,
    /// Token to charge in, overriding the registry.
    #[serde(default)]
    pub asset: Option<AssetInfo>,
    /// Token per network.
    #[serde(default)]
    pub assets: AssetRegistry,
    /// Network names and chain ids.
    #[serde(default)]
    pub networks: NetworkRegistry,
}

fn default_max_deadline_seconds() -> u64 {
    DEFAULT_MAX_DEADLINE_SECONDS
}

fn default_facilitator_url() -> String {
    DEFAULT_FACILITATOR_URL.to_owned()
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_owned()
}

impl PaygateConfig {
    /// Gate charging `amount` to `pay_to` on every path, with defaults
    /// everywhere else.
    pub fn new(amount: Price, pay_to: impl Into<String>) -> Self {
        Self {
            amount,
            pay_to: pay_to.into(),
            path: PathPattern::Any,
            description: String::new(),
            mime_type: String::new(),
            max_deadline_seconds: DEFAULT_MAX_DEADLINE_SECONDS,
            output_schema: None,
            facilitator_url: default_facilitator_url(),
            network: default_network(),
            resource: None,
            asset: None,
            assets: AssetRegistry::default(),
            networks: NetworkRegistry::default(),
        }
    }

    /// Reads the configuration from the environment, after loading a `.env`
    /// file if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let pay_to = lookup(ENV_PAY_TO).ok_or(ConfigError::MissingEnv(ENV_PAY_TO))?;
        let amount = lookup(ENV_AMOUNT)
            .ok_or(ConfigError::MissingEnv(ENV_AMOUNT))?
            .parse::<Price>()
            .map_err(|e| ConfigError::InvalidEnv {
                name: ENV_AMOUNT,
                reason: e.to_string(),
            })?;

        let mut config = Self::new(amount, pay_to);
        if let Some(network) = lookup(ENV_NETWORK) {
            config.network = network;
        }
        if let Some(url) = lookup(ENV_FACILITATOR_URL) {
            config.facilitator_url = url;
        }
        if let Some(path) = lookup(ENV_PATH) {
            config.path = parse_path_list(&path);
        }
        if let Some(description) = lookup(ENV_DESCRIPTION) {
            config.description = description;
        }
        if let Some(seconds) = lookup(ENV_MAX_DEADLINE_SECONDS) {
            config.max_deadline_seconds =
                seconds.trim().parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::InvalidEnv {
                        name: ENV_MAX_DEADLINE_SECONDS,
                        reason: e.to_string(),
                    }
                })?;
        }
        Ok(config)
    }

    /// Sets the gated paths.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathPattern>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    /// Sets the network.
    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    /// Sets the facilitator base URL.
    #[must_use]
    pub fn with_facilitator_url(mut self, url: impl Into<String>) -> Self {
        self.facilitator_url = url.into();
        self
    }

    /// Fixes the resource URL instead of deriving it from each request.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Charges in `asset` whatever the registry says.
    #[must_use]
    pub fn with_asset(mut self, asset: AssetInfo) -> Self {
        self.asset = Some(asset);
        self
    }

    /// The token payments are collected in.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownNetwork`] or
    /// [`ConfigError::UnknownAsset`] if it cannot be determined.
    pub fn resolved_asset(&self) -> Result<(String, &AssetInfo), ConfigError> {
        let network = self.canonical_network()?;
        let asset = match &self.asset {
            Some(asset) => asset,
            None => self
                .assets
                .get(&network)
                .ok_or_else(|| ConfigError::UnknownAsset(network.clone()))?,
        };
        Ok((network, asset))
    }

    /// The registered name of the configured network, which may be given
    /// as a chain id.
    fn canonical_network(&self) -> Result<String, ConfigError> {
        let chain_id = self
            .networks
            .chain_id(&self.network)
            .ok_or_else(|| ConfigError::UnknownNetwork(self.network.clone()))?;
        Ok(self
            .networks
            .name(chain_id)
            .map_or_else(|| self.network.clone(), str::to_owned))
    }

    /// Payment requirements for `resource`.
    ///
    /// The configured resource, if any, takes precedence over `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the network, token or price cannot be
    /// resolved.
    pub fn to_requirements(&self, resource: &str) -> Result<PaymentRequirements, ConfigError> {
        let (network, asset) = self.resolved_asset()?;
        let max_amount_required = self.amount.to_token_amount(asset.decimals)?;
        Ok(PaymentRequirements {
            scheme: EXACT_SCHEME.to_owned(),
            network,
            max_amount_required,
            resource: self.resource.clone().unwrap_or_else(|| resource.to_owned()),
            description: self.description.clone(),
            mime_type: self.mime_type.clone(),
            output_schema: self.output_schema.clone(),
            pay_to: self.pay_to.clone(),
            max_timeout_seconds: self.max_deadline_seconds,
            asset: asset.address.to_string(),
            extra: Some(asset.requirements_extra()),
        })
    }
}

fn parse_path_list(value: &str) -> PathPattern {
    let value = value.trim();
    if value.contains(',') {
        PathPattern::Set(
            value
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    } else {
        PathPattern::from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use x402_core::assets::USDC_BASE_SEPOLIA;

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    #[test]
    fn money_price_uses_token_decimals() {
        let config = PaygateConfig::new("$0.01".parse().unwrap(), PAY_TO);
        let req = config.to_requirements("https://api.example.com/weather").unwrap();
        assert_eq!(req.scheme, "exact");
        assert_eq!(req.network, "base-sepolia");
        assert_eq!(req.max_amount_required, TokenAmount::from(10_000u64));
        assert_eq!(req.asset, USDC_BASE_SEPOLIA.to_string());
        assert_eq!(req.resource, "https://api.example.com/weather");
        assert_eq!(req.max_timeout_seconds, 60);
        let extra = req.exact_extra().unwrap();
        assert_eq!(extra.name, "USDC");
        assert_eq!(extra.version, "2");
    }

    #[test]
    fn chain_id_network_is_canonicalized() {
        let config = PaygateConfig::new(Price::Units(TokenAmount::from(5u64)), PAY_TO)
            .with_network("84532")
            .with_resource("https://fixed.example.com/r");
        let req = config.to_requirements("https://ignored.example.com").unwrap();
        assert_eq!(req.network, "base-sepolia");
        assert_eq!(req.max_amount_required, TokenAmount::from(5u64));
        assert_eq!(req.resource, "https://fixed.example.com/r");
    }

    #[test]
    fn unknown_network_and_asset() {
        let config = PaygateConfig::new("$1".parse().unwrap(), PAY_TO).with_network("mars");
        assert!(matches!(
            config.to_requirements("r"),
            Err(ConfigError::UnknownNetwork(_))
        ));
        let config = PaygateConfig::new("$1".parse().unwrap(), PAY_TO).with_network("polygon");
        assert!(matches!(
            config.to_requirements("r"),
            Err(ConfigError::UnknownAsset(network)) if network == "polygon"
        ));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: PaygateConfig = serde_json::from_value(serde_json::json!({
            "amount": 10000,
            "pay_to": PAY_TO,
            "path": ["/weather", "/premium"]
        }))
        .unwrap();
        assert_eq!(config.amount, Price::Units(TokenAmount::from(10_000u64)));
        assert_eq!(config.network, DEFAULT_NETWORK);
        assert_eq!(config.facilitator_url, DEFAULT_FACILITATOR_URL);
        assert_eq!(config.max_deadline_seconds, 60);
        assert!(config.path.matches("/premium"));
        assert!(!config.path.matches("/free"));

        let config: PaygateConfig = serde_json::from_value(serde_json::json!({
            "amount": 0.10,
            "pay_to": PAY_TO,
            "path": "*"
        }))
        .unwrap();
        assert_eq!(config.amount, Price::Money(MoneyAmount::parse("0.1").unwrap()));
        assert_eq!(config.path, PathPattern::Any);
    }

    #[test]
    fn reads_environment_lookup() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("ADDRESS", PAY_TO),
            ("AMOUNT", "$0.001"),
            ("NETWORK", "base"),
            ("PAYWALL_PATH", "/weather, /premium/content"),
            ("MAX_DEADLINE_SECONDS", "120"),
        ]);
        let config =
            PaygateConfig::from_lookup(|name| vars.get(name).map(|v| (*v).to_owned())).unwrap();
        assert_eq!(config.network, "base");
        assert_eq!(config.max_deadline_seconds, 120);
        assert_eq!(
            config.path,
            PathPattern::Set(vec!["/weather".into(), "/premium/content".into()])
        );
        let req = config.to_requirements("https://example.com/weather").unwrap();
        assert_eq!(req.max_amount_required, TokenAmount::from(1_000u64));
        assert_eq!(req.exact_extra().unwrap().name, "USD Coin");
    }

    #[test]
    fn missing_environment_variable() {
        let err = PaygateConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv("ADDRESS")));
    }
}
