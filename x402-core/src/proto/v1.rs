//! Version 1 wire types for the `exact` scheme.
//!
//! V1 identifies networks by name (`"base-sepolia"`) and carries the whole
//! offer in the body of the `402` response.
//!
//! # Key Types
//!
//! - [`PaymentRequirements`] - One acceptable way to pay, set by the seller
//! - [`PaymentRequired`] - The `402` response body
//! - [`PaymentPayload`] - The signed authorization sent in `X-PAYMENT`
//! - [`ExactAuthorization`] - The ERC-3009 transfer that was signed

use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::skip_serializing_none;

use crate::amount::TokenAmount;
use crate::timestamp::UnixTimestamp;

/// The `x402Version` field of every message this engine reads or writes.
///
/// Serializes as the integer `1`. Any other number fails to deserialize, so
/// a message from another protocol generation is a decoding fault rather
/// than a misread payload.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct X402Version1;

impl X402Version1 {
    /// The numeric protocol version.
    pub const VALUE: u8 = 1;
}

impl Serialize for X402Version1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for X402Version1 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let version = u64::deserialize(deserializer)?;
        if version == u64::from(Self::VALUE) {
            Ok(Self)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported x402Version {version}, expected {}",
                Self::VALUE
            )))
        }
    }
}

/// Shorthand for constructing V1 messages.
pub const V1: X402Version1 = X402Version1;

/// The only scheme this engine can sign for.
pub const EXACT_SCHEME: &str = "exact";

/// Payment terms for one acceptable payment option.
///
/// Instances are immutable once built; a `402` offer lists one per option.
#[skip_serializing_none]
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Scheme tag, `"exact"` for every option this engine can pay.
    pub scheme: String,
    /// Network name (e.g. `"base-sepolia"`).
    pub network: String,
    /// Amount in the token's base units.
    pub max_amount_required: TokenAmount,
    /// URL of the resource being paid for.
    pub resource: String,
    /// Human-readable description of the resource.
    #[serde(default)]
    pub description: String,
    /// MIME type of the resource.
    #[serde(default)]
    pub mime_type: String,
    /// JSON schema of the resource output.
    pub output_schema: Option<serde_json::Value>,
    /// Recipient of the payment.
    pub pay_to: String,
    /// How long a signed authorization stays valid.
    pub max_timeout_seconds: u64,
    /// Token contract.
    pub asset: String,
    /// Scheme-specific metadata. For `exact` this carries the EIP-712
    /// domain `name` and `version` of the token.
    pub extra: Option<serde_json::Value>,
}

/// The EIP-712 domain fields the `exact` scheme reads from
/// [`PaymentRequirements::extra`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactExtra {
    /// Token name as used in its EIP-712 domain (e.g. `"USD Coin"`).
    pub name: String,
    /// Token EIP-712 domain version (e.g. `"2"`).
    pub version: String,
}

impl PaymentRequirements {
    /// Reads the EIP-712 domain name and version out of `extra`.
    ///
    /// Returns `None` if either is missing.
    #[must_use]
    pub fn exact_extra(&self) -> Option<ExactExtra> {
        let extra = self.extra.as_ref()?;
        let name = extra.get("name")?.as_str()?;
        let version = extra.get("version")?.as_str()?;
        Some(ExactExtra {
            name: name.to_owned(),
            version: version.to_owned(),
        })
    }

    /// Returns `true` when `other` offers the same terms on a different network.
    #[must_use]
    pub fn differs_only_in_network(&self, other: &Self) -> bool {
        self.network != other.network
            && self.scheme == other.scheme
            && self.max_amount_required == other.max_amount_required
            && self.resource == other.resource
            && self.description == other.description
            && self.mime_type == other.mime_type
            && self.output_schema == other.output_schema
            && self.pay_to == other.pay_to
            && self.max_timeout_seconds == other.max_timeout_seconds
            && self.asset == other.asset
            && self.extra == other.extra
    }
}

/// Body of a `402 Payment Required` response.
///
/// The order of `accepts` is significant to requirement selection.
#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// Acceptable payment options, in the server's order of preference.
    #[serde(default)]
    pub accepts: Vec<PaymentRequirements>,
    /// Why the previous attempt, if any, was refused.
    #[serde(default)]
    pub error: Option<String>,
}

impl PaymentRequired {
    /// Creates an offer listing `accepts`.
    #[must_use]
    pub const fn new(accepts: Vec<PaymentRequirements>, error: Option<String>) -> Self {
        Self {
            x402_version: V1,
            accepts,
            error,
        }
    }
}

/// An ERC-3009 `transferWithAuthorization` message.
///
/// Built fresh for every payment attempt; the nonce is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactAuthorization {
    /// Payer.
    pub from: Address,
    /// Recipient, the requirement's `payTo`.
    pub to: Address,
    /// Amount in base units.
    pub value: TokenAmount,
    /// Not valid at or before this time.
    pub valid_after: UnixTimestamp,
    /// Not valid at or after this time.
    pub valid_before: UnixTimestamp,
    /// 32 random bytes.
    pub nonce: B256,
}

/// Signature plus the authorization it covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactPayload {
    /// Signature over the EIP-712 hash of `authorization`.
    pub signature: Bytes,
    /// The signed message.
    pub authorization: ExactAuthorization,
}

/// The signed payment sent by the client in the `X-PAYMENT` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentPayload {
    /// Protocol version (always 1).
    pub x402_version: X402Version1,
    /// Scheme of the requirement that was paid.
    pub scheme: String,
    /// Network of the requirement that was paid.
    pub network: String,
    /// The signed authorization.
    pub payload: ExactPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn requirements_json() -> serde_json::Value {
        json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": "10000",
            "resource": "https://api.example.com/weather",
            "description": "Weather report",
            "mimeType": "application/json",
            "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
            "maxTimeoutSeconds": 60,
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "extra": { "name": "USDC", "version": "2" }
        })
    }

    #[test]
    fn requirements_from_wire() {
        let req: PaymentRequirements = serde_json::from_value(requirements_json()).unwrap();
        assert_eq!(req.max_amount_required, TokenAmount::from(10_000u64));
        assert_eq!(
            req.exact_extra(),
            Some(ExactExtra {
                name: "USDC".into(),
                version: "2".into()
            })
        );
        let back = serde_json::to_value(&req).unwrap();
        assert_eq!(back, requirements_json());
    }

    #[test]
    fn fractional_amount_fails_decode() {
        let mut value = requirements_json();
        value["maxAmountRequired"] = json!("10.5");
        assert!(serde_json::from_value::<PaymentRequirements>(value).is_err());
    }

    #[test]
    fn payment_required_rejects_other_versions() {
        let body = json!({ "x402Version": 2, "accepts": [] });
        let err = serde_json::from_value::<PaymentRequired>(body).unwrap_err();
        assert!(err.to_string().contains("unsupported x402Version 2"));
        assert_eq!(serde_json::to_value(V1).unwrap(), json!(1));

        let body = json!({ "x402Version": 1, "accepts": [requirements_json()], "error": "X-PAYMENT header is required" });
        let offer: PaymentRequired = serde_json::from_value(body).unwrap();
        assert_eq!(offer.accepts.len(), 1);
    }

    #[test]
    fn network_twin_detection() {
        let a: PaymentRequirements = serde_json::from_value(requirements_json()).unwrap();
        let mut b = a.clone();
        b.network = "base".into();
        assert!(a.differs_only_in_network(&b));
        b.max_amount_required = TokenAmount::from(1u64);
        assert!(!a.differs_only_in_network(&b));
        assert!(!a.differs_only_in_network(&a));
    }

    #[test]
    fn payload_bytes_are_lowercase_hex() {
        let payload = ExactPayload {
            signature: Bytes::from(vec![0xAB, 0xCD]),
            authorization: ExactAuthorization {
                from: Address::ZERO,
                to: Address::ZERO,
                value: TokenAmount::from(1u64),
                valid_after: UnixTimestamp::from_secs(1),
                valid_before: UnixTimestamp::from_secs(2),
                nonce: B256::repeat_byte(0xEF),
            },
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["signature"], "0xabcd");
        assert_eq!(
            value["authorization"]["nonce"],
            format!("0x{}", "ef".repeat(32))
        );
        assert_eq!(value["authorization"]["validAfter"], "1");
    }
}
