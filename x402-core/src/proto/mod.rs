//! Wire format types for x402 messages.
//!
//! Every type serializes to JSON with camelCase field names. Client and
//! server messages live in [`v1`]; this module adds the facilitator RPC
//! messages exchanged by the server.
//!
//! # Key Types
//!
//! - [`VerifyRequest`] - Body of `POST /verify` and `POST /settle`
//! - [`VerifyResponse`] - Facilitator verdict on a payment
//! - [`SettleResponse`] - Facilitator settlement outcome

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::skip_serializing_none;

pub mod v1;

pub use v1::{
    EXACT_SCHEME, ExactAuthorization, ExactExtra, ExactPayload, PaymentPayload, PaymentRequired,
    PaymentRequirements, X402Version1,
};

/// Request body sent to the facilitator to verify or settle a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// The signed payment taken from `X-PAYMENT`.
    pub payment_payload: PaymentPayload,
    /// The requirement the payment claims to satisfy.
    pub payment_requirements: PaymentRequirements,
}

/// Request body for `POST /settle`; identical to [`VerifyRequest`] on the wire.
pub type SettleRequest = VerifyRequest;

impl VerifyRequest {
    /// Pairs a payment with the requirement it is checked against.
    #[must_use]
    pub const fn new(
        payment_payload: PaymentPayload,
        payment_requirements: PaymentRequirements,
    ) -> Self {
        Self {
            payment_payload,
            payment_requirements,
        }
    }
}

/// Result of asking a facilitator whether a payment is acceptable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResponse {
    /// The payment matches the requirement and passes all checks.
    Valid {
        /// The payer, if reported.
        payer: Option<String>,
    },
    /// The payment is well-formed but not acceptable.
    Invalid {
        /// Machine-readable reason (e.g. `insufficient_funds`).
        reason: String,
        /// The payer, if identifiable.
        payer: Option<String>,
    },
}

impl VerifyResponse {
    /// A positive verdict.
    #[must_use]
    pub const fn valid(payer: Option<String>) -> Self {
        Self::Valid { payer }
    }

    /// A negative verdict.
    #[must_use]
    pub const fn invalid(payer: Option<String>, reason: String) -> Self {
        Self::Invalid { reason, payer }
    }

    /// Returns `true` for [`VerifyResponse::Valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(default)]
    invalid_reason: Option<String>,
    #[serde(default)]
    payer: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                invalid_reason: None,
                payer: payer.clone(),
            },
            Self::Invalid { reason, payer } => VerifyResponseWire {
                is_valid: false,
                invalid_reason: Some(reason.clone()),
                payer: payer.clone(),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        if wire.is_valid {
            Ok(Self::Valid { payer: wire.payer })
        } else {
            let reason = wire
                .invalid_reason
                .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
            Ok(Self::Invalid {
                reason,
                payer: wire.payer,
            })
        }
    }
}

/// Outcome of a settlement request.
///
/// On success this is also the content of the `X-PAYMENT-RESPONSE` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettleResponse {
    /// The transfer was executed.
    Success {
        /// The payer, if reported.
        payer: Option<String>,
        /// On-chain transaction hash.
        transaction: String,
        /// Network the transfer was executed on.
        network: Option<String>,
    },
    /// The transfer was not executed.
    Error {
        /// Machine-readable reason.
        reason: String,
        /// Network the transfer was attempted on.
        network: Option<String>,
    },
}

impl SettleResponse {
    /// Returns `true` for [`SettleResponse::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[skip_serializing_none]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default, alias = "error")]
    error_reason: Option<String>,
    #[serde(default)]
    transaction: Option<String>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default)]
    payer: Option<String>,
}

impl Serialize for SettleResponse {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let wire = match self {
            Self::Success {
                payer,
                transaction,
                network,
            } => SettleResponseWire {
                success: true,
                error_reason: None,
                transaction: Some(transaction.clone()),
                network: network.clone(),
                payer: payer.clone(),
            },
            Self::Error { reason, network } => SettleResponseWire {
                success: false,
                error_reason: Some(reason.clone()),
                transaction: None,
                network: network.clone(),
                payer: None,
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let wire = SettleResponseWire::deserialize(deserializer)?;
        if wire.success {
            let transaction = wire
                .transaction
                .ok_or_else(|| serde::de::Error::missing_field("transaction"))?;
            Ok(Self::Success {
                payer: wire.payer,
                transaction,
                network: wire.network,
            })
        } else {
            Ok(Self::Error {
                reason: wire
                    .error_reason
                    .unwrap_or_else(|| "unexpected_settle_error".to_owned()),
                network: wire.network,
            })
        }
    }
}
