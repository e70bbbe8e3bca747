//! Error types for building and reading x402 payments.

use crate::amount::TokenAmount;
use crate::encoding::DecodingError;

/// Failure reported by a signing capability.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct SignerError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl SignerError {
    /// Creates an error with a message and no underlying cause.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Why a payment could not be produced or read.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// None of the offered requirements is payable with the `exact` scheme
    /// under the active filters.
    #[error("No supported payment scheme found")]
    UnsupportedScheme,
    /// The selected requirement asks for more than the configured ceiling.
    #[error("Payment amount {required} exceeds maximum allowed value {max}")]
    AmountExceeded {
        /// Amount asked for.
        required: TokenAmount,
        /// Configured ceiling.
        max: TokenAmount,
    },
    /// The requirement lacks data needed to sign, or carries data that cannot
    /// be interpreted (unknown network, malformed address).
    #[error("Invalid payment configuration: {0}")]
    Configuration(String),
    /// The signing capability failed.
    #[error("Signing failed: {0}")]
    Signing(#[from] SignerError),
    /// A peer message could not be decoded.
    #[error(transparent)]
    Decoding(#[from] DecodingError),
    /// A message could not be encoded.
    #[error("Failed to encode payment: {0}")]
    Encoding(#[source] serde_json::Error),
}

impl PaymentError {
    /// Shorthand for [`PaymentError::Configuration`].
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}
