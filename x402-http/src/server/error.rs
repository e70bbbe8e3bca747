//! Errors raised while gating a request behind payment.
//!
//! Every variant ends up as a `402 Payment Required` JSON body whose `error`
//! field is the variant's display text.

/// The payment could not be accepted before the protected handler ran.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    /// Required payment header is missing.
    #[error("{0} header is required")]
    PaymentHeaderRequired(&'static str),
    /// Payment header is present but malformed.
    #[error("Invalid or malformed payment header")]
    InvalidPaymentHeader,
    /// The facilitator judged the payment unacceptable.
    #[error("Invalid payment: {0}")]
    InvalidPayment(String),
    /// The facilitator could not be asked.
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

/// Paygate error type that wraps verification and settlement errors.
#[derive(Debug, thiserror::Error)]
pub enum PaygateError {
    /// Payment verification failed.
    #[error(transparent)]
    Verification(#[from] VerificationError),
    /// The facilitator refused to settle.
    #[error("Settle failed: {0}")]
    SettleRejected(String),
    /// Settlement could not be carried out or reported.
    #[error("Settlement failed: {0}")]
    Settlement(String),
}
