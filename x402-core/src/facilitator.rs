//! Verification and settlement interface.
//!
//! A resource server never checks signatures or moves funds itself: it asks a
//! [`Facilitator`] to verify a payment before serving the request and to
//! settle it afterwards. The usual implementation talks to a remote
//! facilitator over HTTP; tests substitute an in-memory one.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::proto::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse};

/// Asynchronous verify/settle interface of an x402 facilitator.
pub trait Facilitator {
    /// Error returned when the facilitator could not produce a verdict.
    type Error: Debug + Display;

    /// Checks a payment against the requirement it claims to satisfy.
    ///
    /// An unacceptable payment is a successful call returning
    /// [`VerifyResponse::Invalid`].
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if no verdict could be obtained.
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    /// Executes a previously verified payment.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] if no outcome could be obtained.
    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }
}
