//! Core payment gate logic.
//!
//! A [`Paygate`] carries one request through
//! `Unpaid -> Verifying -> (Rejected | Settling) -> (Rejected | Paid)`:
//! it reads `X-PAYMENT`, asks the facilitator to verify it, runs the
//! protected handler and settles only if the handler succeeded. Every
//! rejection becomes a `402` with a JSON [`PaymentRequired`] body.

use std::convert::Infallible;

use axum_core::body::Body;
use axum_core::extract::Request;
use axum_core::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode, header};
use tower::Service;
use url::Url;
use x402_core::facilitator::Facilitator;
use x402_core::proto::{
    PaymentRequired, PaymentRequirements, SettleResponse, VerifyRequest, VerifyResponse,
};

#[cfg(feature = "telemetry")]
use tracing::{Instrument, instrument};

use super::error::{PaygateError, VerificationError};
use crate::constants::{X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER};
use crate::headers::{decode_payment_header, encode_payment_response};

/// Determines the resource URL of a request.
///
/// An explicit `resource` wins. Otherwise the request path and query are
/// joined to `base_url`, or to `http://{Host}` when no base URL is known.
#[must_use]
pub fn resource_url(resource: Option<&str>, base_url: Option<&Url>, req: &Request) -> String {
    if let Some(resource) = resource {
        return resource.to_owned();
    }
    let origin = base_url.cloned().or_else(|| {
        let host = req
            .headers()
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("localhost");
        #[cfg(feature = "telemetry")]
        tracing::debug!(host, "No base URL configured, deriving resource from Host");
        Url::parse(&format!("http://{host}")).ok()
    });
    let uri = req.uri();
    match origin {
        Some(mut url) => {
            url.set_path(uri.path());
            url.set_query(uri.query());
            url.to_string()
        }
        None => uri.to_string(),
    }
}

/// Payment gate for one request against one requirement.
#[allow(missing_debug_implementations)]
pub struct Paygate<TFacilitator> {
    /// The facilitator for verifying and settling payments
    pub facilitator: TFacilitator,
    /// What this request must pay, with its resource resolved
    pub requirements: PaymentRequirements,
}

impl<TFacilitator> Paygate<TFacilitator> {
    /// Calls the inner service with proper telemetry instrumentation.
    async fn call_inner<S>(mut inner: S, req: Request) -> Result<S::Response, S::Error>
    where
        S: Service<Request>,
        S::Future: Send,
    {
        #[cfg(feature = "telemetry")]
        {
            inner
                .call(req)
                .instrument(tracing::info_span!("inner"))
                .await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            inner.call(req).await
        }
    }
}

impl<TFacilitator> Paygate<TFacilitator>
where
    TFacilitator: Facilitator + Sync,
{
    /// Handles an incoming request, turning every payment failure into a
    /// `402 Payment Required` response.
    ///
    /// # Errors
    ///
    /// This method is infallible (`Infallible` error type).
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.handle_request", skip_all, fields(resource = %self.requirements.resource))
    )]
    pub async fn handle_request<S>(self, inner: S, req: Request) -> Result<Response, Infallible>
    where
        S: Service<Request>,
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        match self.handle_request_fallible(inner, req).await {
            Ok(response) => Ok(response),
            Err(err) => {
                #[cfg(feature = "telemetry")]
                tracing::info!(error = %err, "Payment rejected");
                Ok(error_into_response(&err, &self.requirements))
            }
        }
    }

    /// Handles an incoming request, returning errors as [`PaygateError`].
    ///
    /// A handler response outside `2xx` is returned as is and nothing is
    /// settled. The settle call is only made once the handler has finished,
    /// so dropping this future earlier never settles.
    ///
    /// # Errors
    ///
    /// Returns [`PaygateError`] if payment processing fails.
    pub async fn handle_request_fallible<S>(
        &self,
        inner: S,
        req: Request,
    ) -> Result<Response, PaygateError>
    where
        S: Service<Request>,
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        let header = req
            .headers()
            .get(X_PAYMENT_HEADER)
            .map(HeaderValue::as_bytes)
            .filter(|value| !value.is_empty())
            .ok_or(VerificationError::PaymentHeaderRequired(X_PAYMENT_HEADER))?;
        let payment_payload =
            decode_payment_header(header).map_err(|_| VerificationError::InvalidPaymentHeader)?;
        let request = VerifyRequest::new(payment_payload, self.requirements.clone());

        let verify_response = self
            .facilitator
            .verify(&request)
            .await
            .map_err(|e| VerificationError::VerificationFailed(e.to_string()))?;
        if let VerifyResponse::Invalid { reason, .. } = verify_response {
            return Err(VerificationError::InvalidPayment(reason).into());
        }

        #[cfg(feature = "telemetry")]
        tracing::debug!("Payment verified, running protected handler");

        let mut response = match Self::call_inner(inner, req).await {
            Ok(response) => response.into_response(),
            Err(err) => return Ok(err.into_response()),
        };
        if !response.status().is_success() {
            #[cfg(feature = "telemetry")]
            tracing::debug!(status = %response.status(), "Handler failed, skipping settlement");
            return Ok(response);
        }

        let settlement = self
            .facilitator
            .settle(&request)
            .await
            .map_err(|e| PaygateError::Settlement(e.to_string()))?;
        if let SettleResponse::Error { reason, .. } = &settlement {
            return Err(PaygateError::SettleRejected(reason.clone()));
        }

        #[cfg(feature = "telemetry")]
        tracing::info!("Payment settled");

        let header_value = settlement_to_header(&settlement)?;
        response
            .headers_mut()
            .insert(X_PAYMENT_RESPONSE_HEADER, header_value);
        Ok(response)
    }
}

/// Converts a [`SettleResponse`] into an `X-PAYMENT-RESPONSE` value.
fn settlement_to_header(settlement: &SettleResponse) -> Result<HeaderValue, PaygateError> {
    let encoded =
        encode_payment_response(settlement).map_err(|e| PaygateError::Settlement(e.to_string()))?;
    HeaderValue::try_from(encoded).map_err(|e| PaygateError::Settlement(e.to_string()))
}

/// Renders a [`PaygateError`] as a `402` offering `requirements` again.
fn error_into_response(err: &PaygateError, requirements: &PaymentRequirements) -> Response {
    let body = PaymentRequired::new(vec![requirements.clone()], Some(err.to_string()));
    let body = serde_json::to_vec(&body).expect("payment offer serializes");
    http::Response::builder()
        .status(StatusCode::PAYMENT_REQUIRED)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("Fail to construct response")
}
