//! A [`Facilitator`] that talks to a _remote_ x402 facilitator over HTTP.
//!
//! [`FacilitatorClient`] issues one `POST {base}/verify` or
//! `POST {base}/settle` per call, with body
//! `{paymentPayload, paymentRequirements}`. It never retries; callers decide
//! what a failure means.
//!
//! ## Error Handling
//!
//! - transport failures (connect, TLS, timeout, body read) are
//!   [`FacilitatorClientError::Unreachable`]
//! - a response body that is not the expected JSON, whatever its status, is
//!   [`FacilitatorClientError::Protocol`]
//!
//! A facilitator answering `400 {"isValid": false, ...}` therefore yields a
//! typed [`VerifyResponse::Invalid`], not an error.

use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use reqwest::Client;
use url::Url;
use x402_core::facilitator::Facilitator;
use x402_core::proto::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse};

#[cfg(feature = "telemetry")]
use tracing::{Span, instrument};

use crate::constants::DEFAULT_FACILITATOR_URL;

/// Headers to add to each operation, produced per call by a
/// [`HeaderProvider`].
#[derive(Debug, Clone, Default)]
pub struct OperationHeaders {
    /// Added to `POST /verify`.
    pub verify: HeaderMap,
    /// Added to `POST /settle`.
    pub settle: HeaderMap,
}

/// Produces per-operation headers for every call, e.g. short-lived auth
/// tokens.
pub type HeaderProvider = Arc<dyn Fn() -> OperationHeaders + Send + Sync>;

/// A client for a remote x402 facilitator.
#[derive(Clone)]
pub struct FacilitatorClient {
    /// Base URL, always ending in `/`
    base_url: Url,
    /// Full URL of `POST /verify`
    verify_url: Url,
    /// Full URL of `POST /settle`
    settle_url: Url,
    /// Shared reqwest client
    client: Client,
    /// Sent with every request
    headers: HeaderMap,
    /// Static per-operation headers
    operation_headers: OperationHeaders,
    /// Dynamic per-operation headers
    header_provider: Option<HeaderProvider>,
    /// Optional request timeout
    timeout: Option<Duration>,
}

impl fmt::Debug for FacilitatorClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FacilitatorClient")
            .field("base_url", &self.base_url)
            .field("verify_url", &self.verify_url)
            .field("settle_url", &self.settle_url)
            .field("headers", &self.headers)
            .field("operation_headers", &self.operation_headers)
            .field("header_provider", &self.header_provider.as_ref().map(|_| "<fn>"))
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Facilitator for FacilitatorClient {
    type Error = FacilitatorClientError;

    async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, Self::Error> {
        Self::verify(self, request).await
    }

    async fn settle(&self, request: &SettleRequest) -> Result<SettleResponse, Self::Error> {
        Self::settle(self, request).await
    }
}

/// Errors that can occur while interacting with a remote facilitator.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorClientError {
    /// The URL is not an `http://` or `https://` URL.
    #[error("Invalid URL {0}, must start with http:// or https://")]
    UnsupportedUrl(String),
    /// URL parse error.
    #[error("URL parse error: {context}: {source}")]
    UrlParse {
        /// Human-readable context.
        context: &'static str,
        /// The underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// The facilitator could not be reached or the response not read.
    #[error("Facilitator unreachable: {context}: {source}")]
    Unreachable {
        /// Human-readable context.
        context: &'static str,
        /// The underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The facilitator answered with something other than the expected JSON.
    #[error("Unexpected facilitator response: {context}: HTTP {status}: {source}")]
    Protocol {
        /// Human-readable context.
        context: &'static str,
        /// HTTP status of the response.
        status: StatusCode,
        /// Raw response body.
        body: String,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Which facilitator endpoint a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Verify,
    Settle,
}

impl Operation {
    const fn context(self) -> &'static str {
        match self {
            Self::Verify => "POST /verify",
            Self::Settle => "POST /settle",
        }
    }
}

impl Default for FacilitatorClient {
    /// A client for [`DEFAULT_FACILITATOR_URL`].
    fn default() -> Self {
        Self::try_from(DEFAULT_FACILITATOR_URL).expect("default facilitator URL is valid")
    }
}

impl FacilitatorClient {
    /// Returns the base URL used by this client.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the computed `./verify` URL.
    #[must_use]
    pub const fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    /// Returns the computed `./settle` URL.
    #[must_use]
    pub const fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    /// Returns the configured timeout, if any.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Constructs a client from a base URL, which must end in `/` for the
    /// endpoints to resolve beneath it.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the URL is not http(s) or the
    /// endpoint URLs cannot be built.
    pub fn try_new(base_url: Url) -> Result<Self, FacilitatorClientError> {
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(FacilitatorClientError::UnsupportedUrl(base_url.to_string()));
        }
        let verify_url =
            base_url
                .join("./verify")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./verify URL",
                    source: e,
                })?;
        let settle_url =
            base_url
                .join("./settle")
                .map_err(|e| FacilitatorClientError::UrlParse {
                    context: "Failed to construct ./settle URL",
                    source: e,
                })?;
        Ok(Self {
            client: Client::new(),
            base_url,
            verify_url,
            settle_url,
            headers: HeaderMap::new(),
            operation_headers: OperationHeaders::default(),
            header_provider: None,
            timeout: None,
        })
    }

    /// Attaches headers to every request.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Attaches headers to `POST /verify` only.
    #[must_use]
    pub fn with_verify_headers(mut self, headers: HeaderMap) -> Self {
        self.operation_headers.verify = headers;
        self
    }

    /// Attaches headers to `POST /settle` only.
    #[must_use]
    pub fn with_settle_headers(mut self, headers: HeaderMap) -> Self {
        self.operation_headers.settle = headers;
        self
    }

    /// Computes extra per-operation headers on every call.
    #[must_use]
    pub fn with_header_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> OperationHeaders + Send + Sync + 'static,
    {
        self.header_provider = Some(Arc::new(provider));
        self
    }

    /// Sets a timeout for all future requests.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sends a `POST /verify` request to the facilitator.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the facilitator is unreachable
    /// or answers with an unparsable body.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.facilitator_client.verify", skip_all, fields(timeout = ?self.timeout, otel.status_code, error.message))
    )]
    pub async fn verify(
        &self,
        request: &VerifyRequest,
    ) -> Result<VerifyResponse, FacilitatorClientError> {
        self.post_json(Operation::Verify, request).await
    }

    /// Sends a `POST /settle` request to the facilitator.
    ///
    /// # Errors
    ///
    /// Returns [`FacilitatorClientError`] if the facilitator is unreachable
    /// or answers with an unparsable body.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.facilitator_client.settle", skip_all, fields(timeout = ?self.timeout, otel.status_code, error.message))
    )]
    pub async fn settle(
        &self,
        request: &SettleRequest,
    ) -> Result<SettleResponse, FacilitatorClientError> {
        self.post_json(Operation::Settle, request).await
    }

    fn headers_for(&self, operation: Operation) -> HeaderMap {
        let mut headers = self.headers.clone();
        let (static_headers, dynamic_headers) = match operation {
            Operation::Verify => (
                &self.operation_headers.verify,
                self.header_provider.as_ref().map(|p| p().verify),
            ),
            Operation::Settle => (
                &self.operation_headers.settle,
                self.header_provider.as_ref().map(|p| p().settle),
            ),
        };
        headers.extend(static_headers.clone());
        if let Some(dynamic_headers) = dynamic_headers {
            headers.extend(dynamic_headers);
        }
        headers
    }

    /// POSTs `payload` as JSON and parses the body as `R` whatever the status.
    async fn post_json<T, R>(
        &self,
        operation: Operation,
        payload: &T,
    ) -> Result<R, FacilitatorClientError>
    where
        T: serde::Serialize + Sync + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let context = operation.context();
        let url = match operation {
            Operation::Verify => &self.verify_url,
            Operation::Settle => &self.settle_url,
        };
        let mut req = self
            .client
            .post(url.clone())
            .headers(self.headers_for(operation))
            .json(payload);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let result = async {
            let http_response = req
                .send()
                .await
                .map_err(|e| FacilitatorClientError::Unreachable { context, source: e })?;
            let status = http_response.status();
            let body = http_response
                .bytes()
                .await
                .map_err(|e| FacilitatorClientError::Unreachable { context, source: e })?;
            serde_json::from_slice::<R>(&body).map_err(|e| FacilitatorClientError::Protocol {
                context,
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
                source: e,
            })
        }
        .await;

        record_result_on_span(&result);

        result
    }
}

/// Parses a base URL, normalizing the trailing slash.
impl TryFrom<&str> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        if !(value.starts_with("http://") || value.starts_with("https://")) {
            return Err(FacilitatorClientError::UnsupportedUrl(value.to_owned()));
        }
        let mut normalized = value.trim_end_matches('/').to_owned();
        normalized.push('/');
        let url = Url::parse(&normalized).map_err(|e| FacilitatorClientError::UrlParse {
            context: "Failed to parse base url",
            source: e,
        })?;
        Self::try_new(url)
    }
}

impl TryFrom<String> for FacilitatorClient {
    type Error = FacilitatorClientError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

/// Records the outcome of a request on the current span.
#[cfg(feature = "telemetry")]
fn record_result_on_span<R, E: Display>(result: &Result<R, E>) {
    let span = Span::current();
    match result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", tracing::field::display(err));
            tracing::event!(tracing::Level::ERROR, error = %err, "Request to facilitator failed");
        }
    }
}

/// Noop if telemetry feature is off.
#[cfg(not(feature = "telemetry"))]
const fn record_result_on_span<R, E: Display>(_result: &Result<R, E>) {}
