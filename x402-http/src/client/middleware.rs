//! The [`X402Client`] middleware.

use std::sync::Arc;

use http::{Extensions, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, trace, warn};
use x402_core::amount::TokenAmount;
use x402_core::error::PaymentError;
use x402_core::exact::{AuthorizationSigner, create_payment_header};
use x402_core::networks::NetworkRegistry;
use x402_core::proto::PaymentRequired;
use x402_core::selector::{DefaultSelector, RequirementsSelector, SelectionFilters, check_ceiling};
use x402_core::timestamp::UnixTimestamp;

use crate::constants::{ACCESS_CONTROL_EXPOSE_HEADERS, X_PAYMENT_HEADER, X_PAYMENT_RESPONSE_HEADER};
use crate::headers::decode_payment_response;

/// Errors raised while paying for a request.
///
/// Surfaced to callers as [`rqm::Error::Middleware`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Selecting, signing or decoding (the offer or the settlement) failed.
    #[error("Failed to handle payment: {0}")]
    Payment(#[from] PaymentError),
    /// The request body cannot be replayed, so no paid retry can be sent.
    #[error("Request is not cloneable, cannot retry with payment")]
    MissingRequestConfig,
}

/// Reqwest middleware that pays `402 Payment Required` responses.
///
/// On the first `402` of a request the offer in the body is run through the
/// selector, the chosen requirement is signed and the request is sent once
/// more with `X-PAYMENT`. Whatever comes back from that retry is returned,
/// including a second `402`.
pub struct X402Client<S> {
    signer: S,
    selector: Arc<dyn RequirementsSelector>,
    filters: SelectionFilters,
    max_value: Option<TokenAmount>,
    networks: Arc<NetworkRegistry>,
}

impl<S> std::fmt::Debug for X402Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Client")
            .field("filters", &self.filters)
            .field("max_value", &self.max_value)
            .finish_non_exhaustive()
    }
}

impl<S: AuthorizationSigner> X402Client<S> {
    /// Creates a client paying with `signer`, using [`DefaultSelector`], no
    /// filters, no ceiling and the built-in networks.
    pub fn new(signer: S) -> Self {
        Self {
            signer,
            selector: Arc::new(DefaultSelector::new()),
            filters: SelectionFilters::none(),
            max_value: None,
            networks: Arc::new(NetworkRegistry::default()),
        }
    }

    /// Replaces the requirement selection strategy.
    #[must_use]
    pub fn with_selector<P: RequirementsSelector + 'static>(mut self, selector: P) -> Self {
        self.selector = Arc::new(selector);
        self
    }

    /// Refuses to pay more than `max_value` base units, whichever selector is
    /// in use.
    #[must_use]
    pub const fn with_max_value(mut self, max_value: TokenAmount) -> Self {
        self.max_value = Some(max_value);
        self
    }

    /// Restricts which requirements may be selected.
    #[must_use]
    pub fn with_filters(mut self, filters: SelectionFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Replaces the network registry used to resolve chain ids.
    #[must_use]
    pub fn with_networks(mut self, networks: NetworkRegistry) -> Self {
        self.networks = Arc::new(networks);
        self
    }

    /// Builds the `X-PAYMENT` value answering a `402` body.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Payment`] if the body is not a payment offer,
    /// nothing in it is payable, or signing fails.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.reqwest.make_payment_header", skip_all, err)
    )]
    pub async fn make_payment_header(&self, body: &[u8]) -> Result<String, ClientError> {
        let payment_required: PaymentRequired =
            serde_json::from_slice(body).map_err(|e| PaymentError::Decoding(e.into()))?;
        let selected = self
            .selector
            .select(&payment_required.accepts, &self.filters)?;
        check_ceiling(&selected, self.max_value)?;

        #[cfg(feature = "telemetry")]
        debug!(
            network = %selected.network,
            amount = %selected.max_amount_required,
            pay_to = %selected.pay_to,
            "Selected payment requirements"
        );

        let header =
            create_payment_header(&self.signer, &selected, &self.networks, UnixTimestamp::now())
                .await?;
        Ok(header)
    }
}

/// Which send of a logical request is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptState {
    Fresh,
    Retried,
}

/// Runs the next middleware or HTTP client with optional telemetry instrumentation.
#[cfg_attr(
    feature = "telemetry",
    instrument(name = "x402.reqwest.next", skip_all)
)]
async fn run_next(
    next: rqm::Next<'_>,
    req: Request,
    extensions: &mut Extensions,
) -> rqm::Result<Response> {
    next.run(req, extensions).await
}

#[async_trait::async_trait]
impl<S> rqm::Middleware for X402Client<S>
where
    S: AuthorizationSigner + 'static,
{
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.reqwest.handle", skip_all, err)
    )]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let mut state = AttemptState::Fresh;
        let mut req = req;
        loop {
            let retry_req = match state {
                AttemptState::Fresh => req.try_clone(),
                AttemptState::Retried => None,
            };
            let res = run_next(next.clone(), req, extensions).await?;

            if state == AttemptState::Retried {
                return expose_payment_response(res);
            }
            if res.status() != StatusCode::PAYMENT_REQUIRED {
                #[cfg(feature = "telemetry")]
                trace!(status = ?res.status(), "No payment required, returning response");
                return Ok(res);
            }

            #[cfg(feature = "telemetry")]
            info!(url = %res.url(), "Received 402 Payment Required, processing payment");

            let mut retry = retry_req.ok_or_else(|| {
                rqm::Error::Middleware(ClientError::MissingRequestConfig.into())
            })?;
            let body = res.bytes().await.map_err(rqm::Error::Reqwest)?;
            let header = self
                .make_payment_header(&body)
                .await
                .map_err(|e| rqm::Error::Middleware(e.into()))?;

            let headers = retry.headers_mut();
            headers.insert(
                X_PAYMENT_HEADER,
                HeaderValue::try_from(header).expect("base64 is a valid header value"),
            );
            headers.insert(
                ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(X_PAYMENT_RESPONSE_HEADER),
            );

            #[cfg(feature = "telemetry")]
            trace!(url = %retry.url(), "Retrying request with payment header");

            req = retry;
            state = AttemptState::Retried;
        }
    }
}

/// Decodes `X-PAYMENT-RESPONSE`, if any, into the response extensions.
///
/// A header that does not decode is a [`PaymentError::Decoding`]: the caller
/// cannot tell how the payment settled.
fn expose_payment_response(mut res: Response) -> rqm::Result<Response> {
    let Some(value) = res.headers().get(X_PAYMENT_RESPONSE_HEADER) else {
        return Ok(res);
    };
    let settlement = decode_payment_response(value.as_bytes()).map_err(|e| {
        #[cfg(feature = "telemetry")]
        warn!(error = %e, "Malformed X-PAYMENT-RESPONSE header");
        rqm::Error::Middleware(ClientError::Payment(PaymentError::Decoding(e)).into())
    })?;

    #[cfg(feature = "telemetry")]
    debug!(success = settlement.is_success(), "Decoded payment response");
    res.extensions_mut().insert(settlement);
    Ok(res)
}
