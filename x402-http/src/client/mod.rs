//! Reqwest middleware that pays for [x402](https://www.x402.org) resources.
//!
//! [`X402Client`] sits in a `reqwest-middleware` stack. When a request comes
//! back `402 Payment Required`, it reads the offer from the body, picks one
//! requirement with a [`RequirementsSelector`](x402_core::selector::RequirementsSelector),
//! signs an `exact` payment for it and retries once with `X-PAYMENT`.
//!
//! ```no_run
//! # async fn run(signer: impl x402_core::exact::AuthorizationSigner + 'static) -> Result<(), Box<dyn std::error::Error>> {
//! use x402_core::amount::TokenAmount;
//! use x402_http::client::{PaymentResponseExt, ReqwestWithPayments, ReqwestWithPaymentsBuild, X402Client};
//!
//! let client = reqwest::Client::new()
//!     .with_payments(X402Client::new(signer).with_max_value(TokenAmount::from(100_000u64)))
//!     .build();
//! let response = client.get("https://example.com/weather").send().await?;
//! if let Some(settlement) = response.payment_response() {
//!     println!("paid: {settlement:?}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! The retry carries the original method, URL and body, so the body must be
//! replayable; streaming bodies fail with [`ClientError::MissingRequestConfig`].

mod middleware;

pub use middleware::*;

use reqwest::{Client, ClientBuilder, Response};
use reqwest_middleware as rqm;
use x402_core::proto::SettleResponse;

/// Trait for adding x402 payment handling to reqwest clients.
///
/// This trait is implemented on [`Client`] and [`ClientBuilder`], allowing
/// you to create a reqwest client with automatic x402 payment handling.
pub trait ReqwestWithPayments<A, S> {
    /// Adds the payment middleware to the client or builder.
    fn with_payments(self, x402_client: X402Client<S>) -> ReqwestWithPaymentsBuilder<A, S>;
}

impl<S> ReqwestWithPayments<Self, S> for Client {
    fn with_payments(self, x402_client: X402Client<S>) -> ReqwestWithPaymentsBuilder<Self, S> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

impl<S> ReqwestWithPayments<Self, S> for ClientBuilder {
    fn with_payments(self, x402_client: X402Client<S>) -> ReqwestWithPaymentsBuilder<Self, S> {
        ReqwestWithPaymentsBuilder {
            inner: self,
            x402_client,
        }
    }
}

/// Builder for creating a reqwest client with x402 middleware.
#[allow(missing_debug_implementations)] // generic A may not implement Debug
pub struct ReqwestWithPaymentsBuilder<A, S> {
    inner: A,
    x402_client: X402Client<S>,
}

/// Trait for building the final client from a [`ReqwestWithPaymentsBuilder`].
pub trait ReqwestWithPaymentsBuild {
    /// The type returned by [`build`](Self::build)
    type BuildResult;
    /// The type returned by [`builder`](Self::builder)
    type BuilderResult;

    /// Builds the client, consuming the builder.
    fn build(self) -> Self::BuildResult;

    /// Returns the middleware client builder, for stacking more middleware.
    fn builder(self) -> Self::BuilderResult;
}

impl<S> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<Client, S>
where
    X402Client<S>: rqm::Middleware,
{
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.x402_client)
    }
}

impl<S> ReqwestWithPaymentsBuild for ReqwestWithPaymentsBuilder<ClientBuilder, S>
where
    X402Client<S>: rqm::Middleware,
{
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        let builder = self.builder()?;
        Ok(builder.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.x402_client))
    }
}

/// Access to the settlement a server reported for a paid request.
pub trait PaymentResponseExt {
    /// The decoded `X-PAYMENT-RESPONSE` of a paid retry, if the server sent
    /// one.
    fn payment_response(&self) -> Option<&SettleResponse>;
}

impl PaymentResponseExt for Response {
    fn payment_response(&self) -> Option<&SettleResponse> {
        self.extensions().get::<SettleResponse>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes};
    use http::StatusCode;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use x402_core::amount::TokenAmount;
    use x402_core::error::{PaymentError, SignerError};
    use x402_core::exact::{AuthorizationDomain, AuthorizationSigner};
    use x402_core::proto::ExactAuthorization;

    use crate::constants::X_PAYMENT_RESPONSE_HEADER;
    use crate::headers::{decode_payment_header, encode_payment_response};

    #[derive(Default)]
    struct StaticSigner {
        calls: AtomicUsize,
    }

    impl AuthorizationSigner for StaticSigner {
        fn address(&self) -> Address {
            Address::repeat_byte(0x11)
        }

        async fn sign_authorization(
            &self,
            _domain: &AuthorizationDomain,
            _authorization: &ExactAuthorization,
        ) -> Result<Bytes, SignerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Bytes::from(vec![0xab; 65]))
        }
    }

    fn offer(scheme: &str, amount: u64) -> serde_json::Value {
        serde_json::json!({
            "x402Version": 1,
            "error": "X-PAYMENT header is required",
            "accepts": [{
                "scheme": scheme,
                "network": "base-sepolia",
                "maxAmountRequired": amount.to_string(),
                "resource": "https://example.com/paid",
                "description": "paid",
                "mimeType": "application/json",
                "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
                "maxTimeoutSeconds": 60,
                "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
                "extra": { "name": "USDC", "version": "2" }
            }]
        })
    }

    fn client_with(x402: X402Client<Arc<StaticSigner>>) -> rqm::ClientWithMiddleware {
        Client::new().with_payments(x402).build()
    }

    fn client_error(err: rqm::Error) -> ClientError {
        match err {
            rqm::Error::Middleware(e) => e
                .downcast::<ClientError>()
                .expect("middleware error is a ClientError"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn passes_through_without_payment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/free"))
            .respond_with(ResponseTemplate::new(200).set_body_string("free"))
            .expect(1)
            .mount(&server)
            .await;

        let signer = Arc::new(StaticSigner::default());
        let client = client_with(X402Client::new(Arc::clone(&signer)));
        let res = client
            .get(format!("{}/free", server.uri()))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.payment_response().is_none());
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retries_once_and_returns_second_402() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/paid"))
            .respond_with(ResponseTemplate::new(402).set_body_json(offer("exact", 10_000)))
            .expect(2)
            .mount(&server)
            .await;

        let signer = Arc::new(StaticSigner::default());
        let client = client_with(X402Client::new(Arc::clone(&signer)));
        let res = client
            .get(format!("{}/paid", server.uri()))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::PAYMENT_REQUIRED);
        let body: serde_json::Value = res.json().await.unwrap();
        assert_eq!(body, offer("exact", 10_000));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pays_and_exposes_settlement() {
        let server = MockServer::start().await;
        let settlement = SettleResponse::Success {
            payer: Some("0x1111111111111111111111111111111111111111".into()),
            transaction: "0xabc".into(),
            network: Some("base-sepolia".into()),
        };
        Mock::given(method("POST"))
            .and(path("/paid"))
            .and(header_exists("x-payment"))
            .and(header("access-control-expose-headers", X_PAYMENT_RESPONSE_HEADER))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        X_PAYMENT_RESPONSE_HEADER,
                        encode_payment_response(&settlement).unwrap().as_str(),
                    )
                    .set_body_string("paid content"),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/paid"))
            .respond_with(ResponseTemplate::new(402).set_body_json(offer("exact", 10_000)))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with(X402Client::new(Arc::new(StaticSigner::default())));
        let res = client
            .post(format!("{}/paid", server.uri()))
            .body("question")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.payment_response(), Some(&settlement));

        let requests = server.received_requests().await.unwrap();
        let paid = requests.last().unwrap();
        assert_eq!(paid.body, b"question");
        let payload = decode_payment_header(paid.headers.get("x-payment").unwrap().as_bytes())
            .unwrap();
        assert_eq!(payload.network, "base-sepolia");
        assert_eq!(payload.payload.authorization.from, Address::repeat_byte(0x11));
        assert_eq!(payload.payload.authorization.value, TokenAmount::from(10_000u64));
    }

    #[tokio::test]
    async fn unsupported_scheme_never_signs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(offer("unsupported", 10_000)))
            .expect(1)
            .mount(&server)
            .await;

        let signer = Arc::new(StaticSigner::default());
        let client = client_with(X402Client::new(Arc::clone(&signer)));
        let err = client.get(server.uri()).send().await.unwrap_err();
        assert!(matches!(
            client_error(err),
            ClientError::Payment(PaymentError::UnsupportedScheme)
        ));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ceiling_rejects_expensive_offer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(offer("exact", 10_000)))
            .expect(1)
            .mount(&server)
            .await;

        let signer = Arc::new(StaticSigner::default());
        let client = client_with(
            X402Client::new(Arc::clone(&signer)).with_max_value(TokenAmount::from(1_000u64)),
        );
        let err = client.get(server.uri()).send().await.unwrap_err();
        assert!(matches!(
            client_error(err),
            ClientError::Payment(PaymentError::AmountExceeded { .. })
        ));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_offer_is_decoding_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_string("pay up"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_with(X402Client::new(Arc::new(StaticSigner::default())));
        let err = client.get(server.uri()).send().await.unwrap_err();
        assert!(matches!(
            client_error(err),
            ClientError::Payment(PaymentError::Decoding(_))
        ));
    }

    async fn mount_paywall(server: &MockServer, settlement: &str) {
        let paid = ResponseTemplate::new(200)
            .insert_header(X_PAYMENT_RESPONSE_HEADER, settlement)
            .set_body_string("paid content");
        Mock::given(method("GET"))
            .and(header_exists("x-payment"))
            .respond_with(paid)
            .with_priority(1)
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(402).set_body_json(offer("exact", 10_000)))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn unreadable_settlement_header_is_decoding_error() {
        let server = MockServer::start().await;
        mount_paywall(&server, "%%%not-base64%%%").await;

        let signer = Arc::new(StaticSigner::default());
        let client = client_with(X402Client::new(Arc::clone(&signer)));
        let err = client.get(server.uri()).send().await.unwrap_err();
        assert!(matches!(
            client_error(err),
            ClientError::Payment(PaymentError::Decoding(_))
        ));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_requests_each_pay_once() {
        let server = MockServer::start().await;
        let settlement = SettleResponse::Success {
            payer: None,
            transaction: "0xabc".into(),
            network: Some("base-sepolia".into()),
        };
        let encoded = encode_payment_response(&settlement).unwrap();
        mount_paywall(&server, &encoded).await;

        let signer = Arc::new(StaticSigner::default());
        let client = client_with(X402Client::new(Arc::clone(&signer)));
        let (first, second) = tokio::join!(
            client.get(format!("{}/a", server.uri())).send(),
            client.get(format!("{}/b", server.uri())).send(),
        );
        for res in [first.unwrap(), second.unwrap()] {
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(res.payment_response(), Some(&settlement));
        }
        assert_eq!(server.received_requests().await.unwrap().len(), 4);
        assert_eq!(signer.calls.load(Ordering::SeqCst), 2);
    }
}
