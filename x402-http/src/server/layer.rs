//! Tower layer putting routes behind an x402 payment.
//!
//! ```no_run
//! use axum::{Router, routing::get};
//! use x402_http::server::{PaygateConfig, X402Layer};
//!
//! # fn build() -> Result<Router, Box<dyn std::error::Error>> {
//! let config = PaygateConfig::new("$0.01".parse()?, "0x209693Bc6afc0C5328bA36FaF03C514EF312287C")
//!     .with_path("/weather")
//!     .with_description("Weather report");
//! let app = Router::new()
//!     .route("/weather", get(|| async { "sunny" }))
//!     .layer(X402Layer::from_config(&config)?);
//! # Ok(app)
//! # }
//! ```

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum_core::extract::Request;
use axum_core::response::Response;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};
use url::Url;
use x402_core::facilitator::Facilitator;
use x402_core::proto::PaymentRequirements;

use super::config::{ConfigError, PathPattern, PaygateConfig};
use super::paygate::{Paygate, resource_url};
use crate::facilitator::FacilitatorClient;

/// What a layer charges and where.
#[derive(Debug)]
struct GatedRoute {
    path: PathPattern,
    /// Requirement with an empty resource, filled per request
    requirements: PaymentRequirements,
    resource: Option<String>,
    base_url: Option<Url>,
}

/// Layer enforcing payment on the routes it wraps.
pub struct X402Layer<F> {
    facilitator: F,
    route: Arc<GatedRoute>,
}

impl<F: Clone> Clone for X402Layer<F> {
    fn clone(&self) -> Self {
        Self {
            facilitator: self.facilitator.clone(),
            route: Arc::clone(&self.route),
        }
    }
}

impl<F: std::fmt::Debug> std::fmt::Debug for X402Layer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Layer")
            .field("facilitator", &self.facilitator)
            .field("route", &self.route)
            .finish()
    }
}

impl X402Layer<Arc<FacilitatorClient>> {
    /// Creates a layer talking to the facilitator named in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the facilitator URL, network, token or
    /// price is invalid.
    pub fn from_config(config: &PaygateConfig) -> Result<Self, ConfigError> {
        let facilitator = FacilitatorClient::try_from(config.facilitator_url.as_str())?;
        Self::new(Arc::new(facilitator), config)
    }

    /// Returns the configured facilitator URL.
    #[must_use]
    pub fn facilitator_url(&self) -> &Url {
        self.facilitator.base_url()
    }
}

impl<F> X402Layer<F> {
    /// Creates a layer using `facilitator`; `config.facilitator_url` is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the network, token or price is invalid.
    pub fn new(facilitator: F, config: &PaygateConfig) -> Result<Self, ConfigError> {
        let mut requirements = config.to_requirements("")?;
        requirements.resource.clear();
        Ok(Self {
            facilitator,
            route: Arc::new(GatedRoute {
                path: config.path.clone(),
                requirements,
                resource: config.resource.clone(),
                base_url: None,
            }),
        })
    }

    /// Sets the base URL that request paths are joined to when no fixed
    /// resource is configured. Without it the `Host` header is used.
    #[must_use]
    pub fn with_base_url(self, base_url: Url) -> Self {
        let route = GatedRoute {
            path: self.route.path.clone(),
            requirements: self.route.requirements.clone(),
            resource: self.route.resource.clone(),
            base_url: Some(base_url),
        };
        Self {
            facilitator: self.facilitator,
            route: Arc::new(route),
        }
    }

    /// Returns a reference to the underlying facilitator.
    pub const fn facilitator(&self) -> &F {
        &self.facilitator
    }
}

impl<S, F> Layer<S> for X402Layer<F>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
    F: Facilitator + Clone,
{
    type Service = X402MiddlewareService<F>;

    fn layer(&self, inner: S) -> Self::Service {
        X402MiddlewareService {
            facilitator: self.facilitator.clone(),
            route: Arc::clone(&self.route),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// Service that enforces x402 payments on incoming requests.
#[derive(Clone)]
#[allow(missing_debug_implementations)] // BoxCloneSyncService does not implement Debug
pub struct X402MiddlewareService<F> {
    /// Payment facilitator
    facilitator: F,
    /// Price and scope
    route: Arc<GatedRoute>,
    /// The wrapped service
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl<F> Service<Request> for X402MiddlewareService<F>
where
    F: Facilitator + Clone + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    /// Delegates readiness polling to the wrapped inner service.
    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let facilitator = self.facilitator.clone();
        let route = Arc::clone(&self.route);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !route.path.matches(req.uri().path()) {
                return inner.call(req).await;
            }

            let mut requirements = route.requirements.clone();
            requirements.resource =
                resource_url(route.resource.as_deref(), route.base_url.as_ref(), &req);

            let gate = Paygate {
                facilitator,
                requirements,
            };
            gate.handle_request(inner, req).await
        })
    }
}
