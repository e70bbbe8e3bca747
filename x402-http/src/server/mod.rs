//! Tower middleware enforcing [x402](https://www.x402.org) payments on
//! protected routes.
//!
//! [`X402Layer`] answers requests without a valid `X-PAYMENT` header with
//! `402 Payment Required` and a JSON offer. Paid requests are verified with
//! a facilitator, passed to the wrapped service, and settled once that
//! service has answered with a `2xx` status. The settlement is returned to
//! the client in `X-PAYMENT-RESPONSE`.
//!
//! Settlement always happens **after** the request is processed, so a
//! failing handler never costs the client anything.
//!
//! ## Configuration Notes
//!
//! - **[`PaygateConfig`]** prices the route, from code, from a config file
//!   or from the environment ([`PaygateConfig::from_env`]).
//! - **[`X402Layer::with_base_url`]** sets the origin used to build resource
//!   URLs. If not set, the request's `Host` header is used.
//! - **[`PaygateConfig::with_resource`]** fixes the resource URL instead.

pub mod config;
pub mod error;
pub mod layer;
pub mod paygate;

pub use config::{ConfigError, PathPattern, PaygateConfig, Price};
pub use error::{PaygateError, VerificationError};
pub use layer::{X402Layer, X402MiddlewareService};
pub use paygate::Paygate;
