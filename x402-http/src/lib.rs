#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for the x402 `exact` payment scheme.
//!
//! # Modules
//!
//! - [`constants`] - Header names and default URLs
//! - [`headers`] - Encoding and decoding of `X-PAYMENT` / `X-PAYMENT-RESPONSE`
//! - [`client`] - reqwest middleware paying `402` responses (feature: `client`)
//! - [`facilitator`] - Remote facilitator client (feature: `facilitator`)
//! - [`server`] - tower layer guarding routes behind payment (feature: `server`)
//!
//! # Feature Flags
//!
//! - `client` - Client interceptor
//! - `facilitator` - HTTP facilitator client
//! - `server` - Payment gate (implies `facilitator`)
//! - `telemetry` - Tracing instrumentation

pub mod constants;
pub mod headers;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "facilitator")]
pub mod facilitator;
#[cfg(feature = "server")]
pub mod server;
