#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core of the x402 `exact` payment engine.
//!
//! A server answers a request for a paid resource with `402 Payment Required`
//! and a list of acceptable [`PaymentRequirements`](proto::v1::PaymentRequirements).
//! The client picks one of them, signs an ERC-3009 transfer authorization for
//! it and retries the request with the signed payload in the `X-PAYMENT`
//! header. The server hands the payload to a facilitator to verify and settle.
//!
//! This crate holds the transport-agnostic parts of that flow and does not
//! depend on any cryptographic library: signing is an injected capability
//! ([`exact::AuthorizationSigner`]).
//!
//! # Modules
//!
//! - [`amount`] - Token base-unit amounts and human-readable money parsing
//! - [`assets`] - Token deployments used to price resources
//! - [`encoding`] - Base64-over-JSON codec for header values
//! - [`error`] - Payment error taxonomy
//! - [`exact`] - Authorization construction and signing for the `exact` scheme
//! - [`facilitator`] - Verification and settlement interface
//! - [`networks`] - Network name to chain id resolution
//! - [`proto`] - Wire format types
//! - [`selector`] - Requirement selection policy
//! - [`timestamp`] - Unix timestamps for authorization windows
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation

pub mod amount;
pub mod assets;
pub mod encoding;
pub mod error;
pub mod exact;
pub mod facilitator;
pub mod networks;
pub mod proto;
pub mod selector;
pub mod timestamp;
