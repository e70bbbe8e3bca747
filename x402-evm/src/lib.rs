#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM signing capability for the x402 `exact` scheme.
//!
//! Implements [`x402_core::exact::AuthorizationSigner`] on top of Alloy
//! signers: the ERC-3009 `TransferWithAuthorization` message is hashed as
//! EIP-712 typed data under the token's domain and signed with a secp256k1
//! key. The same typed-data definitions recover the signer from a signature,
//! which is how a verifier checks a payment.
//!
//! # Modules
//!
//! - [`types`] - EIP-712 typed data for `TransferWithAuthorization`
//! - [`signer`] - Signing and signature recovery
//!
//! # Feature Flags
//!
//! - `local-signer` (default) - [`SignerLike`] for Alloy's `PrivateKeySigner`
//! - `telemetry` - Tracing instrumentation

pub mod signer;
pub mod types;

pub use signer::{EvmSigner, RecoverError, SignerLike, recover_authorization_signer};
pub use types::TransferWithAuthorization;
