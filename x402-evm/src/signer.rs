//! Signing and recovery of transfer authorizations with Alloy signers.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, Signature};
#[cfg(feature = "local-signer")]
use alloy_signer_local::PrivateKeySigner;
#[cfg(feature = "telemetry")]
use tracing::instrument;
use x402_core::error::SignerError;
use x402_core::exact::{AuthorizationDomain, AuthorizationSigner};
use x402_core::proto::ExactAuthorization;

use crate::types::signing_hash;

/// A trait that abstracts hash signing, so both owned and `Arc`-wrapped
/// Alloy signers can back an [`EvmSigner`].
///
/// Alloy's `Signer` is not implemented for `Arc<T>`, and `PrivateKeySigner`
/// is often shared between clients.
pub trait SignerLike: Send + Sync {
    /// Address of the key.
    fn address(&self) -> Address;

    /// Signs a 32-byte prehash.
    fn sign_hash(
        &self,
        hash: &B256,
    ) -> impl Future<Output = Result<Signature, alloy_signer::Error>> + Send;
}

#[cfg(feature = "local-signer")]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        alloy_signer::Signer::sign_hash(self, hash).await
    }
}

impl<T: SignerLike> SignerLike for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    async fn sign_hash(&self, hash: &B256) -> Result<Signature, alloy_signer::Error> {
        (**self).sign_hash(hash).await
    }
}

/// [`AuthorizationSigner`] producing 65-byte ECDSA signatures over the
/// EIP-712 hash of `TransferWithAuthorization`.
///
/// ```no_run
/// use alloy_signer_local::PrivateKeySigner;
/// use x402_evm::EvmSigner;
///
/// let signer = EvmSigner::new(PrivateKeySigner::random());
/// ```
#[derive(Debug, Clone)]
pub struct EvmSigner<S> {
    inner: S,
}

impl<S> EvmSigner<S> {
    /// Wraps an Alloy signer.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// The wrapped signer.
    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SignerLike> AuthorizationSigner for EvmSigner<S> {
    fn address(&self) -> Address {
        self.inner.address()
    }

    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "x402.evm.sign_authorization", skip_all, fields(chain_id = domain.chain_id), err)
    )]
    async fn sign_authorization(
        &self,
        domain: &AuthorizationDomain,
        authorization: &ExactAuthorization,
    ) -> Result<Bytes, SignerError> {
        let hash = signing_hash(domain, authorization);
        let signature = self
            .inner
            .sign_hash(&hash)
            .await
            .map_err(|e| SignerError::new("EIP-712 signing failed").with_source(e))?;
        Ok(Bytes::copy_from_slice(&signature.as_bytes()))
    }
}

/// A signature that does not yield a signer address.
#[derive(Debug, thiserror::Error)]
pub enum RecoverError {
    /// Not a 65-byte `r || s || v` signature.
    #[error("malformed signature: {0}")]
    Malformed(#[source] alloy_primitives::SignatureError),
    /// Public key recovery failed.
    #[error("signature recovery failed: {0}")]
    Recovery(#[source] alloy_primitives::SignatureError),
}

/// Recovers the address that signed `authorization` under `domain`.
///
/// A payment is authentic when the result equals `authorization.from`.
///
/// # Errors
///
/// Returns [`RecoverError`] if the signature is malformed or does not
/// recover.
pub fn recover_authorization_signer(
    domain: &AuthorizationDomain,
    authorization: &ExactAuthorization,
    signature: &Bytes,
) -> Result<Address, RecoverError> {
    let signature =
        Signature::try_from(signature.as_ref()).map_err(RecoverError::Malformed)?;
    signature
        .recover_address_from_prehash(&signing_hash(domain, authorization))
        .map_err(RecoverError::Recovery)
}
