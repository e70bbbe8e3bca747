//! Payment construction for the `exact` scheme.
//!
//! [`sign_payment`] turns one [`PaymentRequirements`] into a signed
//! [`PaymentPayload`]: it builds an ERC-3009 authorization covering the
//! requested amount, derives the EIP-712 domain from the requirement and the
//! network, and asks an [`AuthorizationSigner`] for the signature.
//! [`create_payment_header`] additionally encodes the result for `X-PAYMENT`.

use std::future::Future;
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes};
use rand::RngExt;
use rand::rng;
#[cfg(feature = "telemetry")]
use tracing::{debug, instrument};

use crate::encoding;
use crate::error::{PaymentError, SignerError};
use crate::networks::NetworkRegistry;
use crate::proto::v1::V1;
use crate::proto::{
    EXACT_SCHEME, ExactAuthorization, ExactPayload, PaymentPayload, PaymentRequirements,
};
use crate::timestamp::UnixTimestamp;

/// Seconds subtracted from "now" for `validAfter`, so that a facilitator
/// whose clock runs slightly behind still accepts the authorization.
pub const CLOCK_SKEW_SECS: u64 = 60;

/// EIP-712 domain a transfer authorization is signed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDomain {
    /// Token name from `extra.name`.
    pub name: String,
    /// Token domain version from `extra.version`.
    pub version: String,
    /// Chain id of the requirement's network.
    pub chain_id: u64,
    /// The token contract, the requirement's `asset`.
    pub verifying_contract: Address,
}

/// A capability able to sign ERC-3009 transfer authorizations.
///
/// The key material stays behind this trait; the engine only sees the
/// signer's address and the resulting signature bytes.
pub trait AuthorizationSigner: Send + Sync {
    /// Address that will pay.
    fn address(&self) -> Address;

    /// Signs `authorization` as EIP-712 typed data under `domain`.
    fn sign_authorization(
        &self,
        domain: &AuthorizationDomain,
        authorization: &ExactAuthorization,
    ) -> impl Future<Output = Result<Bytes, SignerError>> + Send;
}

impl<T: AuthorizationSigner> AuthorizationSigner for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn sign_authorization(
        &self,
        domain: &AuthorizationDomain,
        authorization: &ExactAuthorization,
    ) -> impl Future<Output = Result<Bytes, SignerError>> + Send {
        (**self).sign_authorization(domain, authorization)
    }
}

/// 32 fresh random bytes.
#[must_use]
pub fn generate_nonce() -> B256 {
    let nonce: [u8; 32] = rng().random();
    B256::from(nonce)
}

/// Derives the EIP-712 domain for `requirements`.
///
/// # Errors
///
/// Returns [`PaymentError::Configuration`] if `extra` lacks the token name or
/// version, the network is unknown, or the asset is not an address.
pub fn authorization_domain(
    requirements: &PaymentRequirements,
    networks: &NetworkRegistry,
) -> Result<AuthorizationDomain, PaymentError> {
    let extra = requirements.exact_extra().ok_or_else(|| {
        PaymentError::configuration("requirements extra must carry token name and version")
    })?;
    let chain_id = networks.chain_id(&requirements.network).ok_or_else(|| {
        PaymentError::configuration(format!("unknown network {}", requirements.network))
    })?;
    let verifying_contract = parse_address("asset", &requirements.asset)?;
    Ok(AuthorizationDomain {
        name: extra.name,
        version: extra.version,
        chain_id,
        verifying_contract,
    })
}

/// Builds the unsigned authorization paying `requirements` from `from`.
///
/// The window opens [`CLOCK_SKEW_SECS`] before `now` and closes
/// `maxTimeoutSeconds` after it.
///
/// # Errors
///
/// Returns [`PaymentError::Configuration`] if `payTo` is not an address.
pub fn build_authorization(
    from: Address,
    requirements: &PaymentRequirements,
    now: UnixTimestamp,
) -> Result<ExactAuthorization, PaymentError> {
    Ok(ExactAuthorization {
        from,
        to: parse_address("payTo", &requirements.pay_to)?,
        value: requirements.max_amount_required,
        valid_after: now.saturating_sub(CLOCK_SKEW_SECS),
        valid_before: now + requirements.max_timeout_seconds,
        nonce: generate_nonce(),
    })
}

fn parse_address(field: &str, value: &str) -> Result<Address, PaymentError> {
    value
        .parse::<Address>()
        .map_err(|e| PaymentError::configuration(format!("invalid {field} address {value}: {e}")))
}

/// Signs a payment satisfying `requirements`.
///
/// The scheme is checked before the signer is touched, so an unsupported
/// requirement never reaches the signing capability.
///
/// # Errors
///
/// - [`PaymentError::UnsupportedScheme`] if the scheme is not `exact`
/// - [`PaymentError::Configuration`] if the requirement cannot be signed as is
/// - [`PaymentError::Signing`] if the signer fails
#[cfg_attr(
    feature = "telemetry",
    instrument(name = "x402.exact.sign_payment", skip_all, fields(network = %requirements.network), err)
)]
pub async fn sign_payment<S: AuthorizationSigner>(
    signer: &S,
    requirements: &PaymentRequirements,
    networks: &NetworkRegistry,
    now: UnixTimestamp,
) -> Result<PaymentPayload, PaymentError> {
    if requirements.scheme != EXACT_SCHEME {
        return Err(PaymentError::UnsupportedScheme);
    }
    let domain = authorization_domain(requirements, networks)?;
    let authorization = build_authorization(signer.address(), requirements, now)?;

    #[cfg(feature = "telemetry")]
    debug!(
        chain_id = domain.chain_id,
        from = %authorization.from,
        value = %authorization.value,
        "Signing transfer authorization"
    );

    let signature = signer.sign_authorization(&domain, &authorization).await?;
    Ok(PaymentPayload {
        x402_version: V1,
        scheme: requirements.scheme.clone(),
        network: requirements.network.clone(),
        payload: ExactPayload {
            signature,
            authorization,
        },
    })
}

/// Signs a payment and encodes it as an `X-PAYMENT` header value.
///
/// # Errors
///
/// Same as [`sign_payment`], plus [`PaymentError::Encoding`].
pub async fn create_payment_header<S: AuthorizationSigner>(
    signer: &S,
    requirements: &PaymentRequirements,
    networks: &NetworkRegistry,
    now: UnixTimestamp,
) -> Result<String, PaymentError> {
    let payload = sign_payment(signer, requirements, networks, now).await?;
    encoding::encode(&payload).map_err(PaymentError::Encoding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::TokenAmount;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSigner {
        calls: AtomicUsize,
        fail: bool,
    }

    impl AuthorizationSigner for CountingSigner {
        fn address(&self) -> Address {
            Address::repeat_byte(0x11)
        }

        async fn sign_authorization(
            &self,
            _domain: &AuthorizationDomain,
            _authorization: &ExactAuthorization,
        ) -> Result<Bytes, SignerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(SignerError::new("wallet locked"))
            } else {
                Ok(Bytes::from(vec![0xAA; 65]))
            }
        }
    }

    fn requirements() -> PaymentRequirements {
        PaymentRequirements {
            scheme: "exact".into(),
            network: "base-sepolia".into(),
            max_amount_required: TokenAmount::from(10_000u64),
            resource: "https://example.com".into(),
            description: "test".into(),
            mime_type: "text/plain".into(),
            output_schema: None,
            pay_to: "0x0000000000000000000000000000000000000002".into(),
            max_timeout_seconds: 1000,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".into(),
            extra: Some(serde_json::json!({ "name": "USDC", "version": "2" })),
        }
    }

    #[tokio::test]
    async fn builds_window_around_now() {
        let signer = CountingSigner::default();
        let now = UnixTimestamp::from_secs(1_700_000_000);
        let payload = sign_payment(&signer, &requirements(), &NetworkRegistry::default(), now)
            .await
            .unwrap();
        let auth = payload.payload.authorization;
        assert_eq!(auth.valid_after.as_secs(), 1_700_000_000 - 60);
        assert_eq!(auth.valid_before.as_secs(), 1_700_000_000 + 1000);
        assert!(auth.valid_before > auth.valid_after);
        assert_eq!(auth.value, TokenAmount::from(10_000u64));
        assert_eq!(auth.from, Address::repeat_byte(0x11));
        assert_eq!(auth.to, Address::with_last_byte(2));
        assert_eq!(payload.network, "base-sepolia");
        assert_eq!(signer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_scheme_never_reaches_signer() {
        let signer = CountingSigner::default();
        let mut req = requirements();
        req.scheme = "unsupported".into();
        let err = sign_payment(&signer, &req, &NetworkRegistry::default(), UnixTimestamp::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedScheme));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_extra_is_configuration_error() {
        let signer = CountingSigner::default();
        let mut req = requirements();
        req.extra = Some(serde_json::json!({ "name": "USDC" }));
        let err = sign_payment(&signer, &req, &NetworkRegistry::default(), UnixTimestamp::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Configuration(_)));
        assert_eq!(signer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_network_is_configuration_error() {
        let signer = CountingSigner::default();
        let mut req = requirements();
        req.network = "narnia".into();
        let err = sign_payment(&signer, &req, &NetworkRegistry::default(), UnixTimestamp::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Configuration(_)));
    }

    #[tokio::test]
    async fn signer_failure_is_signing_error() {
        let signer = CountingSigner {
            fail: true,
            ..CountingSigner::default()
        };
        let err = sign_payment(
            &signer,
            &requirements(),
            &NetworkRegistry::default(),
            UnixTimestamp::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PaymentError::Signing(_)));
    }

    #[tokio::test]
    async fn signed_payload_survives_the_codec() {
        let signer = CountingSigner::default();
        let payload = sign_payment(
            &signer,
            &requirements(),
            &NetworkRegistry::default(),
            UnixTimestamp::now(),
        )
        .await
        .unwrap();
        let encoded = encoding::encode(&payload).unwrap();
        let decoded: PaymentPayload = encoding::decode(&encoded).unwrap();
        assert_eq!(decoded, payload);

        let header = create_payment_header(
            &signer,
            &requirements(),
            &NetworkRegistry::default(),
            UnixTimestamp::now(),
        )
        .await
        .unwrap();
        let decoded: PaymentPayload = encoding::decode(&header).unwrap();
        assert_eq!(decoded.scheme, "exact");
        assert_eq!(decoded.payload.signature, Bytes::from(vec![0xAA; 65]));
        assert_ne!(decoded.payload.authorization.nonce, payload.payload.authorization.nonce);
    }

    #[test]
    fn nonces_do_not_repeat() {
        let nonces: HashSet<B256> = (0..10_000).map(|_| generate_nonce()).collect();
        assert_eq!(nonces.len(), 10_000);
    }

    #[test]
    fn domain_comes_from_requirements() {
        let domain = authorization_domain(&requirements(), &NetworkRegistry::default()).unwrap();
        assert_eq!(domain.name, "USDC");
        assert_eq!(domain.version, "2");
        assert_eq!(domain.chain_id, 84532);
        assert_eq!(
            domain.verifying_contract,
            "0x036CbD53842c5426634e7929541eC2318f3dCF7e"
                .parse::<Address>()
                .unwrap()
        );
    }
}
