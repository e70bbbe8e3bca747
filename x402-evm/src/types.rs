//! EIP-712 typed data for ERC-3009 transfer authorizations.

use alloy_primitives::{B256, U256};
use alloy_sol_types::{Eip712Domain, SolStruct, eip712_domain, sol};
use serde::{Deserialize, Serialize};
use x402_core::exact::AuthorizationDomain;
use x402_core::proto::ExactAuthorization;

sol!(
    /// Solidity-compatible struct definition for ERC-3009 `transferWithAuthorization`.
    ///
    /// Authorizes moving `value` tokens from `from` to `to`, valid strictly
    /// between `validAfter` and `validBefore`, identified by a unique `nonce`.
    /// Field order and types must match the token contract's type hash.
    #[derive(Serialize, Deserialize)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);

impl From<&ExactAuthorization> for TransferWithAuthorization {
    fn from(authorization: &ExactAuthorization) -> Self {
        Self {
            from: authorization.from,
            to: authorization.to,
            value: authorization.value.into(),
            validAfter: U256::from(authorization.valid_after.as_secs()),
            validBefore: U256::from(authorization.valid_before.as_secs()),
            nonce: authorization.nonce,
        }
    }
}

/// Converts the engine's domain description into an Alloy [`Eip712Domain`].
#[must_use]
pub fn eip712_domain(domain: &AuthorizationDomain) -> Eip712Domain {
    eip712_domain! {
        name: domain.name.clone(),
        version: domain.version.clone(),
        chain_id: domain.chain_id,
        verifying_contract: domain.verifying_contract,
    }
}

/// The EIP-712 digest a wallet signs for `authorization` under `domain`.
#[must_use]
pub fn signing_hash(domain: &AuthorizationDomain, authorization: &ExactAuthorization) -> B256 {
    TransferWithAuthorization::from(authorization).eip712_signing_hash(&eip712_domain(domain))
}
