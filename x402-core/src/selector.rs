//! Requirement selection.
//!
//! A `402` offer may list several acceptable payment options. A
//! [`RequirementsSelector`] picks the one the client pays. The
//! [`DefaultSelector`] takes the first `exact` option in server order, with a
//! preference for the deployment's default network when two options differ
//! only in network.

use crate::amount::TokenAmount;
use crate::error::PaymentError;
use crate::proto::{EXACT_SCHEME, PaymentRequirements};

/// Network preferred by [`DefaultSelector`] unless configured otherwise.
pub const DEFAULT_PREFERRED_NETWORK: &str = "base";

/// Caller-side constraints on which options may be selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionFilters {
    /// Only options with this scheme.
    pub scheme: Option<String>,
    /// Only options on this network.
    pub network: Option<String>,
}

impl SelectionFilters {
    /// No constraints.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            scheme: None,
            network: None,
        }
    }

    /// Restricts selection to `scheme`.
    #[must_use]
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = Some(scheme.into());
        self
    }

    /// Restricts selection to `network`.
    #[must_use]
    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Returns `true` if `requirements` passes both filters.
    #[must_use]
    pub fn admits(&self, requirements: &PaymentRequirements) -> bool {
        self.scheme
            .as_deref()
            .is_none_or(|scheme| scheme == requirements.scheme)
            && self
                .network
                .as_deref()
                .is_none_or(|network| network == requirements.network)
    }
}

/// Strategy choosing one requirement out of an offer.
///
/// Implementations must be pure: the same input always yields the same
/// output. Closures with the matching signature implement this trait.
pub trait RequirementsSelector: Send + Sync {
    /// Picks one of `accepts`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::UnsupportedScheme`] when nothing payable
    /// remains, or [`PaymentError::AmountExceeded`] when the pick is above the
    /// selector's ceiling.
    fn select(
        &self,
        accepts: &[PaymentRequirements],
        filters: &SelectionFilters,
    ) -> Result<PaymentRequirements, PaymentError>;
}

impl<F> RequirementsSelector for F
where
    F: Fn(&[PaymentRequirements], &SelectionFilters) -> Result<PaymentRequirements, PaymentError>
        + Send
        + Sync,
{
    fn select(
        &self,
        accepts: &[PaymentRequirements],
        filters: &SelectionFilters,
    ) -> Result<PaymentRequirements, PaymentError> {
        self(accepts, filters)
    }
}

/// First `exact` option in server order, with a default-network tie-break
/// and an optional amount ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultSelector {
    max_value: Option<TokenAmount>,
    preferred_network: String,
}

impl Default for DefaultSelector {
    fn default() -> Self {
        Self {
            max_value: None,
            preferred_network: DEFAULT_PREFERRED_NETWORK.to_owned(),
        }
    }
}

impl DefaultSelector {
    /// Selector with no ceiling preferring `"base"`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses requirements asking for more than `max_value` base units.
    #[must_use]
    pub const fn with_max_value(mut self, max_value: TokenAmount) -> Self {
        self.max_value = Some(max_value);
        self
    }

    /// Changes the network preferred by the tie-break.
    #[must_use]
    pub fn with_preferred_network(mut self, network: impl Into<String>) -> Self {
        self.preferred_network = network.into();
        self
    }

    /// The configured ceiling, if any.
    #[must_use]
    pub const fn max_value(&self) -> Option<TokenAmount> {
        self.max_value
    }
}

impl RequirementsSelector for DefaultSelector {
    fn select(
        &self,
        accepts: &[PaymentRequirements],
        filters: &SelectionFilters,
    ) -> Result<PaymentRequirements, PaymentError> {
        let candidates: Vec<&PaymentRequirements> = accepts
            .iter()
            .filter(|r| filters.admits(r) && r.scheme == EXACT_SCHEME)
            .collect();
        let first = candidates
            .first()
            .copied()
            .ok_or(PaymentError::UnsupportedScheme)?;
        let winner = if first.network == self.preferred_network {
            first
        } else {
            candidates
                .iter()
                .copied()
                .find(|c| c.network == self.preferred_network && first.differs_only_in_network(c))
                .unwrap_or(first)
        };
        check_ceiling(winner, self.max_value)?;
        Ok(winner.clone())
    }
}

/// Checks `requirements` against an optional ceiling in base units.
///
/// # Errors
///
/// Returns [`PaymentError::AmountExceeded`] when `requirements` asks for
/// more than `max_value`.
pub fn check_ceiling(
    requirements: &PaymentRequirements,
    max_value: Option<TokenAmount>,
) -> Result<(), PaymentError> {
    match max_value {
        Some(max) if requirements.max_amount_required > max => Err(PaymentError::AmountExceeded {
            required: requirements.max_amount_required,
            max,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn requirement(network: &str, amount: u64) -> PaymentRequirements {
        PaymentRequirements {
            scheme: EXACT_SCHEME.to_owned(),
            network: network.to_owned(),
            max_amount_required: TokenAmount::from(amount),
            resource: "https://example.com/paid".to_owned(),
            description: "test".to_owned(),
            mime_type: "text/plain".to_owned(),
            output_schema: None,
            pay_to: "0x0000000000000000000000000000000000000001".to_owned(),
            max_timeout_seconds: 1000,
            asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_owned(),
            extra: None,
        }
    }

    #[test]
    fn prefers_base_over_identical_testnet_option() {
        let accepts = vec![requirement("base-sepolia", 100), requirement("base", 100)];
        let selected = DefaultSelector::new()
            .select(&accepts, &SelectionFilters::none())
            .unwrap();
        assert_eq!(selected.network, "base");
    }

    #[test]
    fn keeps_server_order_when_options_differ_beyond_network() {
        let accepts = vec![requirement("base-sepolia", 100), requirement("base", 200)];
        let selected = DefaultSelector::new()
            .select(&accepts, &SelectionFilters::none())
            .unwrap();
        assert_eq!(selected.network, "base-sepolia");
    }

    #[test]
    fn selection_is_deterministic() {
        let accepts = vec![
            requirement("polygon", 5),
            requirement("base-sepolia", 5),
            requirement("base", 5),
        ];
        let selector = DefaultSelector::new();
        let first = selector.select(&accepts, &SelectionFilters::none()).unwrap();
        for _ in 0..10 {
            assert_eq!(
                selector.select(&accepts, &SelectionFilters::none()).unwrap(),
                first
            );
        }
    }

    #[test]
    fn filters_narrow_candidates() {
        let accepts = vec![requirement("base", 100), requirement("base-sepolia", 100)];
        let filters = SelectionFilters::none().with_network("base-sepolia");
        let selected = DefaultSelector::new().select(&accepts, &filters).unwrap();
        assert_eq!(selected.network, "base-sepolia");

        let filters = SelectionFilters::none().with_scheme("upto");
        assert!(matches!(
            DefaultSelector::new().select(&accepts, &filters),
            Err(PaymentError::UnsupportedScheme)
        ));
    }

    #[test]
    fn unsupported_scheme_only() {
        let mut option = requirement("base", 100);
        option.scheme = "unsupported".to_owned();
        assert!(matches!(
            DefaultSelector::new().select(&[option], &SelectionFilters::none()),
            Err(PaymentError::UnsupportedScheme)
        ));
        assert!(matches!(
            DefaultSelector::new().select(&[], &SelectionFilters::none()),
            Err(PaymentError::UnsupportedScheme)
        ));
    }

    #[test]
    fn ceiling_is_enforced() {
        let accepts = vec![requirement("base", 10_000)];
        let selector = DefaultSelector::new().with_max_value(TokenAmount::from(1000u64));
        let err = selector
            .select(&accepts, &SelectionFilters::none())
            .unwrap_err();
        assert!(matches!(err, PaymentError::AmountExceeded { .. }));

        let selector = DefaultSelector::new().with_max_value(TokenAmount::from(10_000u64));
        assert!(selector.select(&accepts, &SelectionFilters::none()).is_ok());
    }

    #[test]
    fn closures_are_selectors() {
        let last = |accepts: &[PaymentRequirements], _: &SelectionFilters| {
            accepts.last().cloned().ok_or(PaymentError::UnsupportedScheme)
        };
        let accepts = vec![requirement("base", 1), requirement("polygon", 2)];
        let selected = last.select(&accepts, &SelectionFilters::none()).unwrap();
        assert_eq!(selected.network, "polygon");
    }
}
