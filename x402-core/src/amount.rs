//! Token amounts and human-readable money parsing.
//!
//! [`TokenAmount`] is an amount in the token's smallest unit, carried on the
//! wire as a decimal string. [`MoneyAmount`] is what an operator writes in a
//! configuration file (`"$0.01"`, `"1,000"`, `"0.001"`) and converts to a
//! [`TokenAmount`] once the token's decimals are known.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::LazyLock;

use alloy_primitives::U256;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// An amount in the token's smallest unit (e.g. `10000` for 0.01 USDC).
///
/// Serializes as a decimal string. Deserialization accepts only
/// non-negative base-10 integers, so fractional or signed values are
/// rejected at the codec boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenAmount(pub U256);

/// The string is not a non-negative base-10 integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("amount must be a non-negative integer, got {0:?}")]
pub struct TokenAmountParseError(String);

impl FromStr for TokenAmount {
    type Err = TokenAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TokenAmountParseError(s.to_owned()));
        }
        U256::from_str_radix(s, 10)
            .map(Self)
            .map_err(|_| TokenAmountParseError(s.to_owned()))
    }
}

impl Display for TokenAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u128> for TokenAmount {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

impl From<U256> for TokenAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<TokenAmount> for U256 {
    fn from(value: TokenAmount) -> Self {
        value.0
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A non-negative currency amount such as `$0.01`.
///
/// Currency symbols and thousands separators are ignored when parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoneyAmount(Decimal);

/// Reasons a money string cannot be used as a price.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyAmountParseError {
    /// Not a number once symbols are stripped.
    #[error("Invalid number format")]
    InvalidFormat,
    /// Outside the accepted range.
    #[error("Amount must be between 0.000000001 and 999999999")]
    OutOfRange,
    /// Signed amounts are never prices.
    #[error("Negative value is not allowed")]
    Negative,
    /// More fractional digits than the token can represent.
    #[error("Too big of a precision: {money} vs {token} on token")]
    WrongPrecision {
        /// Fractional digits in the money amount.
        money: u32,
        /// Decimals of the token.
        token: u32,
    },
}

static NON_NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d\.\-]+").expect("static pattern compiles"));

impl MoneyAmount {
    const MIN: Decimal = Decimal::from_parts(1, 0, 0, false, 9);
    const MAX: Decimal = Decimal::from_parts(999_999_999, 0, 0, false, 0);

    /// Parses a human-readable amount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyAmountParseError`] if the input is not a number, is
    /// negative, or falls outside the accepted range.
    pub fn parse(input: &str) -> Result<Self, MoneyAmountParseError> {
        let cleaned = NON_NUMERIC.replace_all(input, "");
        let parsed =
            Decimal::from_str(&cleaned).map_err(|_| MoneyAmountParseError::InvalidFormat)?;
        if parsed.is_sign_negative() && !parsed.is_zero() {
            return Err(MoneyAmountParseError::Negative);
        }
        if parsed < Self::MIN || parsed > Self::MAX {
            return Err(MoneyAmountParseError::OutOfRange);
        }
        Ok(Self(parsed))
    }

    /// Number of digits after the decimal point.
    #[must_use]
    pub const fn scale(&self) -> u32 {
        self.0.scale()
    }

    /// Converts to base units of a token with `decimals` decimals.
    ///
    /// `$0.01` with 6 decimals is `10000`.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyAmountParseError::WrongPrecision`] if the amount has
    /// more fractional digits than the token.
    pub fn to_token_amount(&self, decimals: u8) -> Result<TokenAmount, MoneyAmountParseError> {
        let normalized = self.0.normalize();
        let scale = normalized.scale();
        let token = u32::from(decimals);
        if scale > token {
            return Err(MoneyAmountParseError::WrongPrecision {
                money: scale,
                token,
            });
        }
        let mantissa = U256::from(normalized.mantissa().unsigned_abs());
        let factor = U256::from(10u8).pow(U256::from(token - scale));
        Ok(TokenAmount(mantissa * factor))
    }
}

impl FromStr for MoneyAmount {
    type Err = MoneyAmountParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for MoneyAmount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl<'de> Deserialize<'de> for MoneyAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for MoneyAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_amount_accepts_only_integers() {
        assert_eq!("10000".parse::<TokenAmount>().unwrap(), TokenAmount::from(10_000u64));
        assert!("1.5".parse::<TokenAmount>().is_err());
        assert!("-1".parse::<TokenAmount>().is_err());
        assert!("0x10".parse::<TokenAmount>().is_err());
        assert!("".parse::<TokenAmount>().is_err());
        assert!(serde_json::from_str::<TokenAmount>("\"1e3\"").is_err());
    }

    #[test]
    fn token_amount_is_a_json_string() {
        let amount = TokenAmount::from(1_000_000u64);
        assert_eq!(serde_json::to_string(&amount).unwrap(), "\"1000000\"");
    }

    #[test]
    fn money_to_base_units() {
        let money = MoneyAmount::parse("$0.01").unwrap();
        assert_eq!(money.to_token_amount(6).unwrap(), TokenAmount::from(10_000u64));

        let money = MoneyAmount::parse("1,000").unwrap();
        assert_eq!(
            money.to_token_amount(6).unwrap(),
            TokenAmount::from(1_000_000_000u64)
        );

        let money = MoneyAmount::parse("0.10").unwrap();
        assert_eq!(money.to_token_amount(6).unwrap(), TokenAmount::from(100_000u64));
    }

    #[test]
    fn money_rejects_bad_input() {
        assert_eq!(
            MoneyAmount::parse("abc"),
            Err(MoneyAmountParseError::InvalidFormat)
        );
        assert_eq!(
            MoneyAmount::parse("-5"),
            Err(MoneyAmountParseError::Negative)
        );
        assert_eq!(
            MoneyAmount::parse("0"),
            Err(MoneyAmountParseError::OutOfRange)
        );
        let too_precise = MoneyAmount::parse("0.0000001").unwrap();
        assert_eq!(
            too_precise.to_token_amount(6),
            Err(MoneyAmountParseError::WrongPrecision { money: 7, token: 6 })
        );
    }
}
