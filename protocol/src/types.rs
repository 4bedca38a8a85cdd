//! Core value types for OFFPAY handoffs.
//!
//! These are the nouns every message and session is made of. They are kept
//! small and cheap to clone because a session is copied on every accepted
//! transition.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{MAX_WIRE_MINOR, MONEY_DECIMALS, MONEY_SCALE};

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// Errors produced when turning user or wire input into [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount must not be negative")]
    Negative,

    /// NaN or infinity.
    #[error("amount is not a finite number")]
    NotFinite,

    /// The amount is above [`Money::MAX`].
    #[error("amount is too large")]
    Overflow,

    /// The text is not a plain decimal like `40` or `12.50`.
    #[error("invalid amount {0:?}: expected digits with at most {MONEY_DECIMALS} decimals")]
    Invalid(String),
}

/// A non-negative monetary amount held as an integer count of minor units.
///
/// `Money::from_minor(4050)` is 40.50. Balance arithmetic never sees a float;
/// floats only appear at the JSON boundary, where the wire carries the amount
/// as a number in major units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(u64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// The largest amount a message can carry exactly.
    pub const MAX: Money = Money(MAX_WIRE_MINOR);

    /// Creates an amount from minor units (cents).
    ///
    /// Unchecked: balances may exceed [`Money::MAX`], transfers may not. Use
    /// [`Money::checked`] before putting the amount in a message.
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Creates an amount from whole major units.
    pub fn from_major(major: u64) -> Result<Self, MoneyError> {
        major
            .checked_mul(MONEY_SCALE)
            .map(Self)
            .ok_or(MoneyError::Overflow)?
            .checked()
    }

    /// `self`, or [`MoneyError::Overflow`] above [`Money::MAX`].
    pub fn checked(self) -> Result<Self, MoneyError> {
        if self.0 > MAX_WIRE_MINOR {
            return Err(MoneyError::Overflow);
        }
        Ok(self)
    }

    /// Converts a wire number in major units, rounding to the nearest cent.
    pub fn from_f64(value: f64) -> Result<Self, MoneyError> {
        if !value.is_finite() {
            return Err(MoneyError::NotFinite);
        }
        if value < 0.0 {
            return Err(MoneyError::Negative);
        }
        let minor = (value * MONEY_SCALE as f64).round();
        if minor > MAX_WIRE_MINOR as f64 {
            return Err(MoneyError::Overflow);
        }
        Ok(Self(minor as u64))
    }

    /// The amount in minor units.
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// The amount in major units as a float, for the wire only.
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / MONEY_SCALE as f64
    }

    /// Returns `true` if the amount is zero.
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds, returning `None` on overflow.
    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Subtracts, returning `None` if `other` is larger.
    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0>width$}",
            self.0 / MONEY_SCALE,
            self.0 % MONEY_SCALE,
            width = MONEY_DECIMALS
        )
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    /// Parses `40`, `40.5` or `40.25`. Signs, exponents and more than two
    /// decimals are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || MoneyError::Invalid(s.to_string());

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
            || frac.len() > MONEY_DECIMALS
        {
            return Err(invalid());
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| MoneyError::Overflow)?
        };
        let frac: u64 = if frac.is_empty() {
            0
        } else {
            // "5" means 50 cents, "05" means 5.
            format!("{:0<width$}", frac, width = MONEY_DECIMALS)
                .parse()
                .map_err(|_| invalid())?
        };

        Money::from_major(whole)?
            .checked_add(Money(frac))
            .ok_or(MoneyError::Overflow)?
            .checked()
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % MONEY_SCALE == 0 {
            serializer.serialize_u64(self.0 / MONEY_SCALE)
        } else {
            serializer.serialize_f64(self.to_f64())
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    /// Whole numbers are read as integers; only fractional amounts go
    /// through `f64`.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let number = serde_json::Number::deserialize(deserializer)?;
        let money = match (number.as_u64(), number.as_f64()) {
            (Some(major), _) => Money::from_major(major),
            (None, Some(value)) => Money::from_f64(value),
            (None, None) => Err(MoneyError::NotFinite),
        };
        money.map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A participant's phone number or user id, compared byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wraps a raw identity string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Picks the phone number, then the user id, then `fallback`. Empty
    /// strings count as absent.
    pub fn resolve(phone: Option<&str>, user_id: Option<&str>, fallback: &str) -> Self {
        phone
            .filter(|p| !p.is_empty())
            .or(user_id.filter(|u| !u.is_empty()))
            .map(Self::new)
            .unwrap_or_else(|| Self::new(fallback))
    }

    /// The identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// TransactionId
// ---------------------------------------------------------------------------

/// Token binding every message of one transfer from INIT onward.
///
/// Minted by the sender as a UUIDv4. Incoming ids are not parsed as UUIDs:
/// the receiver binds whatever string the sender chose and only ever compares
/// it for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Mints a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing id.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TransactionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display_pads_cents() {
        assert_eq!(Money::from_minor(4000).to_string(), "40.00");
        assert_eq!(Money::from_minor(1205).to_string(), "12.05");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }

    #[test]
    fn money_parses_user_input() {
        assert_eq!("40".parse::<Money>().unwrap(), Money::from_minor(4000));
        assert_eq!("40.5".parse::<Money>().unwrap(), Money::from_minor(4050));
        assert_eq!("0.05".parse::<Money>().unwrap(), Money::from_minor(5));
        assert_eq!(".5".parse::<Money>().unwrap(), Money::from_minor(50));
    }

    #[test]
    fn money_rejects_bad_input() {
        assert!(matches!("-1".parse::<Money>(), Err(MoneyError::Invalid(_))));
        assert!(matches!("1.234".parse::<Money>(), Err(MoneyError::Invalid(_))));
        assert!(matches!("abc".parse::<Money>(), Err(MoneyError::Invalid(_))));
        assert!(matches!(".".parse::<Money>(), Err(MoneyError::Invalid(_))));
        assert!(matches!("".parse::<Money>(), Err(MoneyError::Invalid(_))));
    }

    #[test]
    fn money_from_wire_number() {
        assert_eq!(Money::from_f64(40.0).unwrap(), Money::from_minor(4000));
        assert_eq!(Money::from_f64(0.1 + 0.2).unwrap(), Money::from_minor(30));
        assert_eq!(Money::from_f64(-0.01), Err(MoneyError::Negative));
        assert_eq!(Money::from_f64(f64::NAN), Err(MoneyError::NotFinite));
        assert_eq!(Money::from_f64(1e30), Err(MoneyError::Overflow));
    }

    #[test]
    fn money_serializes_whole_amounts_as_integers() {
        assert_eq!(serde_json::to_string(&Money::from_minor(4000)).unwrap(), "40");
        assert_eq!(serde_json::to_string(&Money::from_minor(4050)).unwrap(), "40.5");

        let m: Money = serde_json::from_str("12.25").unwrap();
        assert_eq!(m, Money::from_minor(1225));
        assert!(serde_json::from_str::<Money>("\"12\"").is_err());
    }

    #[test]
    fn money_ceiling_applies_to_every_constructor() {
        let max = Money::MAX.minor();
        assert_eq!(Money::from_minor(max).checked(), Ok(Money::MAX));
        assert_eq!(Money::from_minor(max + 1).checked(), Err(MoneyError::Overflow));
        assert_eq!(Money::from_major(max / 100 + 1), Err(MoneyError::Overflow));
        assert_eq!(Money::from_f64(max as f64 / 100.0 + 1.0), Err(MoneyError::Overflow));
        assert_eq!(
            "9007199254740993".parse::<Money>(),
            Err(MoneyError::Overflow)
        );
    }

    #[test]
    fn money_wire_round_trip_is_exact_up_to_the_ceiling() {
        for minor in [Money::MAX.minor(), Money::MAX.minor() - 1, Money::MAX.minor() - 99] {
            let m = Money::from_minor(minor);
            let json = serde_json::to_string(&m).unwrap();
            assert_eq!(serde_json::from_str::<Money>(&json).unwrap(), m, "{json}");
        }

        // Whole amounts never go through a float.
        let whole = Money::from_major(Money::MAX.minor() / 100).unwrap();
        let json = serde_json::to_string(&whole).unwrap();
        assert!(!json.contains('.') && !json.contains('e'));
        assert_eq!(serde_json::from_str::<Money>(&json).unwrap(), whole);
    }

    #[test]
    fn money_above_the_ceiling_is_refused_not_rounded() {
        assert!(serde_json::from_str::<Money>("9007199254740993").is_err());
        assert!(serde_json::from_str::<Money>("1.8446744073709552e17").is_err());
        assert!(serde_json::from_str::<Money>("-5").is_err());
    }

    #[test]
    fn money_checked_arithmetic() {
        let a = Money::from_minor(100);
        assert_eq!(a.checked_sub(Money::from_minor(101)), None);
        assert_eq!(a.checked_sub(a), Some(Money::ZERO));
        assert_eq!(Money::from_minor(u64::MAX).checked_add(a), None);
    }

    #[test]
    fn identity_resolution_order() {
        assert_eq!(
            Identity::resolve(Some("+5511999"), Some("u-1"), "unknown").as_str(),
            "+5511999"
        );
        assert_eq!(Identity::resolve(None, Some("u-1"), "unknown").as_str(), "u-1");
        assert_eq!(Identity::resolve(Some(""), None, "unknown").as_str(), "unknown");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = TransactionId::generate();
        let b = TransactionId::generate();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(a.as_str()).is_ok());
    }
}
