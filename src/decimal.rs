use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Money type rounded to cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(from = "Decimal")]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// create from decimal
    pub fn from_decimal(d: Decimal) -> Self {
        Money(d.round_dp(2))
    }

    /// create from string with exact parsing
    pub fn from_str_exact(s: &str) -> Result<Self, rust_decimal::Error> {
        Ok(Money(Decimal::from_str(s.trim())?.round_dp(2)))
    }

    /// create from integer amount (dollars, euros, etc)
    pub fn from_major(amount: i64) -> Self {
        Money(Decimal::from(amount))
    }

    /// create from minor amount (cents)
    pub fn from_minor(amount: i64) -> Self {
        Money(Decimal::new(amount, 2))
    }

    /// get underlying decimal
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// strictly below zero; negative zero counts as zero
    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::from_str_exact(s)
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Money::from_decimal(d)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, other: Money) -> Money {
        Money((self.0 + other.0).round_dp(2))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Money) {
        self.0 = (self.0 + other.0).round_dp(2);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_rounds_to_cents() {
        let m = Money::from_str_exact("120.456").unwrap();
        assert_eq!(m.to_string(), "120.46");
        assert_eq!(Money::from_minor(4599), Money::from_decimal(dec!(45.99)));
    }

    #[test]
    fn test_display_pads_cents() {
        assert_eq!(Money::from_major(80).to_string(), "80.00");
    }

    #[test]
    fn test_negative_detection() {
        assert!(Money::from_decimal(dec!(-0.01)).is_negative());
        assert!(!Money::ZERO.is_negative());
        assert!(!Money::from_decimal(dec!(-0.001)).is_negative());
    }

    #[test]
    fn test_parse_rounds_to_cents() {
        let m: Money = " 19.999 ".parse().unwrap();
        assert_eq!(m.as_decimal(), dec!(20.00));
        assert!("twelve".parse::<Money>().is_err());
    }

    #[test]
    fn test_deserialize_rounds_to_cents() {
        let m: Money = serde_json::from_str("\"1.239\"").unwrap();
        assert_eq!(m.as_decimal(), dec!(1.24));
        assert_eq!(serde_json::to_string(&m).unwrap(), "\"1.24\"");
    }

    #[test]
    fn test_sum_of_payments() {
        let total: Money = [Money::from_major(10), Money::from_minor(550)].into_iter().sum();
        assert_eq!(total, Money::from_minor(1550));
    }
}
