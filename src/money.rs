use std::fmt;

use serde::Serialize;

/// Amount of money, stored as a whole number of copper coins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    const SILVER: u64 = 100;
    const GOLD: u64 = 100 * Self::SILVER;

    pub const ZERO: Money = Money(0);

    pub fn from_copper(value: u64) -> Self {
        Money(value)
    }

    pub fn from_gold(gold: u64, silver: u64, copper: u64) -> Self {
        Money(gold * Self::GOLD + silver * Self::SILVER + copper)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// `None` when the sum exceeds the largest representable balance.
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Money)
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gold = self.0 / Self::GOLD;
        let silver = self.0 % Self::GOLD / Self::SILVER;
        let copper = self.0 % Self::SILVER;
        write!(f, "{gold}g {silver:02}s {copper:02}c")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_copper_preserves_value() {
        assert_eq!(Money::from_copper(123_456), Money(123_456));
    }

    #[test]
    fn from_gold_converts_correctly() {
        assert_eq!(Money::from_gold(1, 0, 0), Money::from_copper(10_000));
        assert_eq!(Money::from_gold(0, 1, 0), Money::from_copper(100));
        assert_eq!(Money::from_gold(2, 3, 4), Money::from_copper(20_304));
    }

    #[test]
    fn display_splits_denominations() {
        assert_eq!(Money::from_copper(20_304).to_string(), "2g 03s 04c");
        assert_eq!(Money::from_copper(0).to_string(), "0g 00s 00c");
        assert_eq!(Money::from_copper(99).to_string(), "0g 00s 99c");
    }

    #[test]
    fn checked_sub_refuses_underflow() {
        let a = Money::from_copper(100);
        assert_eq!(
            a.checked_sub(Money::from_copper(30)),
            Some(Money::from_copper(70))
        );
        assert_eq!(a.checked_sub(Money::from_copper(101)), None);
    }

    #[test]
    fn checked_add_refuses_overflow() {
        let a = Money::from_copper(u64::MAX - 5);
        assert_eq!(
            a.checked_add(Money::from_copper(5)),
            Some(Money::from_copper(u64::MAX))
        );
        assert_eq!(a.checked_add(Money::from_copper(6)), None);
        assert_eq!(
            a.saturating_add(Money::from_copper(6)),
            Money::from_copper(u64::MAX)
        );
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Money::default(), Money::ZERO);
        assert!(Money::default().is_zero());
    }
}
