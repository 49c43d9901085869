//! Money value object.

use serde::{Deserialize, Serialize};

/// Money amount represented in cents to avoid floating point issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Weighted average of two stock lots, rounded half up.
    ///
    /// Returns `self` unchanged when both quantities are zero.
    pub fn weighted_average(self, qty: u32, other: Money, other_qty: u32) -> Money {
        let total_qty = i128::from(qty) + i128::from(other_qty);
        if total_qty == 0 {
            return self;
        }
        let total_value =
            i128::from(self.cents) * i128::from(qty) + i128::from(other.cents) * i128::from(other_qty);
        let rounded = (2 * total_value + total_qty) / (2 * total_qty);
        let cents = i64::try_from(rounded)
            .unwrap_or(if rounded < 0 { i64::MIN } else { i64::MAX });
        Money { cents }
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}
