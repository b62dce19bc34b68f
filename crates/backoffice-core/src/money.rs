//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Commission at 7% on 1 234.55 accumulated over thousands of tickets    │
//! │  drifts by whole currency units.                                       │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    123455 cents × 700 bps / 10000 = 8641.85 → 8642 cents               │
//! │    One explicit rounding per multiplication, nowhere else              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use backoffice_core::money::Money;
//! use backoffice_core::types::Rate;
//!
//! let fare = Money::from_major_minor(1000, 0);
//! let commission = fare.apply_rate(Rate::from_bps(700)); // 7%
//! assert_eq!(commission, Money::from_major_minor(70, 0));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::{Ratio, Rate};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents).
///
/// The ticket currency travels next to the amount; `Money` itself is
/// currency-agnostic, exactly like the amounts stored in the database.
///
/// ## Where Money is Used
/// ```text
/// Ticket.amount ──┬──► commission base (explicit or estimated base fare)
///                 │          │
///                 │          └──► Money::apply_rate(rule rate) ──► commission
///                 │
///                 └──► AFTER_DEPOSIT counter (CommissionRule.consumed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ```rust
    /// use backoffice_core::money::Money;
    ///
    /// let fare = Money::from_cents(125_050);
    /// assert_eq!(fare.cents(), 125_050);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is strictly greater than zero.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies the amount by a percentage rate, rounding half up to the
    /// nearest cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, widened to i128 so large
    /// cumulative amounts cannot overflow.
    ///
    /// ```rust
    /// use backoffice_core::money::Money;
    /// use backoffice_core::types::Rate;
    ///
    /// let base = Money::from_cents(1000);
    /// // 10.00 × 8.25% = 0.825 → 0.83
    /// assert_eq!(base.apply_rate(Rate::from_bps(825)).cents(), 83);
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let cents = (self.0 as i128 * rate.bps() as i128 + 5000).div_euclid(10000);
        Money::from_cents(cents as i64)
    }

    /// Multiplies the amount by a ratio in `0..=1`, rounding half up.
    ///
    /// Used to turn a sale amount into an estimated base fare.
    pub fn apply_ratio(&self, ratio: Ratio) -> Money {
        let cents = (self.0 as i128 * ratio.bps() as i128 + 5000).div_euclid(10000);
        Money::from_cents(cents as i64)
    }

    /// Number of whole `chunk`-sized blocks contained in this amount.
    ///
    /// Returns 0 when `chunk` is not positive.
    ///
    /// ```rust
    /// use backoffice_core::money::Money;
    ///
    /// let consumed = Money::from_major_minor(10_200, 0);
    /// assert_eq!(consumed.whole_multiples_of(Money::from_major_minor(10_000, 0)), 1);
    /// ```
    pub fn whole_multiples_of(&self, chunk: Money) -> i64 {
        if chunk.0 <= 0 {
            return 0;
        }
        self.0.div_euclid(chunk.0)
    }

    /// Returns the larger of `self` and zero.
    #[inline]
    pub fn clamp_non_negative(self) -> Money {
        if self.0 < 0 {
            Money::zero()
        } else {
            self
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Shows the amount as `major.minor` without a currency symbol.
///
/// For debugging and logs. The front end owns localized formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by a count (e.g. number of completed batches).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
