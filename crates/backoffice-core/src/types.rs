//! # Domain Types
//!
//! Core domain types used throughout the back office.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Airline      │◄──│ CommissionRule  │   │     Ticket      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  code (ACG, ET) │   │  route_pattern  │   │  amount_cents   │       │
//! │  │  name           │   │  mode, rates    │   │  route, class   │       │
//! │  └─────────────────┘   │  deposit batch  │   │  commission_*   │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   StockItem     │◄──│  StockMovement  │──►│  NeedRequest    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  name/cat/unit  │   │  IN | OUT, qty  │   │  DRAFT→APPROVED │       │
//! │  │  current_qty    │   │  justification  │   │  sealed_at      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Units
//! - money: `*_cents` fields, wrapped by [`Money`]
//! - percentages: `*_bps` fields, wrapped by [`Rate`] (700 = 7%)
//! - ratios in `0..=1`: basis points of one, wrapped by [`Ratio`] (6000 = 0.60)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Rate
// =============================================================================

/// Percentage rate in basis points (bps).
///
/// 1 bps = 0.01%, so 500 = 5%, 10 000 = 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(i64);

impl Rate {
    /// Creates a rate from basis points.
    #[inline]
    pub const fn from_bps(bps: i64) -> Self {
        Rate(bps)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    /// Zero rate.
    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Negative rates count as zero.
    #[inline]
    pub fn non_negative(self) -> Rate {
        Rate(self.0.max(0))
    }

    /// The rate `part` represents of `whole`: `part / whole × 100`, rounded
    /// half up to the basis point. Zero when `whole` is not positive.
    ///
    /// ```rust
    /// use backoffice_core::money::Money;
    /// use backoffice_core::types::Rate;
    ///
    /// let rate = Rate::of(Money::from_cents(650), Money::from_cents(700));
    /// assert_eq!(rate.bps(), 9286); // 92.86%
    /// assert!(Rate::of(Money::from_cents(650), Money::zero()).is_zero());
    /// ```
    pub fn of(part: Money, whole: Money) -> Rate {
        if !whole.is_positive() {
            return Rate::zero();
        }
        let scaled = part.cents() as i128 * 10_000;
        let whole = whole.cents() as i128;
        Rate(((scaled * 2 + whole).div_euclid(whole * 2)) as i64)
    }
}

impl Default for Rate {
    fn default() -> Self {
        Rate::zero()
    }
}

impl std::ops::Add for Rate {
    type Output = Rate;

    fn add(self, other: Rate) -> Rate {
        Rate(self.0 + other.0)
    }
}

// =============================================================================
// Ratio
// =============================================================================

/// A fraction in `0..=1` expressed in basis points of one (6000 = 0.60).
///
/// Used for base-fare ratios (`base_fare / amount`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Ratio(i64);

impl Ratio {
    #[inline]
    pub const fn from_bps(bps: i64) -> Self {
        Ratio(bps)
    }

    /// `part / whole`, rounded half up. Zero when `whole` is not positive.
    pub fn of(part: Money, whole: Money) -> Ratio {
        Ratio(Rate::of(part, whole).bps())
    }

    #[inline]
    pub const fn bps(&self) -> i64 {
        self.0
    }

    /// Clamps the ratio into `[min, max]`.
    pub fn clamp(self, min: Ratio, max: Ratio) -> Ratio {
        Ratio(self.0.clamp(min.0, max.0))
    }
}

// =============================================================================
// Travel Class
// =============================================================================

/// Cabin class of a ticket, optionally used to narrow a commission rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TravelClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl fmt::Display for TravelClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TravelClass::Economy => write!(f, "ECONOMY"),
            TravelClass::PremiumEconomy => write!(f, "PREMIUM_ECONOMY"),
            TravelClass::Business => write!(f, "BUSINESS"),
            TravelClass::First => write!(f, "FIRST"),
        }
    }
}

// =============================================================================
// Commission Mode & Status
// =============================================================================

/// Formula used to turn a sale amount into a commission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionMode {
    /// System rate applied to the commission base.
    #[default]
    Immediate,
    /// Fixed payout each time cumulative sales cross a deposit target.
    AfterDeposit,
    /// System rate plus markup rate.
    SystemPlusMarkup,
    /// Markup rate only.
    MarkupOnly,
}

impl fmt::Display for CommissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommissionMode::Immediate => write!(f, "IMMEDIATE"),
            CommissionMode::AfterDeposit => write!(f, "AFTER_DEPOSIT"),
            CommissionMode::SystemPlusMarkup => write!(f, "SYSTEM_PLUS_MARKUP"),
            CommissionMode::MarkupOnly => write!(f, "MARKUP_ONLY"),
        }
    }
}

/// Whether a ticket's commission base is a real base fare or an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Final,
    Estimated,
}

// =============================================================================
// Airline
// =============================================================================

/// An airline the agency sells tickets for.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Airline {
    pub id: String,
    /// IATA/ICAO-style code, unique. Drives the airline overrides.
    pub code: String,
    pub name: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Commission Rule
// =============================================================================

/// A commission rule of one airline.
///
/// Only `deposit_stock_consumed_cents` is ever touched by sale processing,
/// and it only grows.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CommissionRule {
    pub id: String,
    pub airline_id: String,

    /// Glob pattern over the route (`*` wildcard, case-insensitive).
    pub route_pattern: String,

    /// When set, the rule only applies to this cabin class.
    pub travel_class: Option<TravelClass>,

    pub commission_mode: CommissionMode,

    pub system_rate_bps: i64,
    pub markup_rate_bps: i64,

    /// Legacy flat rate, used when `system_rate_bps` is not set.
    pub rate_bps: i64,

    /// Fallback base-fare ratio for estimation, basis points of one.
    pub default_base_fare_ratio_bps: Option<i64>,

    pub deposit_stock_target_cents: i64,
    pub deposit_stock_consumed_cents: i64,
    pub batch_commission_cents: i64,

    #[ts(as = "String")]
    pub starts_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub ends_at: Option<DateTime<Utc>>,

    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CommissionRule {
    #[inline]
    pub fn system_rate(&self) -> Rate {
        Rate::from_bps(self.system_rate_bps)
    }

    #[inline]
    pub fn markup_rate(&self) -> Rate {
        Rate::from_bps(self.markup_rate_bps)
    }

    #[inline]
    pub fn flat_rate(&self) -> Rate {
        Rate::from_bps(self.rate_bps)
    }

    #[inline]
    pub fn deposit_target(&self) -> Money {
        Money::from_cents(self.deposit_stock_target_cents)
    }

    #[inline]
    pub fn deposit_consumed(&self) -> Money {
        Money::from_cents(self.deposit_stock_consumed_cents)
    }

    #[inline]
    pub fn batch_commission(&self) -> Money {
        Money::from_cents(self.batch_commission_cents)
    }

    pub fn default_base_fare_ratio(&self) -> Option<Ratio> {
        self.default_base_fare_ratio_bps.map(Ratio::from_bps)
    }

    /// Checks whether `now` falls inside the activation window.
    pub fn is_in_window(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && self.ends_at.map_or(true, |end| end >= now)
    }
}

// =============================================================================
// Ticket
// =============================================================================

/// One ticket sold by the agency.
///
/// The `commission_*` fields are always derived by the commission flow and
/// never written by hand.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Ticket {
    pub id: String,
    pub airline_id: String,
    pub seller_id: String,

    /// Sale price in cents.
    pub amount_cents: i64,
    /// ISO 4217 code.
    pub currency: String,
    pub route: String,
    pub travel_class: TravelClass,

    /// Airline cost component, when known.
    pub base_fare_cents: Option<i64>,
    /// Agency markup added on top of the base fare.
    pub agency_markup_cents: i64,
    /// Additional markup percentage granted on this sale.
    pub extra_markup_bps: i64,

    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,

    pub commission_rule_id: String,
    pub commission_rate_bps: i64,
    pub commission_cents: i64,
    pub commission_mode: CommissionMode,
    pub commission_base_cents: i64,
    pub commission_status: CommissionStatus,

    /// Part of the sale amount already counted against the rule's deposit
    /// counter. Zero unless the rule is AFTER_DEPOSIT.
    pub deposit_counted_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }

    #[inline]
    pub fn base_fare(&self) -> Option<Money> {
        self.base_fare_cents.map(Money::from_cents)
    }

    #[inline]
    pub fn commission(&self) -> Money {
        Money::from_cents(self.commission_cents)
    }

    #[inline]
    pub fn commission_rate(&self) -> Rate {
        Rate::from_bps(self.commission_rate_bps)
    }
}

// =============================================================================
// Stock
// =============================================================================

/// The unique identity of a stock item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockItemKey {
    pub name: String,
    pub category: String,
    pub unit: String,
}

impl StockItemKey {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        StockItemKey {
            name: name.into(),
            category: category.into(),
            unit: unit.into(),
        }
    }
}

impl fmt::Display for StockItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.category, self.unit)
    }
}

/// A named, categorized, unit-denominated inventory line.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockItem {
    pub id: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    /// Running balance, never negative.
    pub current_quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    pub fn key(&self) -> StockItemKey {
        StockItemKey::new(&self.name, &self.category, &self.unit)
    }
}

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementDirection {
    In,
    Out,
}

impl MovementDirection {
    /// Signed quantity change for a movement of `quantity` units.
    pub fn signed(&self, quantity: i64) -> i64 {
        match self {
            MovementDirection::In => quantity,
            MovementDirection::Out => -quantity,
        }
    }
}

impl fmt::Display for MovementDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MovementDirection::In => write!(f, "IN"),
            MovementDirection::Out => write!(f, "OUT"),
        }
    }
}

/// One append-only ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub item_id: String,
    pub direction: MovementDirection,
    /// Always > 0; the direction carries the sign.
    pub quantity: i64,
    pub justification: String,
    pub reference_doc: String,
    pub performed_by: String,
    pub need_request_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Need Request
// =============================================================================

/// Procurement request status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum NeedRequestStatus {
    #[default]
    Draft,
    Submitted,
    Approved,
    Rejected,
}

impl fmt::Display for NeedRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeedRequestStatus::Draft => write!(f, "DRAFT"),
            NeedRequestStatus::Submitted => write!(f, "SUBMITTED"),
            NeedRequestStatus::Approved => write!(f, "APPROVED"),
            NeedRequestStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// An approval-gated procurement request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct NeedRequest {
    pub id: String,
    pub title: String,
    pub details: Option<String>,
    pub requested_by: String,
    pub status: NeedRequestStatus,
    #[ts(as = "Option<String>")]
    pub submitted_at: Option<DateTime<Utc>>,
    pub reviewed_by: Option<String>,
    #[ts(as = "Option<String>")]
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Document-integrity marker stamped on approval.
    #[ts(as = "Option<String>")]
    pub sealed_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Audit Event
// =============================================================================

/// An append-only audit record.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditEvent {
    pub id: String,
    /// "TICKET", "STOCK_MOVEMENT", "NEED_REQUEST", ...
    pub entity_type: String,
    pub entity_id: String,
    /// "CREATED", "UPDATED", "POSTED", "APPROVED", ...
    pub action: String,
    pub actor_id: String,
    /// JSON snapshot of the entity.
    pub payload: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================
