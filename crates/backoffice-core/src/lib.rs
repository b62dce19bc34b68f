//! # backoffice-core: Pure Business Logic for the Agency Back Office
//!
//! This crate holds the two algorithmic parts of the back office as pure
//! functions with zero I/O dependencies: the commission engine and the stock
//! ledger rules.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Agency Back-Office Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Web front end (ticket forms, stock screens)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            backoffice-db (transactions, repositories)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ backoffice-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌───────────┐  ┌───────────┐  ┌──────────┐  │   │
//! │  │   │ commission │  │   stock   │  │procurement│  │validation│  │   │
//! │  │   │ selection  │  │ plan      │  │ DRAFT →   │  │  rules   │  │   │
//! │  │   │ modes      │  │ reconcile │  │ APPROVED  │  │  checks  │  │   │
//! │  │   └────────────┘  └───────────┘  └───────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Airline, CommissionRule, Ticket, StockItem, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`commission`] - Rule selection, commission modes, airline overrides
//! - [`stock`] - Movement posting rules and reconciliation
//! - [`procurement`] - Need request state machine
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: the current time is always passed in
//! 2. **No I/O**: shared counters are read from snapshots and written by the db crate
//! 3. **Integer Money**: cents and basis points, one rounding per multiplication
//! 4. **Explicit Errors**: every rejection is a typed [`CoreError`]
//!
//! ## Example Usage
//!
//! ```rust
//! use backoffice_core::money::Money;
//! use backoffice_core::types::Rate;
//!
//! let base = Money::from_major_minor(1000, 0);
//! let commission = base.apply_rate(Rate::from_bps(700));
//! assert_eq!(commission.cents(), 7_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod commission;
pub mod error;
pub mod money;
pub mod procurement;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum length of free-text fields (justification, titles, routes).
pub const MAX_TEXT_LENGTH: usize = 500;

/// Currency assumed when a ticket does not name one.
pub const DEFAULT_CURRENCY: &str = "XAF";

/// Number of recent FINAL tickets used to estimate a base-fare ratio.
pub const ESTIMATION_HISTORY_WINDOW: i64 = 80;

/// Lower bound of an estimated base-fare ratio (0.20), basis points of one.
pub const MIN_BASE_FARE_RATIO: i64 = 2_000;

/// Upper bound of an estimated base-fare ratio (0.95).
pub const MAX_BASE_FARE_RATIO: i64 = 9_500;

/// Ratio used when neither history nor the rule provides one (0.60).
pub const DEFAULT_BASE_FARE_RATIO: i64 = 6_000;
