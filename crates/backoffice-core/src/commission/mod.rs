//! # Commission Engine
//!
//! Pure commission logic: nothing in here touches the database.
//!
//! ## Flow of a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  airline rules ──► selection ──► one CommissionRule (or rejection)     │
//! │                                      │                                  │
//! │  base fare / history ──► quote::resolve_commission_base                │
//! │                                      │                                  │
//! │                         compute ──► CommissionOutcome                  │
//! │                                      │                                  │
//! │  airline code ──► overrides ──► final rate, amount, mode               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`selection`] - route pattern matching and rule ranking
//! - [`compute`] - the four commission modes
//! - [`estimate`] - base-fare estimation from history
//! - [`overrides`] - per-airline contract formulas
//! - [`quote`] - assembly of a ticket's commission fields

pub mod compute;
pub mod estimate;
pub mod overrides;
pub mod quote;
pub mod selection;

pub use compute::{compute_commission_amount, CommissionOutcome, ResolvedRates};
pub use estimate::{estimate_base_fare, estimate_base_fare_ratio, FareSample};
pub use overrides::{AirlineOverride, OverrideContext, FST_BONUS_EVERY};
pub use quote::{
    deposit_increment, needs_estimation, quote_ticket_commission, require_base_fare,
    resolve_commission_base, PriorDepositCredit, QuoteRequest, ResolvedBase, TicketCommission,
};
pub use selection::{pick_commission_rule, RoutePattern};
