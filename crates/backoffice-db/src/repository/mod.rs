//! # Repository Module
//!
//! Database repositories for the back-office.
//!
//! ## Transaction Scope
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Flow repositories own their transaction:                               │
//! │                                                                         │
//! │  TicketRepository::create / update / delete                            │
//! │  StockRepository::post_movement                                        │
//! │  NeedRequestRepository::insert / submit / approve / reject             │
//! │       │                                                                 │
//! │       │  &mut SqliteConnection (the open transaction)                  │
//! │       ▼                                                                 │
//! │  Transaction-scoped helpers, associated fns taking the connection:     │
//! │  ├── AirlineRepository::fetch                                          │
//! │  ├── CommissionRuleRepository::active_for_airline / increment_consumed │
//! │  ├── NeedRequestRepository::status_in                                  │
//! │  └── AuditRepository::record                                           │
//! │                                                                         │
//! │  Helpers never commit. The flow commits once, or drops the             │
//! │  transaction and everything rolls back.                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`airline::AirlineRepository`] - Airline reference data
//! - [`commission_rule::CommissionRuleRepository`] - Rule catalog and deposit counters
//! - [`ticket::TicketRepository`] - Ticket sales and commission
//! - [`stock::StockRepository`] - Stock ledger
//! - [`need_request::NeedRequestRepository`] - Procurement requests
//! - [`audit::AuditRepository`] - Audit trail

pub mod airline;
pub mod audit;
pub mod commission_rule;
pub mod need_request;
pub mod stock;
pub mod ticket;
