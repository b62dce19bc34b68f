//! # backoffice-db: Persistence Layer for the Agency Back-Office
//!
//! SQLite storage, transactions and the ticket / stock / procurement flows.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Back-Office Data Flow                            │
//! │                                                                         │
//! │  Caller (web handler, seed binary)                                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  backoffice-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌────────────┐  │   │
//! │  │   │   Database    │    │    Repositories    │  │ Migrations │  │   │
//! │  │   │   (pool.rs)   │    │                    │  │ (embedded) │  │   │
//! │  │   │               │    │ TicketRepository   │  │            │  │   │
//! │  │   │ SqlitePool    │◄───│ StockRepository    │  │ 001_init   │  │   │
//! │  │   │ AppConfig     │    │ NeedRequestRepo    │  │            │  │   │
//! │  │   │               │    │ rules, airlines,   │  │            │  │   │
//! │  │   │               │    │ audit              │  │            │  │   │
//! │  │   └───────────────┘    └────────────────────┘  └────────────┘  │   │
//! │  │              │ pure decisions                                   │   │
//! │  │              ▼                                                  │   │
//! │  │        backoffice-core (commission, stock, procurement)        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - Environment configuration
//! - [`pool`] - Connection pool creation and repository access
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - `DbError`, `ServiceError` and error codes
//! - [`repository`] - Repository implementations
//! - [`seed`] - Default airline catalog
//!
//! ## Usage
//!
//! ```rust,ignore
//! use backoffice_db::{AppConfig, Database};
//!
//! let config = AppConfig::load()?;
//! let db = Database::new(config.db_config()).await?;
//!
//! let ticket = db.tickets().create(new_ticket).await?;
//! let posted = db.stock().post_movement(&key, MovementDirection::Out, 15, metadata).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod seed;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{AppConfig, ConfigError};
pub use error::{DbError, DbResult, ErrorCode, ServiceError, ServiceResult};
pub use pool::{Database, DbConfig};

pub use repository::airline::AirlineRepository;
pub use repository::audit::AuditRepository;
pub use repository::commission_rule::{CommissionRuleRepository, NewCommissionRule};
pub use repository::need_request::NeedRequestRepository;
pub use repository::stock::{MovementMetadata, PostedMovement, StockDrift, StockRepository};
pub use repository::ticket::{NewTicket, TicketRepository};
