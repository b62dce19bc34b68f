//! Fixed catalog of the agency's airlines and their default rules.
//!
//! Seeding is idempotent: airlines already present are left untouched.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::ServiceResult;
use crate::pool::Database;
use crate::repository::commission_rule::NewCommissionRule;
use backoffice_core::{Airline, CommissionMode};

/// One catalog line: an airline and its wildcard rule.
#[derive(Debug, Clone, Copy)]
pub struct CatalogEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub mode: CommissionMode,
    pub system_rate_bps: i64,
    pub markup_rate_bps: i64,
    pub deposit_target_cents: i64,
    pub batch_commission_cents: i64,
}

impl CatalogEntry {
    const fn immediate(code: &'static str, name: &'static str, system_rate_bps: i64) -> Self {
        CatalogEntry {
            code,
            name,
            mode: CommissionMode::Immediate,
            system_rate_bps,
            markup_rate_bps: 0,
            deposit_target_cents: 0,
            batch_commission_cents: 0,
        }
    }
}

/// ACG, MGB, ET and FST carry contract overrides; their rule only needs to
/// match.
pub const DEFAULT_CATALOG: &[CatalogEntry] = &[
    CatalogEntry::immediate("ACG", "ACG Airlines", 500),
    CatalogEntry::immediate("MGB", "MGB Airlines", 900),
    CatalogEntry {
        code: "ET",
        name: "Ethiopian Airlines",
        mode: CommissionMode::SystemPlusMarkup,
        system_rate_bps: 500,
        markup_rate_bps: 0,
        deposit_target_cents: 0,
        batch_commission_cents: 0,
    },
    CatalogEntry::immediate("FST", "FST Airlines", 0),
    CatalogEntry::immediate("AF", "Air France", 700),
    CatalogEntry {
        code: "KQ",
        name: "Kenya Airways",
        mode: CommissionMode::AfterDeposit,
        system_rate_bps: 0,
        markup_rate_bps: 0,
        deposit_target_cents: 1_000_000_000,
        batch_commission_cents: 6_500_000,
    },
];

/// Creates the missing catalog airlines with a wildcard rule each.
///
/// Returns the airlines created by this call.
pub async fn default_catalog(db: &Database, starts_at: DateTime<Utc>) -> ServiceResult<Vec<Airline>> {
    let mut created = Vec::new();

    for entry in DEFAULT_CATALOG {
        if db.airlines().get_by_code(entry.code).await?.is_some() {
            debug!(code = entry.code, "Airline already seeded");
            continue;
        }

        let airline = db.airlines().insert(entry.code, entry.name).await?;

        let mut rule = NewCommissionRule::wildcard(&airline.id, starts_at);
        rule.commission_mode = entry.mode;
        rule.system_rate_bps = entry.system_rate_bps;
        rule.markup_rate_bps = entry.markup_rate_bps;
        rule.deposit_stock_target_cents = entry.deposit_target_cents;
        rule.batch_commission_cents = entry.batch_commission_cents;
        db.commission_rules().insert(rule).await?;

        created.push(airline);
    }

    info!(created = created.len(), catalog = DEFAULT_CATALOG.len(), "Airline catalog seeded");
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use chrono::Duration;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let starts_at = Utc::now() - Duration::days(1);

        let first = default_catalog(&db, starts_at).await.unwrap();
        assert_eq!(first.len(), DEFAULT_CATALOG.len());

        let second = default_catalog(&db, starts_at).await.unwrap();
        assert!(second.is_empty());

        for airline in db.airlines().list().await.unwrap() {
            let rules = db.commission_rules().list_active_for_airline(&airline.id).await.unwrap();
            assert_eq!(rules.len(), 1, "{}", airline.code);
            assert_eq!(rules[0].route_pattern, "*");
        }
    }
}
