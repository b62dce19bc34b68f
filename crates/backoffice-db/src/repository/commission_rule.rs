//! # Commission Rule Repository
//!
//! Rule catalog administration plus the one write sale processing makes to a
//! rule: the AFTER_DEPOSIT counter increment.
//!
//! ## Deposit Counter
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sale A (700) ─┐                                                        │
//! │                ├─► UPDATE commission_rules                              │
//! │  sale B (400) ─┘     SET consumed = consumed + ?                        │
//! │                      WHERE id = ? RETURNING consumed                    │
//! │                                                                         │
//! │  Each sale observes its own slice:                                     │
//! │    A: before = returned − 700      B: before = returned − 400          │
//! │  No batch is paid twice, none is skipped.                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use backoffice_core::validation::{
    validate_non_negative_cents, validate_rate_bps, validate_required_text,
};
use backoffice_core::{CommissionMode, CommissionRule, Money, TravelClass};

const RULE_COLUMNS: &str = r#"
    id, airline_id, route_pattern, travel_class, commission_mode,
    system_rate_bps, markup_rate_bps, rate_bps, default_base_fare_ratio_bps,
    deposit_stock_target_cents, deposit_stock_consumed_cents, batch_commission_cents,
    starts_at, ends_at, is_active, created_at, updated_at
"#;

/// Input for a new rule.
#[derive(Debug, Clone)]
pub struct NewCommissionRule {
    pub airline_id: String,
    pub route_pattern: String,
    pub travel_class: Option<TravelClass>,
    pub commission_mode: CommissionMode,
    pub system_rate_bps: i64,
    pub markup_rate_bps: i64,
    pub rate_bps: i64,
    pub default_base_fare_ratio_bps: Option<i64>,
    pub deposit_stock_target_cents: i64,
    pub batch_commission_cents: i64,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl NewCommissionRule {
    /// A wildcard IMMEDIATE rule with no rates, active from `starts_at`.
    pub fn wildcard(airline_id: impl Into<String>, starts_at: DateTime<Utc>) -> Self {
        NewCommissionRule {
            airline_id: airline_id.into(),
            route_pattern: "*".to_string(),
            travel_class: None,
            commission_mode: CommissionMode::Immediate,
            system_rate_bps: 0,
            markup_rate_bps: 0,
            rate_bps: 0,
            default_base_fare_ratio_bps: None,
            deposit_stock_target_cents: 0,
            batch_commission_cents: 0,
            starts_at,
            ends_at: None,
        }
    }
}

/// Repository for commission rules.
#[derive(Debug, Clone)]
pub struct CommissionRuleRepository {
    pool: SqlitePool,
}

impl CommissionRuleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRuleRepository { pool }
    }

    /// Validates and inserts a rule. The consumed counter starts at zero.
    pub async fn insert(&self, new: NewCommissionRule) -> ServiceResult<CommissionRule> {
        let route_pattern = validate_required_text("route pattern", &new.route_pattern)?;
        validate_rate_bps("system rate", new.system_rate_bps)?;
        validate_rate_bps("markup rate", new.markup_rate_bps)?;
        validate_rate_bps("rate", new.rate_bps)?;
        if let Some(ratio) = new.default_base_fare_ratio_bps {
            validate_rate_bps("default base fare ratio", ratio)?;
        }
        validate_non_negative_cents("deposit target", new.deposit_stock_target_cents)?;
        validate_non_negative_cents("batch commission", new.batch_commission_cents)?;

        let now = Utc::now();
        let rule = CommissionRule {
            id: Uuid::new_v4().to_string(),
            airline_id: new.airline_id,
            route_pattern,
            travel_class: new.travel_class,
            commission_mode: new.commission_mode,
            system_rate_bps: new.system_rate_bps,
            markup_rate_bps: new.markup_rate_bps,
            rate_bps: new.rate_bps,
            default_base_fare_ratio_bps: new.default_base_fare_ratio_bps,
            deposit_stock_target_cents: new.deposit_stock_target_cents,
            deposit_stock_consumed_cents: 0,
            batch_commission_cents: new.batch_commission_cents,
            starts_at: new.starts_at,
            ends_at: new.ends_at,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(
            id = %rule.id,
            airline_id = %rule.airline_id,
            pattern = %rule.route_pattern,
            mode = %rule.commission_mode,
            "Inserting commission rule"
        );

        sqlx::query(
            r#"
            INSERT INTO commission_rules (
                id, airline_id, route_pattern, travel_class, commission_mode,
                system_rate_bps, markup_rate_bps, rate_bps, default_base_fare_ratio_bps,
                deposit_stock_target_cents, deposit_stock_consumed_cents, batch_commission_cents,
                starts_at, ends_at, is_active, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9,
                ?10, ?11, ?12,
                ?13, ?14, ?15, ?16, ?17
            )
            "#,
        )
        .bind(&rule.id)
        .bind(&rule.airline_id)
        .bind(&rule.route_pattern)
        .bind(rule.travel_class)
        .bind(rule.commission_mode)
        .bind(rule.system_rate_bps)
        .bind(rule.markup_rate_bps)
        .bind(rule.rate_bps)
        .bind(rule.default_base_fare_ratio_bps)
        .bind(rule.deposit_stock_target_cents)
        .bind(rule.deposit_stock_consumed_cents)
        .bind(rule.batch_commission_cents)
        .bind(rule.starts_at)
        .bind(rule.ends_at)
        .bind(rule.is_active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        Ok(rule)
    }

    /// Gets a rule by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CommissionRule>> {
        let rule = sqlx::query_as::<_, CommissionRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM commission_rules WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rule)
    }

    /// Active rules of an airline. Window filtering is left to selection.
    pub async fn list_active_for_airline(&self, airline_id: &str) -> DbResult<Vec<CommissionRule>> {
        let mut conn = self.pool.acquire().await?;
        Self::active_for_airline(&mut conn, airline_id).await
    }

    /// Same as [`list_active_for_airline`](Self::list_active_for_airline), on
    /// a transaction's connection.
    pub async fn active_for_airline(
        conn: &mut SqliteConnection,
        airline_id: &str,
    ) -> DbResult<Vec<CommissionRule>> {
        let rules = sqlx::query_as::<_, CommissionRule>(&format!(
            "SELECT {RULE_COLUMNS} FROM commission_rules \
             WHERE airline_id = ?1 AND is_active = 1 \
             ORDER BY starts_at, id"
        ))
        .bind(airline_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rules)
    }

    /// Deactivates a rule. Rules are never deleted.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE commission_rules SET is_active = 0, updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Commission rule", id));
        }

        info!(rule_id = %id, "Commission rule deactivated");
        Ok(())
    }

    /// Atomically adds `increment` to the rule's consumed counter.
    ///
    /// Returns the counter value *before* this increment, which is the value
    /// the commission must be computed against.
    pub async fn increment_consumed(
        conn: &mut SqliteConnection,
        rule_id: &str,
        increment: Money,
        now: DateTime<Utc>,
    ) -> DbResult<Money> {
        let after: i64 = sqlx::query_scalar(
            r#"
            UPDATE commission_rules
            SET deposit_stock_consumed_cents = deposit_stock_consumed_cents + ?2,
                updated_at = ?3
            WHERE id = ?1
            RETURNING deposit_stock_consumed_cents
            "#,
        )
        .bind(rule_id)
        .bind(increment.cents())
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Commission rule", rule_id))?;

        let before = Money::from_cents(after) - increment;

        debug!(
            rule_id = %rule_id,
            increment = increment.cents(),
            before = before.cents(),
            after = after,
            "Deposit counter incremented"
        );

        Ok(before)
    }
}
