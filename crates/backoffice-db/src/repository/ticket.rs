//! # Ticket Repository
//!
//! Ticket sales and their derived commission.
//!
//! ## Commission Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION (create / update)                  │
//! │                                                                         │
//! │  1. load airline + its active rules                                    │
//! │  2. pick_commission_rule ──── none ──► NoApplicableRule (nothing kept) │
//! │  3. require_base_fare (ACG, MGB, ET)                                   │
//! │  4. resolve base: explicit │ sale amount │ estimate from history       │
//! │  5. AFTER_DEPOSIT: load this ticket's credit under the rule, then      │
//! │       UPDATE commission_rules ... RETURNING consumed                  │
//! │       → quote against the value before this sale's increment          │
//! │  6. FST: sale ordinal by (sold_at, id)                                 │
//! │  7. quote_ticket_commission → INSERT/UPDATE ticket → deposit credit    │
//! │       → audit event                                                    │
//! │                                                                         │
//! │  COMMIT ← ticket, counter and audit row move together                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Deleting a ticket never rolls a deposit counter back. A ticket keeps one
//! deposit credit per AFTER_DEPOSIT rule it was ever priced under, so moving
//! away from a rule and back only counts growth.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use crate::repository::airline::AirlineRepository;
use crate::repository::audit::{AuditRepository, ENTITY_TICKET};
use crate::repository::commission_rule::CommissionRuleRepository;
use backoffice_core::commission::{
    deposit_increment, needs_estimation, pick_commission_rule, quote_ticket_commission,
    require_base_fare, resolve_commission_base, AirlineOverride, FareSample, PriorDepositCredit,
    QuoteRequest, TicketCommission,
};
use backoffice_core::validation::{
    validate_currency, validate_non_negative_cents, validate_rate_bps, validate_required_text,
    validate_route, validate_sale_amount,
};
use backoffice_core::{
    CommissionMode, CommissionStatus, CoreError, Money, Rate, Ticket, TravelClass,
    DEFAULT_CURRENCY,
};

const TICKET_COLUMNS: &str = r#"
    id, airline_id, seller_id, amount_cents, currency, route, travel_class,
    base_fare_cents, agency_markup_cents, extra_markup_bps, sold_at,
    commission_rule_id, commission_rate_bps, commission_cents, commission_mode,
    commission_base_cents, commission_status, deposit_counted_cents,
    created_at, updated_at
"#;

// =============================================================================
// Input
// =============================================================================

/// Seller-entered ticket fields. Used for both creation and update.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewTicket {
    pub airline_id: String,
    pub seller_id: String,
    pub amount_cents: i64,
    /// Defaults to [`DEFAULT_CURRENCY`].
    pub currency: Option<String>,
    pub route: String,
    pub travel_class: TravelClass,
    pub base_fare_cents: Option<i64>,
    pub agency_markup_cents: i64,
    pub extra_markup_bps: i64,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
}

impl NewTicket {
    /// A ticket with no base fare and no markup.
    pub fn new(
        airline_id: impl Into<String>,
        seller_id: impl Into<String>,
        amount_cents: i64,
        route: impl Into<String>,
        travel_class: TravelClass,
        sold_at: DateTime<Utc>,
    ) -> Self {
        NewTicket {
            airline_id: airline_id.into(),
            seller_id: seller_id.into(),
            amount_cents,
            currency: None,
            route: route.into(),
            travel_class,
            base_fare_cents: None,
            agency_markup_cents: 0,
            extra_markup_bps: 0,
            sold_at,
        }
    }

    pub fn with_base_fare(mut self, cents: i64) -> Self {
        self.base_fare_cents = Some(cents);
        self
    }

    pub fn with_agency_markup(mut self, cents: i64) -> Self {
        self.agency_markup_cents = cents;
        self
    }

    fn validated(&self) -> ServiceResult<NewTicket> {
        validate_sale_amount(self.amount_cents)?;
        if let Some(base) = self.base_fare_cents {
            validate_non_negative_cents("base fare", base)?;
        }
        validate_non_negative_cents("agency markup", self.agency_markup_cents)?;
        validate_rate_bps("extra markup", self.extra_markup_bps)?;

        Ok(NewTicket {
            airline_id: validate_required_text("airline", &self.airline_id)?,
            seller_id: validate_required_text("seller", &self.seller_id)?,
            amount_cents: self.amount_cents,
            currency: Some(validate_currency(
                self.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
            )?),
            route: validate_route(&self.route)?,
            travel_class: self.travel_class,
            base_fare_cents: self.base_fare_cents,
            agency_markup_cents: self.agency_markup_cents,
            extra_markup_bps: self.extra_markup_bps,
            sold_at: self.sold_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for ticket sales.
#[derive(Debug, Clone)]
pub struct TicketRepository {
    pool: SqlitePool,
    /// Maximum number of past tickets sampled for base-fare estimation.
    history_window: i64,
}

impl TicketRepository {
    pub fn new(pool: SqlitePool, history_window: i64) -> Self {
        TicketRepository {
            pool,
            history_window,
        }
    }

    /// Records a sale and its commission.
    pub async fn create(&self, input: NewTicket) -> ServiceResult<Ticket> {
        let input = input.validated()?;
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let commission = Self::price(&mut tx, &id, &input, self.history_window, now).await?;
        let ticket = build_ticket(id, input, commission, now, now);

        sqlx::query(
            r#"
            INSERT INTO tickets (
                id, airline_id, seller_id, amount_cents, currency, route, travel_class,
                base_fare_cents, agency_markup_cents, extra_markup_bps, sold_at,
                commission_rule_id, commission_rate_bps, commission_cents, commission_mode,
                commission_base_cents, commission_status, deposit_counted_cents,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18,
                ?19, ?20
            )
            "#,
        )
        .bind(&ticket.id)
        .bind(&ticket.airline_id)
        .bind(&ticket.seller_id)
        .bind(ticket.amount_cents)
        .bind(&ticket.currency)
        .bind(&ticket.route)
        .bind(ticket.travel_class)
        .bind(ticket.base_fare_cents)
        .bind(ticket.agency_markup_cents)
        .bind(ticket.extra_markup_bps)
        .bind(ticket.sold_at)
        .bind(&ticket.commission_rule_id)
        .bind(ticket.commission_rate_bps)
        .bind(ticket.commission_cents)
        .bind(ticket.commission_mode)
        .bind(ticket.commission_base_cents)
        .bind(ticket.commission_status)
        .bind(ticket.deposit_counted_cents)
        .bind(ticket.created_at)
        .bind(ticket.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        Self::save_deposit_credit(&mut tx, &ticket, now).await?;

        AuditRepository::record(&mut *tx, ENTITY_TICKET, &ticket.id, "CREATED", &ticket.seller_id, &ticket, now)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            ticket_id = %ticket.id,
            amount = ticket.amount_cents,
            commission = ticket.commission_cents,
            mode = %ticket.commission_mode,
            "Ticket recorded"
        );

        Ok(ticket)
    }

    /// Replaces a ticket's seller-entered fields and recomputes its
    /// commission.
    pub async fn update(&self, id: &str, input: NewTicket) -> ServiceResult<Ticket> {
        let input = input.validated()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let existing = Self::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Ticket", id))?;

        let commission = Self::price(&mut tx, id, &input, self.history_window, now).await?;
        let ticket = build_ticket(existing.id, input, commission, existing.created_at, now);

        sqlx::query(
            r#"
            UPDATE tickets SET
                airline_id = ?2,
                seller_id = ?3,
                amount_cents = ?4,
                currency = ?5,
                route = ?6,
                travel_class = ?7,
                base_fare_cents = ?8,
                agency_markup_cents = ?9,
                extra_markup_bps = ?10,
                sold_at = ?11,
                commission_rule_id = ?12,
                commission_rate_bps = ?13,
                commission_cents = ?14,
                commission_mode = ?15,
                commission_base_cents = ?16,
                commission_status = ?17,
                deposit_counted_cents = ?18,
                updated_at = ?19
            WHERE id = ?1
            "#,
        )
        .bind(&ticket.id)
        .bind(&ticket.airline_id)
        .bind(&ticket.seller_id)
        .bind(ticket.amount_cents)
        .bind(&ticket.currency)
        .bind(&ticket.route)
        .bind(ticket.travel_class)
        .bind(ticket.base_fare_cents)
        .bind(ticket.agency_markup_cents)
        .bind(ticket.extra_markup_bps)
        .bind(ticket.sold_at)
        .bind(&ticket.commission_rule_id)
        .bind(ticket.commission_rate_bps)
        .bind(ticket.commission_cents)
        .bind(ticket.commission_mode)
        .bind(ticket.commission_base_cents)
        .bind(ticket.commission_status)
        .bind(ticket.deposit_counted_cents)
        .bind(ticket.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        Self::save_deposit_credit(&mut tx, &ticket, now).await?;

        AuditRepository::record(&mut *tx, ENTITY_TICKET, &ticket.id, "UPDATED", &ticket.seller_id, &ticket, now)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            ticket_id = %ticket.id,
            previous_commission = existing.commission_cents,
            commission = ticket.commission_cents,
            status = ?ticket.commission_status,
            "Ticket updated"
        );

        Ok(ticket)
    }

    /// Deletes a ticket. Deposit counters keep what the ticket added.
    pub async fn delete(&self, id: &str, actor_id: &str) -> ServiceResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let ticket = Self::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Ticket", id))?;

        sqlx::query("DELETE FROM tickets WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::from)?;

        AuditRepository::record(&mut *tx, ENTITY_TICKET, id, "DELETED", actor_id, &ticket, now).await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(ticket_id = %id, actor = %actor_id, "Ticket deleted");
        Ok(())
    }

    /// Gets a ticket by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Ticket>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Tickets of an airline in chronological sale order.
    pub async fn list_for_airline(&self, airline_id: &str) -> DbResult<Vec<Ticket>> {
        let tickets = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE airline_id = ?1 ORDER BY sold_at, id"
        ))
        .bind(airline_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(tickets)
    }

    // =========================================================================
    // Commission
    // =========================================================================

    /// Runs the commission flow on the transaction's connection.
    ///
    /// May increment the matched rule's deposit counter, so the caller must
    /// commit or drop the transaction together with the ticket write.
    async fn price(
        conn: &mut SqliteConnection,
        ticket_id: &str,
        input: &NewTicket,
        history_window: i64,
        now: DateTime<Utc>,
    ) -> ServiceResult<TicketCommission> {
        let airline = AirlineRepository::fetch(conn, &input.airline_id)
            .await?
            .ok_or_else(|| DbError::not_found("Airline", &input.airline_id))?;

        let rules = CommissionRuleRepository::active_for_airline(conn, &airline.id).await?;
        let matched = pick_commission_rule(&rules, &input.route, input.travel_class, now)
            .ok_or_else(|| CoreError::NoApplicableRule {
                airline: airline.code.clone(),
                route: input.route.clone(),
                travel_class: input.travel_class,
            })?;

        debug!(
            ticket_id = %ticket_id,
            airline = %airline.code,
            rule_id = %matched.id,
            pattern = %matched.route_pattern,
            "Commission rule selected"
        );

        let airline_override = AirlineOverride::for_code(&airline.code);
        let sale_amount = Money::from_cents(input.amount_cents);
        let base_fare = input.base_fare_cents.map(Money::from_cents);

        require_base_fare(airline_override, &airline.code, base_fare)?;

        let history = if needs_estimation(base_fare, matched) {
            Self::fare_history(conn, &airline.id, ticket_id, history_window).await?
        } else {
            Vec::new()
        };
        let base = resolve_commission_base(sale_amount, base_fare, matched, &history);

        if base.status == CommissionStatus::Estimated {
            debug!(
                ticket_id = %ticket_id,
                samples = history.len(),
                estimated_base = base.amount.cents(),
                "Commission base estimated"
            );
        }

        let prior = if matched.commission_mode == CommissionMode::AfterDeposit {
            Self::deposit_credit(conn, ticket_id, &matched.id).await?
        } else {
            None
        };

        let increment = deposit_increment(sale_amount, matched, prior.as_ref());
        let mut rule = matched.clone();
        if increment.is_positive() {
            let before =
                CommissionRuleRepository::increment_consumed(conn, &rule.id, increment, now).await?;
            rule.deposit_stock_consumed_cents = before.cents();
        }

        let sale_ordinal = if airline_override.needs_sale_ordinal() {
            Self::sale_ordinal(conn, &airline.id, ticket_id, input.sold_at).await?
        } else {
            0
        };

        Ok(quote_ticket_commission(&QuoteRequest {
            rule: &rule,
            airline_override,
            sale_amount,
            base,
            agency_markup: Money::from_cents(input.agency_markup_cents),
            extra_markup: Rate::from_bps(input.extra_markup_bps),
            sale_ordinal,
            deposit_increment: increment,
            prior: prior.as_ref(),
        }))
    }

    /// Recent FINAL tickets of the airline with a known base fare, newest
    /// first, excluding `ticket_id`.
    async fn fare_history(
        conn: &mut SqliteConnection,
        airline_id: &str,
        ticket_id: &str,
        limit: i64,
    ) -> DbResult<Vec<FareSample>> {
        let rows = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT base_fare_cents, amount_cents
            FROM tickets
            WHERE airline_id = ?1
              AND id != ?2
              AND commission_status = 'FINAL'
              AND base_fare_cents IS NOT NULL
              AND amount_cents > 0
            ORDER BY sold_at DESC, id DESC
            LIMIT ?3
            "#,
        )
        .bind(airline_id)
        .bind(ticket_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(base, amount)| FareSample::new(Money::from_cents(base), Money::from_cents(amount)))
            .collect())
    }

    /// 1-based chronological position of a sale among its airline's tickets,
    /// ordered by `(sold_at, id)`.
    async fn sale_ordinal(
        conn: &mut SqliteConnection,
        airline_id: &str,
        ticket_id: &str,
        sold_at: DateTime<Utc>,
    ) -> DbResult<i64> {
        let others = sqlx::query_as::<_, (String, DateTime<Utc>)>(
            "SELECT id, sold_at FROM tickets WHERE airline_id = ?1 AND id != ?2",
        )
        .bind(airline_id)
        .bind(ticket_id)
        .fetch_all(&mut *conn)
        .await?;

        let earlier = others
            .iter()
            .filter(|(id, at)| (*at, id.as_str()) < (sold_at, ticket_id))
            .count();

        Ok(earlier as i64 + 1)
    }

    /// What the ticket already fed into `rule_id`'s counter, if anything.
    async fn deposit_credit(
        conn: &mut SqliteConnection,
        ticket_id: &str,
        rule_id: &str,
    ) -> DbResult<Option<PriorDepositCredit>> {
        let row = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT counted_cents, credited_cents
            FROM ticket_deposit_credits
            WHERE ticket_id = ?1 AND rule_id = ?2
            "#,
        )
        .bind(ticket_id)
        .bind(rule_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|(counted, credited)| PriorDepositCredit {
            rule_id: rule_id.to_string(),
            counted: Money::from_cents(counted),
            credited: Money::from_cents(credited),
        }))
    }

    /// Stores the credit the ticket now holds under its rule. Credits under
    /// other rules are left alone.
    async fn save_deposit_credit(
        conn: &mut SqliteConnection,
        ticket: &Ticket,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let Some(credit) = PriorDepositCredit::from_ticket(ticket) else {
            return Ok(());
        };

        sqlx::query(
            r#"
            INSERT INTO ticket_deposit_credits (
                ticket_id, rule_id, counted_cents, credited_cents, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(ticket_id, rule_id) DO UPDATE SET
                counted_cents = excluded.counted_cents,
                credited_cents = excluded.credited_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&ticket.id)
        .bind(&credit.rule_id)
        .bind(credit.counted.cents())
        .bind(credit.credited.cents())
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(ticket)
    }
}

fn build_ticket(
    id: String,
    input: NewTicket,
    commission: TicketCommission,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Ticket {
    Ticket {
        id,
        airline_id: input.airline_id,
        seller_id: input.seller_id,
        amount_cents: input.amount_cents,
        currency: input.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        route: input.route,
        travel_class: input.travel_class,
        base_fare_cents: input.base_fare_cents,
        agency_markup_cents: input.agency_markup_cents,
        extra_markup_bps: input.extra_markup_bps,
        sold_at: input.sold_at,
        commission_rule_id: commission.rule_id,
        commission_rate_bps: commission.rate.bps(),
        commission_cents: commission.amount.cents(),
        commission_mode: commission.mode,
        commission_base_cents: commission.base.cents(),
        commission_status: commission.status,
        deposit_counted_cents: commission.deposit_counted.cents(),
        created_at,
        updated_at,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorCode, ServiceError};
    use crate::pool::{Database, DbConfig};
    use crate::repository::commission_rule::NewCommissionRule;
    use backoffice_core::{Airline, CommissionRule};
    use chrono::Duration;

    async fn setup(code: &str) -> (Database, Airline) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let airline = db.airlines().insert(code, code).await.unwrap();
        (db, airline)
    }

    fn yesterday() -> DateTime<Utc> {
        Utc::now() - Duration::days(1)
    }

    async fn rule(db: &Database, new: NewCommissionRule) -> CommissionRule {
        db.commission_rules().insert(new).await.unwrap()
    }

    fn ticket(airline: &Airline, amount_cents: i64) -> NewTicket {
        NewTicket::new(&airline.id, "seller-1", amount_cents, "BZV-DKR", TravelClass::Economy, Utc::now())
    }

    #[tokio::test]
    async fn test_after_deposit_batch_crossing() {
        let (db, airline) = setup("AF").await;
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.commission_mode = CommissionMode::AfterDeposit;
        new.deposit_stock_target_cents = 10_000;
        new.batch_commission_cents = 650;
        let deposit_rule = rule(&db, new).await;

        let first = db.tickets().create(ticket(&airline, 9_500)).await.unwrap();
        assert_eq!(first.commission_cents, 0);
        assert_eq!(first.commission_mode, CommissionMode::AfterDeposit);
        assert_eq!(first.commission_status, CommissionStatus::Final);
        assert_eq!(first.commission_base_cents, 9_500);

        let second = db.tickets().create(ticket(&airline, 700)).await.unwrap();
        assert_eq!(second.commission_cents, 650);
        assert_eq!(second.commission_rate_bps, 9_286);
        assert_eq!(second.deposit_counted_cents, 700);

        let stored = db.commission_rules().get_by_id(&deposit_rule.id).await.unwrap().unwrap();
        assert_eq!(stored.deposit_stock_consumed_cents, 10_200);
    }

    #[tokio::test]
    async fn test_after_deposit_update_counts_growth_only() {
        let (db, airline) = setup("AF").await;
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.commission_mode = CommissionMode::AfterDeposit;
        new.deposit_stock_target_cents = 10_000;
        new.batch_commission_cents = 650;
        let deposit_rule = rule(&db, new).await;

        let created = db.tickets().create(ticket(&airline, 9_500)).await.unwrap();
        let updated = db
            .tickets()
            .update(&created.id, ticket(&airline, 10_500))
            .await
            .unwrap();

        assert_eq!(updated.commission_cents, 650);
        assert_eq!(updated.deposit_counted_cents, 10_500);
        assert_eq!(updated.created_at, created.created_at);

        // Same amount again: no growth, the batch stays credited once
        let again = db
            .tickets()
            .update(&created.id, ticket(&airline, 10_500))
            .await
            .unwrap();
        assert_eq!(again.commission_cents, 650);

        let stored = db.commission_rules().get_by_id(&deposit_rule.id).await.unwrap().unwrap();
        assert_eq!(stored.deposit_stock_consumed_cents, 10_500);
    }

    #[tokio::test]
    async fn test_system_plus_markup() {
        let (db, airline) = setup("KQ").await;
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.commission_mode = CommissionMode::SystemPlusMarkup;
        new.system_rate_bps = 500;
        new.markup_rate_bps = 200;
        rule(&db, new).await;

        let sold = db
            .tickets()
            .create(ticket(&airline, 1_000).with_base_fare(1_000))
            .await
            .unwrap();
        assert_eq!(sold.commission_cents, 70);
        assert_eq!(sold.commission_rate_bps, 700);
        assert_eq!(sold.commission_mode, CommissionMode::SystemPlusMarkup);
        assert_eq!(sold.commission_status, CommissionStatus::Final);
        assert_eq!(sold.currency, "XAF");
    }

    #[tokio::test]
    async fn test_fst_every_thirteenth_sale() {
        let (db, airline) = setup("FST").await;
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.system_rate_bps = 700;
        rule(&db, new).await;

        let start = Utc::now() - Duration::hours(2);
        for n in 1..=13_i64 {
            let mut input = ticket(&airline, 10_000 + n);
            input.sold_at = start + Duration::minutes(n);
            let sold = db.tickets().create(input).await.unwrap();

            if n == 13 {
                assert_eq!(sold.commission_cents, 10_013);
                assert_eq!(sold.commission_rate_bps, 10_000);
            } else {
                assert_eq!(sold.commission_cents, 0, "sale #{n}");
            }
            assert_eq!(sold.commission_mode, CommissionMode::Immediate);
        }
    }

    #[tokio::test]
    async fn test_acg_requires_base_fare() {
        let (db, airline) = setup("ACG").await;
        rule(&db, NewCommissionRule::wildcard(&airline.id, yesterday())).await;

        let err = db.tickets().create(ticket(&airline, 100_000)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingRequiredBaseFare);
        assert!(matches!(
            err,
            ServiceError::Rejected(CoreError::MissingRequiredBaseFare { ref airline_code }) if airline_code == "ACG"
        ));

        let sold = db
            .tickets()
            .create(ticket(&airline, 100_000).with_base_fare(80_000))
            .await
            .unwrap();
        assert_eq!(sold.commission_cents, 4_000);
        assert_eq!(sold.commission_rate_bps, 500);
    }

    #[tokio::test]
    async fn test_et_adds_agency_markup() {
        let (db, airline) = setup("ET").await;
        rule(&db, NewCommissionRule::wildcard(&airline.id, yesterday())).await;

        let sold = db
            .tickets()
            .create(ticket(&airline, 120_000).with_base_fare(100_000).with_agency_markup(2_000))
            .await
            .unwrap();
        assert_eq!(sold.commission_cents, 7_000);
        assert_eq!(sold.commission_rate_bps, 700);
        assert_eq!(sold.commission_mode, CommissionMode::SystemPlusMarkup);
    }

    #[tokio::test]
    async fn test_no_applicable_rule_writes_nothing() {
        let (db, airline) = setup("AF").await;
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.route_pattern = "DLA-*".to_string();
        new.commission_mode = CommissionMode::AfterDeposit;
        new.deposit_stock_target_cents = 10_000;
        new.batch_commission_cents = 650;
        let only_rule = rule(&db, new).await;

        let err = db.tickets().create(ticket(&airline, 5_000)).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoApplicableRule);
        assert!(err.is_rejection());

        assert!(db.tickets().list_for_airline(&airline.id).await.unwrap().is_empty());
        let stored = db.commission_rules().get_by_id(&only_rule.id).await.unwrap().unwrap();
        assert_eq!(stored.deposit_stock_consumed_cents, 0);
    }

    #[tokio::test]
    async fn test_estimated_base_becomes_final_on_update() {
        let (db, airline) = setup("AF").await;
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.system_rate_bps = 1_000;
        rule(&db, new).await;

        // No history: default ratio 0.60
        let sold = db.tickets().create(ticket(&airline, 100_000)).await.unwrap();
        assert_eq!(sold.commission_status, CommissionStatus::Estimated);
        assert_eq!(sold.commission_base_cents, 60_000);
        assert_eq!(sold.commission_cents, 6_000);

        let fixed = db
            .tickets()
            .update(&sold.id, ticket(&airline, 100_000).with_base_fare(70_000))
            .await
            .unwrap();
        assert_eq!(fixed.commission_status, CommissionStatus::Final);
        assert_eq!(fixed.commission_cents, 7_000);

        // The FINAL ticket now feeds the estimation: ratio 0.70
        let estimated = db.tickets().create(ticket(&airline, 50_000)).await.unwrap();
        assert_eq!(estimated.commission_base_cents, 35_000);
        assert_eq!(estimated.commission_cents, 3_500);
    }

    #[tokio::test]
    async fn test_deactivated_rule_not_selected() {
        let (db, airline) = setup("AF").await;
        let mut specific = NewCommissionRule::wildcard(&airline.id, yesterday());
        specific.route_pattern = "BZV-*".to_string();
        specific.system_rate_bps = 1_000;
        let specific = rule(&db, specific).await;

        let mut fallback = NewCommissionRule::wildcard(&airline.id, yesterday());
        fallback.system_rate_bps = 500;
        let fallback = rule(&db, fallback).await;

        let first = db
            .tickets()
            .create(ticket(&airline, 10_000).with_base_fare(10_000))
            .await
            .unwrap();
        assert_eq!(first.commission_rule_id, specific.id);
        assert_eq!(first.commission_cents, 1_000);

        db.commission_rules().deactivate(&specific.id).await.unwrap();

        let second = db
            .tickets()
            .create(ticket(&airline, 10_000).with_base_fare(10_000))
            .await
            .unwrap();
        assert_eq!(second.commission_rule_id, fallback.id);
        assert_eq!(second.commission_cents, 500);
    }

    #[tokio::test]
    async fn test_delete_keeps_deposit_counter() {
        let (db, airline) = setup("AF").await;
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.commission_mode = CommissionMode::AfterDeposit;
        new.deposit_stock_target_cents = 10_000;
        new.batch_commission_cents = 650;
        let deposit_rule = rule(&db, new).await;

        let sold = db.tickets().create(ticket(&airline, 4_000)).await.unwrap();
        db.tickets().delete(&sold.id, "manager-1").await.unwrap();

        assert!(db.tickets().get_by_id(&sold.id).await.unwrap().is_none());
        let stored = db.commission_rules().get_by_id(&deposit_rule.id).await.unwrap().unwrap();
        assert_eq!(stored.deposit_stock_consumed_cents, 4_000);

        let actions: Vec<String> = db
            .audit()
            .list_for_entity(ENTITY_TICKET, &sold.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["CREATED", "DELETED"]);

        let err = db.tickets().delete(&sold.id, "manager-1").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_unknown_airline_and_invalid_amount() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let input = NewTicket::new("missing", "seller-1", 1_000, "BZV-DKR", TravelClass::Economy, Utc::now());
        let err = db.tickets().create(input.clone()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let mut negative = input;
        negative.amount_cents = -1;
        let err = db.tickets().create(negative).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn test_zero_amount_sale_earns_nothing() {
        let (db, airline) = setup("AF").await;
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.system_rate_bps = 500;
        rule(&db, new).await;

        let sold = db.tickets().create(ticket(&airline, 0)).await.unwrap();
        assert_eq!(sold.commission_cents, 0);
        assert_eq!(sold.commission_rate_bps, 0);
        assert_eq!(sold.commission_mode, CommissionMode::Immediate);

        let kq = db.airlines().insert("KQ", "Kenya Airways").await.unwrap();
        let mut new = NewCommissionRule::wildcard(&kq.id, yesterday());
        new.commission_mode = CommissionMode::AfterDeposit;
        new.deposit_stock_target_cents = 10_000;
        new.batch_commission_cents = 650;
        let deposit_rule = rule(&db, new).await;

        let sold = db.tickets().create(ticket(&kq, 0)).await.unwrap();
        assert_eq!(sold.commission_cents, 0);
        assert_eq!(sold.commission_rate_bps, 0);
        assert_eq!(sold.commission_mode, CommissionMode::AfterDeposit);
        assert_eq!(sold.deposit_counted_cents, 0);

        let stored = db.commission_rules().get_by_id(&deposit_rule.id).await.unwrap().unwrap();
        assert_eq!(stored.deposit_stock_consumed_cents, 0);
    }

    #[tokio::test]
    async fn test_deposit_credit_survives_rule_change() {
        let (db, airline) = setup("AF").await;
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.commission_mode = CommissionMode::AfterDeposit;
        new.deposit_stock_target_cents = 10_000;
        new.batch_commission_cents = 650;
        let deposit_rule = rule(&db, new).await;

        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.route_pattern = "DLA-*".to_string();
        new.system_rate_bps = 500;
        let immediate_rule = rule(&db, new).await;

        db.tickets().create(ticket(&airline, 9_500)).await.unwrap();
        let sold = db.tickets().create(ticket(&airline, 700)).await.unwrap();
        assert_eq!(sold.commission_cents, 650);

        // Away to the immediate rule: the deposit counter does not move
        let mut away = ticket(&airline, 700).with_base_fare(700);
        away.route = "DLA-BZV".to_string();
        let moved = db.tickets().update(&sold.id, away).await.unwrap();
        assert_eq!(moved.commission_rule_id, immediate_rule.id);
        assert_eq!(moved.commission_cents, 35);
        assert_eq!(moved.deposit_counted_cents, 0);

        // Back again: nothing is counted twice and the batch comes back
        let back = db.tickets().update(&sold.id, ticket(&airline, 700)).await.unwrap();
        assert_eq!(back.commission_rule_id, deposit_rule.id);
        assert_eq!(back.commission_cents, 650);
        assert_eq!(back.commission_rate_bps, 9_286);
        assert_eq!(back.deposit_counted_cents, 700);

        let stored = db.commission_rules().get_by_id(&deposit_rule.id).await.unwrap().unwrap();
        assert_eq!(stored.deposit_stock_consumed_cents, 10_200);

        // Growth after coming back is still counted
        let grown = db.tickets().update(&sold.id, ticket(&airline, 1_000)).await.unwrap();
        assert_eq!(grown.deposit_counted_cents, 1_000);
        let stored = db.commission_rules().get_by_id(&deposit_rule.id).await.unwrap().unwrap();
        assert_eq!(stored.deposit_stock_consumed_cents, 10_500);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deposit_sales() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("backoffice.db")).max_connections(8))
            .await
            .unwrap();
        let airline = db.airlines().insert("AF", "Air France").await.unwrap();
        let mut new = NewCommissionRule::wildcard(&airline.id, yesterday());
        new.commission_mode = CommissionMode::AfterDeposit;
        new.deposit_stock_target_cents = 10_000;
        new.batch_commission_cents = 650;
        let deposit_rule = rule(&db, new).await;

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let tickets = db.tickets();
                let input = ticket(&airline, 1_000);
                tokio::spawn(async move { tickets.create(input).await })
            })
            .collect();

        let mut successes = 0_i64;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                // SQLITE_BUSY on a lock upgrade; the whole sale rolled back
                Err(err) => assert_eq!(err.code(), ErrorCode::PersistenceConflict),
            }
        }
        assert!(successes > 0);

        let stored = db.commission_rules().get_by_id(&deposit_rule.id).await.unwrap().unwrap();
        let consumed = stored.deposit_stock_consumed_cents;
        assert_eq!(consumed, 1_000 * successes);

        let sold = db.tickets().list_for_airline(&airline.id).await.unwrap();
        assert_eq!(sold.len() as i64, successes);
        let paid: i64 = sold.iter().map(|t| t.commission_cents).sum();
        assert_eq!(paid, 650 * (consumed / 10_000));
    }
}
