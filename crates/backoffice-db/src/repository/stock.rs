//! # Stock Repository
//!
//! Transactional posting of stock movements, plus drift verification.
//!
//! ## Posting a Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. need request linked? → must be APPROVED                            │
//! │  2. SELECT item by (name, category, unit)                              │
//! │       missing + OUT → ItemNeverReceived                                │
//! │       missing + IN  → INSERT item at 0                                 │
//! │  3. plan_movement() → next quantity or InsufficientStock               │
//! │  4. UPDATE stock_items                                                 │
//! │       SET current_quantity = current_quantity + ?delta                 │
//! │       WHERE id = ? AND current_quantity + ?delta >= 0                  │
//! │       RETURNING current_quantity                                       │
//! │       no row → a concurrent OUT drained the item → InsufficientStock   │
//! │  5. INSERT stock_movements + audit event                               │
//! │                                                                         │
//! │  COMMIT ← quantity and ledger line move together                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use crate::repository::audit::{AuditRepository, ENTITY_STOCK_MOVEMENT};
use crate::repository::need_request::NeedRequestRepository;
use backoffice_core::procurement::ensure_approved;
use backoffice_core::stock::{plan_movement, reconcile_stock_totals};
use backoffice_core::validation::{
    validate_movement_quantity, validate_required_text, validate_stock_key,
};
use backoffice_core::{CoreError, MovementDirection, StockItem, StockItemKey, StockMovement};

const ITEM_COLUMNS: &str = "id, name, category, unit, current_quantity, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = r#"
    id, item_id, direction, quantity, justification, reference_doc,
    performed_by, need_request_id, created_at
"#;

// =============================================================================
// Inputs & Outputs
// =============================================================================

/// Who moved stock, why, and on which document.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MovementMetadata {
    pub justification: String,
    pub reference_doc: String,
    pub performed_by: String,
    pub need_request_id: Option<String>,
}

/// Result of a successful posting.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PostedMovement {
    pub item: StockItem,
    pub movement: StockMovement,
}

/// An item whose stored quantity disagrees with its movement history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockDrift {
    pub item_id: String,
    pub item: String,
    pub stored_quantity: i64,
    pub recomputed_quantity: i64,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the stock ledger.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Posts one IN or OUT movement.
    ///
    /// Every rejection happens before any write or rolls the transaction
    /// back, so the item quantity and the ledger never disagree.
    pub async fn post_movement(
        &self,
        key: &StockItemKey,
        direction: MovementDirection,
        quantity: i64,
        metadata: MovementMetadata,
    ) -> ServiceResult<PostedMovement> {
        let key = validate_stock_key(key)?;
        validate_movement_quantity(quantity)?;
        let justification = validate_required_text("justification", &metadata.justification)?;
        let reference_doc = validate_required_text("reference document", &metadata.reference_doc)?;
        let performed_by = validate_required_text("performed by", &metadata.performed_by)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        if let Some(request_id) = metadata.need_request_id.as_deref() {
            let status = NeedRequestRepository::status_in(&mut tx, request_id)
                .await?
                .ok_or_else(|| DbError::not_found("Need request", request_id))?;
            ensure_approved(request_id, status)?;
        }

        let current = Self::find_item(&mut tx, &key).await?;
        plan_movement(current.as_ref(), &key, direction, quantity)?;

        let item_id = match current {
            Some(item) => item.id,
            None => Self::create_item(&mut tx, &key, now).await?,
        };

        let delta = direction.signed(quantity);
        let applied: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE stock_items
            SET current_quantity = current_quantity + ?2, updated_at = ?3
            WHERE id = ?1 AND current_quantity + ?2 >= 0
            RETURNING current_quantity
            "#,
        )
        .bind(&item_id)
        .bind(delta)
        .bind(now)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if applied.is_none() {
            let available = Self::find_item(&mut tx, &key)
                .await?
                .map_or(0, |item| item.current_quantity);
            warn!(
                item = %key,
                available = available,
                requested = quantity,
                "Stock drained concurrently, movement rejected"
            );
            return Err(CoreError::InsufficientStock {
                item: key.to_string(),
                available,
                requested: quantity,
            }
            .into());
        }

        let movement = StockMovement {
            id: Uuid::new_v4().to_string(),
            item_id: item_id.clone(),
            direction,
            quantity,
            justification,
            reference_doc,
            performed_by,
            need_request_id: metadata.need_request_id,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, item_id, direction, quantity, justification, reference_doc,
                performed_by, need_request_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&movement.id)
        .bind(&movement.item_id)
        .bind(movement.direction)
        .bind(movement.quantity)
        .bind(&movement.justification)
        .bind(&movement.reference_doc)
        .bind(&movement.performed_by)
        .bind(&movement.need_request_id)
        .bind(movement.created_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        AuditRepository::record(
            &mut *tx,
            ENTITY_STOCK_MOVEMENT,
            &movement.id,
            "POSTED",
            &movement.performed_by,
            &movement,
            now,
        )
        .await?;

        let item = Self::find_item(&mut tx, &key)
            .await?
            .ok_or_else(|| DbError::not_found("Stock item", key.to_string()))?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            item = %key,
            direction = %direction,
            quantity = quantity,
            balance = item.current_quantity,
            movement_id = %movement.id,
            "Stock movement posted"
        );

        Ok(PostedMovement { item, movement })
    }

    /// Gets an item by its (name, category, unit) key.
    pub async fn get_item(&self, key: &StockItemKey) -> DbResult<Option<StockItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_item(&mut conn, key).await
    }

    /// Lists every item ordered by category then name.
    pub async fn list_items(&self) -> DbResult<Vec<StockItem>> {
        let items = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM stock_items ORDER BY category, name, unit"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Movement history of one item, oldest first.
    pub async fn movements_for_item(&self, item_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements \
             WHERE item_id = ?1 ORDER BY created_at, rowid"
        ))
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Recomputes every balance from the ledger and reports disagreements.
    ///
    /// Empty after any sequence of successful postings.
    pub async fn verify_balances(&self) -> DbResult<Vec<StockDrift>> {
        let mut conn = self.pool.acquire().await?;
        let movements = Self::all_movements(&mut conn).await?;
        let totals = reconcile_stock_totals(&movements);

        let items = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM stock_items ORDER BY id"
        ))
        .fetch_all(&mut *conn)
        .await?;

        let drifts: Vec<StockDrift> = items
            .into_iter()
            .filter_map(|item| {
                let recomputed = totals.get(&item.id).map_or(0, |t| t.resulting_quantity);
                (recomputed != item.current_quantity).then(|| StockDrift {
                    item: item.key().to_string(),
                    item_id: item.id,
                    stored_quantity: item.current_quantity,
                    recomputed_quantity: recomputed,
                })
            })
            .collect();

        if drifts.is_empty() {
            debug!(movements = movements.len(), "Stock balances verified");
        } else {
            warn!(drifted = drifts.len(), "Stock balances drift from the ledger");
        }

        Ok(drifts)
    }

    /// Rewrites every stored quantity from the ledger in one transaction.
    ///
    /// Returns the number of items whose quantity changed.
    pub async fn rebuild_balances(&self) -> DbResult<u64> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let movements = Self::all_movements(&mut tx).await?;
        let totals = reconcile_stock_totals(&movements);

        let item_ids: Vec<String> = sqlx::query_scalar("SELECT id FROM stock_items")
            .fetch_all(&mut *tx)
            .await?;

        let mut changed = 0;
        for item_id in item_ids {
            let quantity = totals.get(&item_id).map_or(0, |t| t.resulting_quantity);
            let result = sqlx::query(
                r#"
                UPDATE stock_items SET current_quantity = ?2, updated_at = ?3
                WHERE id = ?1 AND current_quantity != ?2
                "#,
            )
            .bind(&item_id)
            .bind(quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;
            changed += result.rows_affected();
        }

        tx.commit().await?;

        info!(changed = changed, "Stock balances rebuilt from ledger");
        Ok(changed)
    }

    async fn all_movements(conn: &mut SqliteConnection) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(&format!(
            "SELECT {MOVEMENT_COLUMNS} FROM stock_movements ORDER BY created_at, rowid"
        ))
        .fetch_all(&mut *conn)
        .await?;

        Ok(movements)
    }

    async fn find_item(conn: &mut SqliteConnection, key: &StockItemKey) -> DbResult<Option<StockItem>> {
        let item = sqlx::query_as::<_, StockItem>(&format!(
            "SELECT {ITEM_COLUMNS} FROM stock_items \
             WHERE name = ?1 AND category = ?2 AND unit = ?3"
        ))
        .bind(&key.name)
        .bind(&key.category)
        .bind(&key.unit)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(item)
    }

    /// Creates an item at quantity 0, or returns the id of the one a
    /// concurrent first IN created.
    async fn create_item(
        conn: &mut SqliteConnection,
        key: &StockItemKey,
        now: DateTime<Utc>,
    ) -> DbResult<String> {
        debug!(item = %key, "Creating stock item on first receipt");

        sqlx::query(
            r#"
            INSERT INTO stock_items (id, name, category, unit, current_quantity, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
            ON CONFLICT (name, category, unit) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&key.name)
        .bind(&key.category)
        .bind(&key.unit)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Self::find_item(conn, key)
            .await?
            .map(|item| item.id)
            .ok_or_else(|| DbError::not_found("Stock item", key.to_string()))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
