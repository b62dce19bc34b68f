//! # Audit Repository
//!
//! Append-only audit trail written inside the caller's transaction.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. business write (ticket, stock movement, request transition)        │
//! │  2. INSERT INTO audit_events (entity_type, entity_id, payload)         │
//! │                                                                         │
//! │  COMMIT ← both rows or neither                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use backoffice_core::AuditEvent;

/// Entity type tags.
pub const ENTITY_TICKET: &str = "TICKET";
pub const ENTITY_STOCK_MOVEMENT: &str = "STOCK_MOVEMENT";
pub const ENTITY_NEED_REQUEST: &str = "NEED_REQUEST";
pub const ENTITY_COMMISSION_RULE: &str = "COMMISSION_RULE";

/// Repository for audit events.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Appends an event on the given connection, usually `&mut *tx`.
    ///
    /// `payload` is stored as its JSON snapshot.
    pub async fn record<T: Serialize>(
        conn: &mut SqliteConnection,
        entity_type: &str,
        entity_id: &str,
        action: &str,
        actor_id: &str,
        payload: &T,
        now: DateTime<Utc>,
    ) -> DbResult<AuditEvent> {
        let payload = serde_json::to_string(payload)
            .map_err(|e| DbError::Internal(format!("Failed to serialize audit payload: {}", e)))?;

        let event = AuditEvent {
            id: Uuid::new_v4().to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            action: action.to_string(),
            actor_id: actor_id.to_string(),
            payload,
            created_at: now,
        };

        debug!(
            entity_type = %event.entity_type,
            entity_id = %event.entity_id,
            action = %event.action,
            "Recording audit event"
        );

        sqlx::query(
            r#"
            INSERT INTO audit_events (
                id, entity_type, entity_id, action, actor_id, payload, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&event.id)
        .bind(&event.entity_type)
        .bind(&event.entity_id)
        .bind(&event.action)
        .bind(&event.actor_id)
        .bind(&event.payload)
        .bind(event.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(event)
    }

    /// Events of one entity, oldest first.
    pub async fn list_for_entity(&self, entity_type: &str, entity_id: &str) -> DbResult<Vec<AuditEvent>> {
        let events = sqlx::query_as::<_, AuditEvent>(
            r#"
            SELECT id, entity_type, entity_id, action, actor_id, payload, created_at
            FROM audit_events
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(events)
    }
}
