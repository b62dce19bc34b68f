//! # Need Request Repository
//!
//! Persists procurement requests. Transitions are decided by
//! `backoffice_core::procurement`; this repository loads, applies, writes
//! and audits them in one transaction.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use crate::repository::audit::{AuditRepository, ENTITY_NEED_REQUEST};
use backoffice_core::procurement;
use backoffice_core::validation::validate_required_text;
use backoffice_core::{NeedRequest, NeedRequestStatus};

const REQUEST_COLUMNS: &str = r#"
    id, title, details, requested_by, status, submitted_at,
    reviewed_by, reviewed_at, sealed_at, rejection_reason,
    created_at, updated_at
"#;

/// Repository for procurement requests.
#[derive(Debug, Clone)]
pub struct NeedRequestRepository {
    pool: SqlitePool,
}

impl NeedRequestRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NeedRequestRepository { pool }
    }

    /// Creates a DRAFT request.
    pub async fn insert(
        &self,
        title: &str,
        details: Option<&str>,
        requested_by: &str,
    ) -> ServiceResult<NeedRequest> {
        let title = validate_required_text("title", title)?;
        let requested_by = validate_required_text("requested by", requested_by)?;
        let now = Utc::now();

        let request = NeedRequest {
            id: Uuid::new_v4().to_string(),
            title,
            details: details.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string),
            requested_by,
            status: NeedRequestStatus::Draft,
            submitted_at: None,
            reviewed_by: None,
            reviewed_at: None,
            sealed_at: None,
            rejection_reason: None,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %request.id, title = %request.title, "Inserting need request");

        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        sqlx::query(
            r#"
            INSERT INTO need_requests (
                id, title, details, requested_by, status, submitted_at,
                reviewed_by, reviewed_at, sealed_at, rejection_reason,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&request.id)
        .bind(&request.title)
        .bind(&request.details)
        .bind(&request.requested_by)
        .bind(request.status)
        .bind(request.submitted_at)
        .bind(&request.reviewed_by)
        .bind(request.reviewed_at)
        .bind(request.sealed_at)
        .bind(&request.rejection_reason)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        AuditRepository::record(
            &mut *tx,
            ENTITY_NEED_REQUEST,
            &request.id,
            "CREATED",
            &request.requested_by,
            &request,
            now,
        )
        .await?;

        tx.commit().await.map_err(DbError::from)?;
        Ok(request)
    }

    /// Gets a request by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<NeedRequest>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Current status of a request, `None` when unknown.
    pub async fn get_status(&self, id: &str) -> DbResult<Option<NeedRequestStatus>> {
        let mut conn = self.pool.acquire().await?;
        Self::status_in(&mut conn, id).await
    }

    /// Status read on a transaction's connection.
    pub async fn status_in(
        conn: &mut SqliteConnection,
        id: &str,
    ) -> DbResult<Option<NeedRequestStatus>> {
        let status = sqlx::query_scalar::<_, NeedRequestStatus>(
            "SELECT status FROM need_requests WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(status)
    }

    /// DRAFT → SUBMITTED.
    pub async fn submit(&self, id: &str, actor_id: &str) -> ServiceResult<NeedRequest> {
        self.transition(id, actor_id, "SUBMITTED", |request, now| {
            procurement::submit(request, now)
        })
        .await
    }

    /// SUBMITTED → APPROVED, sealing the request.
    pub async fn approve(&self, id: &str, reviewer: &str) -> ServiceResult<NeedRequest> {
        self.transition(id, reviewer, "APPROVED", |request, now| {
            procurement::approve(request, reviewer, now)
        })
        .await
    }

    /// SUBMITTED → REJECTED.
    pub async fn reject(&self, id: &str, reviewer: &str, reason: &str) -> ServiceResult<NeedRequest> {
        self.transition(id, reviewer, "REJECTED", |request, now| {
            procurement::reject(request, reviewer, reason, now)
        })
        .await
    }

    async fn transition<F>(
        &self,
        id: &str,
        actor_id: &str,
        action: &str,
        apply: F,
    ) -> ServiceResult<NeedRequest>
    where
        F: FnOnce(&mut NeedRequest, chrono::DateTime<Utc>) -> backoffice_core::CoreResult<()>,
    {
        let now = Utc::now();
        let mut tx = self.pool.begin().await.map_err(DbError::from)?;

        let mut request = Self::fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Need request", id))?;
        let from = request.status;

        apply(&mut request, now)?;

        // The status guard makes a concurrent transition lose instead of
        // overwriting.
        let result = sqlx::query(
            r#"
            UPDATE need_requests SET
                status = ?2,
                submitted_at = ?3,
                reviewed_by = ?4,
                reviewed_at = ?5,
                sealed_at = ?6,
                rejection_reason = ?7,
                updated_at = ?8
            WHERE id = ?1 AND status = ?9
            "#,
        )
        .bind(&request.id)
        .bind(request.status)
        .bind(request.submitted_at)
        .bind(&request.reviewed_by)
        .bind(request.reviewed_at)
        .bind(request.sealed_at)
        .bind(&request.rejection_reason)
        .bind(request.updated_at)
        .bind(from)
        .execute(&mut *tx)
        .await
        .map_err(DbError::from)?;

        if result.rows_affected() == 0 {
            return Err(DbError::TransactionFailed(format!(
                "Need request {} changed concurrently",
                id
            ))
            .into());
        }

        AuditRepository::record(&mut *tx, ENTITY_NEED_REQUEST, &request.id, action, actor_id, &request, now)
            .await?;

        tx.commit().await.map_err(DbError::from)?;

        info!(
            request_id = %request.id,
            from = %from,
            to = %request.status,
            actor = %actor_id,
            "Need request transitioned"
        );

        Ok(request)
    }

    async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<NeedRequest>> {
        let request = sqlx::query_as::<_, NeedRequest>(&format!(
            "SELECT {REQUEST_COLUMNS} FROM need_requests WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(request)
    }
}
