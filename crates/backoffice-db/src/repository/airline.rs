//! # Airline Repository
//!
//! Airlines are reference data: created by seeding or administration and
//! looked up by code on every sale.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult, ServiceResult};
use backoffice_core::validation::validate_required_text;
use backoffice_core::Airline;

/// Repository for airline database operations.
#[derive(Debug, Clone)]
pub struct AirlineRepository {
    pool: SqlitePool,
}

impl AirlineRepository {
    /// Creates a new AirlineRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AirlineRepository { pool }
    }

    /// Inserts an active airline. The code is stored uppercased.
    pub async fn insert(&self, code: &str, name: &str) -> ServiceResult<Airline> {
        let code = validate_required_text("airline code", code)?.to_uppercase();
        let name = validate_required_text("airline name", name)?;

        let airline = Airline {
            id: Uuid::new_v4().to_string(),
            code,
            name,
            is_active: true,
            created_at: Utc::now(),
        };

        debug!(id = %airline.id, code = %airline.code, "Inserting airline");

        sqlx::query(
            r#"
            INSERT INTO airlines (id, code, name, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&airline.id)
        .bind(&airline.code)
        .bind(&airline.name)
        .bind(airline.is_active)
        .bind(airline.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &airline.code),
            other => other,
        })?;

        Ok(airline)
    }

    /// Gets an airline by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Airline>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch(&mut conn, id).await
    }

    /// Gets an airline by ID on a transaction's connection.
    pub async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Airline>> {
        let airline = sqlx::query_as::<_, Airline>(
            r#"
            SELECT id, code, name, is_active, created_at
            FROM airlines
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(airline)
    }

    /// Gets an airline by its code (case-insensitive).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Airline>> {
        let airline = sqlx::query_as::<_, Airline>(
            r#"
            SELECT id, code, name, is_active, created_at
            FROM airlines
            WHERE code = ?1
            "#,
        )
        .bind(code.trim().to_uppercase())
        .fetch_optional(&self.pool)
        .await?;

        Ok(airline)
    }

    /// Lists all airlines ordered by code.
    pub async fn list(&self) -> DbResult<Vec<Airline>> {
        let airlines = sqlx::query_as::<_, Airline>(
            r#"
            SELECT id, code, name, is_active, created_at
            FROM airlines
            ORDER BY code
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(airlines)
    }
}

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use crate::{DbError, ServiceError};

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.airlines();

        let et = repo.insert("et", "Ethiopian Airlines").await.unwrap();
        assert_eq!(et.code, "ET");

        let found = repo.get_by_code("Et").await.unwrap().unwrap();
        assert_eq!(found.id, et.id);
        assert!(repo.get_by_id(&et.id).await.unwrap().is_some());
        assert!(repo.get_by_code("XX").await.unwrap().is_none());

        repo.insert("AF", "Air France").await.unwrap();
        let codes: Vec<String> = repo.list().await.unwrap().into_iter().map(|a| a.code).collect();
        assert_eq!(codes, vec!["AF", "ET"]);
    }

    #[tokio::test]
    async fn test_duplicate_code_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.airlines().insert("ACG", "Air Congo").await.unwrap();

        let err = db.airlines().insert("acg", "Again").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Persistence(DbError::UniqueViolation { value, .. }) if value == "ACG"
        ));

        assert!(db.airlines().insert(" ", "Nameless").await.is_err());
    }
}
