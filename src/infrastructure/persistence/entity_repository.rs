/// PostgreSQL implementation of EntityStore
use crate::domain::shared::{DomainError, Result};
use crate::domain::store::{EntityKind, EntityStore};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, error};

pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    async fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Vec<u8>>> {
        let result = sqlx::query("SELECT data FROM sip_entities WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await;

        match result {
            Ok(Some(row)) => row_to_bytes(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => {
                error!("Failed to get {} {}: {}", kind, id, e);
                Err(map_sqlx_error(e))
            }
        }
    }

    async fn insert(&self, kind: EntityKind, id: &str, data: Vec<u8>) -> Result<()> {
        let document: serde_json::Value = serde_json::from_slice(&data)
            .map_err(|e| DomainError::Internal(format!("document is not JSON: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO sip_entities (kind, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (kind, id) DO NOTHING
            "#,
        )
        .bind(kind.as_str())
        .bind(id)
        .bind(Json(document))
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => {
                Err(DomainError::AlreadyExists(format!("{} {}", kind, id)))
            }
            Ok(_) => {
                debug!("Created {}: {}", kind, id);
                Ok(())
            }
            Err(e) => {
                error!("Failed to create {} {}: {}", kind, id, e);
                Err(map_sqlx_error(e))
            }
        }
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sip_entities WHERE kind = $1 AND id = $2")
            .bind(kind.as_str())
            .bind(id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(done) => {
                debug!("Deleted {}: {}", kind, id);
                Ok(done.rows_affected() > 0)
            }
            Err(e) => {
                error!("Failed to delete {} {}: {}", kind, id, e);
                Err(map_sqlx_error(e))
            }
        }
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<Vec<u8>>> {
        // Byte order, matching the memory store, whatever the database locale
        let result = sqlx::query(
            r#"SELECT data FROM sip_entities WHERE kind = $1 ORDER BY id COLLATE "C""#,
        )
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await;

        match result {
            Ok(rows) => rows.iter().map(row_to_bytes).collect(),
            Err(e) => {
                error!("Failed to list {}: {}", kind, e);
                Err(map_sqlx_error(e))
            }
        }
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}

fn row_to_bytes(row: &sqlx::postgres::PgRow) -> Result<Vec<u8>> {
    let Json(document): Json<serde_json::Value> = row
        .try_get("data")
        .map_err(|e| DomainError::Internal(format!("Database error: {}", e)))?;
    serde_json::to_vec(&document).map_err(|e| DomainError::Internal(e.to_string()))
}

/// Connection level failures are retryable, everything else is internal
fn map_sqlx_error(e: sqlx::Error) -> DomainError {
    match &e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            DomainError::NotReady(format!("Database unavailable: {}", e))
        }
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            DomainError::AlreadyExists(db.message().to_string())
        }
        _ => DomainError::Internal(format!("Database error: {}", e)),
    }
}
