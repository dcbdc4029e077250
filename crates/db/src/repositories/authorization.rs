use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;
use tracing::debug;

use switchboard_core::config::is_sql_identifier;
use switchboard_core::domain::authorization::{AuthorizationRecord, TeamId};

use super::{AuthorizationStore, RepositoryError};
use crate::DbPool;

pub struct SqlAuthorizationStore {
    pool: DbPool,
    select_sql: String,
    upsert_sql: String,
}

impl SqlAuthorizationStore {
    pub fn new(pool: DbPool, table: &str) -> Result<Self, RepositoryError> {
        if !is_sql_identifier(table) {
            return Err(RepositoryError::InvalidTable(table.to_owned()));
        }

        Ok(Self {
            pool,
            select_sql: format!("SELECT id, record, updated_at FROM {table} WHERE id = ?"),
            upsert_sql: format!(
                "INSERT INTO {table} (id, record, updated_at)
                 VALUES (?, ?, ?)
                 ON CONFLICT(id) DO UPDATE SET
                     record = excluded.record,
                     updated_at = excluded.updated_at"
            ),
        })
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<AuthorizationRecord, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let record: String =
        row.try_get("record").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let document: Value = serde_json::from_str(&record)
        .map_err(|e| RepositoryError::Decode(format!("record `{id}`: {e}")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("record `{id}` updated_at: {e}")))?;

    Ok(AuthorizationRecord { id: TeamId(id), document, updated_at })
}

#[async_trait::async_trait]
impl AuthorizationStore for SqlAuthorizationStore {
    async fn get(&self, id: &TeamId) -> Result<Option<AuthorizationRecord>, RepositoryError> {
        let row =
            sqlx::query(&self.select_sql).bind(&id.0).fetch_optional(&self.pool).await?;

        match row {
            Some(ref r) => Ok(Some(row_to_record(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, document: Value) -> Result<AuthorizationRecord, RepositoryError> {
        let record = AuthorizationRecord::from_document(document, Utc::now())?;
        let serialized = serde_json::to_string(&record.document)
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;

        sqlx::query(&self.upsert_sql)
            .bind(&record.id.0)
            .bind(&serialized)
            .bind(record.updated_at.to_rfc3339())
            .execute(&self.pool)
            .await?;

        debug!(
            event_name = "storage.authorization.saved",
            team_id = %record.id,
            "authorization record persisted"
        );
        Ok(record)
    }
}
