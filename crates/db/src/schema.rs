use switchboard_core::config::is_sql_identifier;

use crate::repositories::RepositoryError;
use crate::DbPool;

/// Creates the authorization table if it does not exist yet.
pub async fn ensure_authorization_table(pool: &DbPool, table: &str) -> Result<(), RepositoryError> {
    if !is_sql_identifier(table) {
        return Err(RepositoryError::InvalidTable(table.to_owned()));
    }

    let statement = format!(
        "CREATE TABLE IF NOT EXISTS {table} (
             id TEXT PRIMARY KEY NOT NULL,
             record TEXT NOT NULL,
             updated_at TEXT NOT NULL
         )"
    );
    sqlx::query(&statement).execute(pool).await?;
    Ok(())
}
