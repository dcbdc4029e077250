use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use switchboard_db::DbPool;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    table: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub storage: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, table: impl Into<String>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(HealthState { db_pool, table: table.into() })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let storage = storage_check(&state).await;
    let ready = storage.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "switchboard webhook endpoint initialized".to_string(),
        },
        storage,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn storage_check(state: &HealthState) -> HealthCheck {
    // Table name is validated as an identifier during config load.
    let sql = format!("SELECT COUNT(*) FROM {}", state.table);
    match sqlx::query_scalar::<_, i64>(&sql).fetch_one(&state.db_pool).await {
        Ok(count) => HealthCheck { status: "ready", detail: format!("{count} teams authorized") },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("storage query failed: {error}") }
        }
    }
}
