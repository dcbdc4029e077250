use std::sync::Arc;

use switchboard_core::config::{AppConfig, ConfigError};
use switchboard_db::{
    connect, schema::ensure_authorization_table, AuthorizationStore, DbPool, RepositoryError,
    SqlAuthorizationStore,
};
use switchboard_slack::{AppSettings, HandlerRegistry, SlackApp, SlackWebClient};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub slack: Arc<SlackApp>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("authorization storage setup failed: {0}")]
    Storage(#[source] RepositoryError),
}

pub async fn bootstrap_with_config(
    config: AppConfig,
    registry: HandlerRegistry,
) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect(&config.storage).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        offline = config.storage.offline,
        "database connection established"
    );

    ensure_authorization_table(&db_pool, &config.storage.table)
        .await
        .map_err(BootstrapError::Storage)?;
    let store: Arc<dyn AuthorizationStore> = Arc::new(
        SqlAuthorizationStore::new(db_pool.clone(), &config.storage.table)
            .map_err(BootstrapError::Storage)?,
    );
    info!(
        event_name = "system.bootstrap.storage_ready",
        correlation_id = "bootstrap",
        table = %config.storage.table,
        "authorization table ready"
    );

    let topics = registry.topic_count();
    let listeners = registry.listener_count();
    let api = Arc::new(SlackWebClient::new(&config.slack));
    let slack = Arc::new(SlackApp::new(
        registry,
        store,
        api,
        AppSettings::from_config(&config),
    ));
    info!(
        event_name = "system.bootstrap.handlers_registered",
        correlation_id = "bootstrap",
        topics,
        listeners,
        "handler registry installed"
    );

    Ok(Application { config, db_pool, slack })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use switchboard_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use switchboard_core::domain::authorization::TeamId;
    use switchboard_slack::{default_registry, WebhookRequest, WebhookResponse};

    use crate::bootstrap::{bootstrap_with_config, Application, BootstrapError};

    async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
        let config = AppConfig::load(options)?;
        bootstrap_with_config(config, default_registry()).await
    }

    fn valid_overrides(storage_url: &str, table: &str) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                storage_url: Some(storage_url.to_string()),
                storage_table: Some(table.to_string()),
                slack_client_id: Some("123.456".to_string()),
                slack_client_secret: Some("shh".to_string()),
                slack_verification_token: Some("verify-me".to_string()),
                install_redirect_url: Some("https://example.com/installed".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_client_credentials() {
        let mut options = valid_overrides("sqlite::memory:", "authorizations");
        options.overrides.slack_client_id = Some(String::new());

        let result = bootstrap(options).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("slack.client_id"));
    }

    #[tokio::test]
    async fn bootstrap_prepares_storage_and_serves_known_teams() {
        let app = bootstrap(valid_overrides("sqlite::memory:", "slack_teams"))
            .await
            .expect("bootstrap should succeed with valid overrides");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'slack_teams'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("table lookup");
        assert_eq!(table_count, 1, "bootstrap should create the configured table");

        let store = app.slack.dispatcher().store();
        store
            .save(json!({ "team_id": "T1", "access_token": "xoxb-1", "token_type": "bot" }))
            .await
            .expect("save");
        let record = store.get(&TeamId("T1".to_string())).await.expect("get");
        assert!(record.is_some());

        let response = app
            .slack
            .handle(WebhookRequest::post(json!({
                "token": "verify-me",
                "team_id": "T1",
                "event": { "type": "app_mention" }
            })))
            .await
            .expect("dispatch");
        assert_eq!(response, WebhookResponse::Ack);

        app.db_pool.close().await;
    }
}
