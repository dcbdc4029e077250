use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use switchboard_db::RepositoryError;

use crate::bot::BotContext;
use crate::client::{ClientError, OAuthQuery, SlackApi};
use crate::events::{EventDispatcher, Notification};
use crate::topics::{TopicKey, INSTALL_ERROR, INSTALL_SUCCESS};

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("authorization could not be stored: {0}")]
    Storage(#[from] RepositoryError),
}

impl InstallError {
    pub fn report(&self) -> InstallErrorReport {
        let (name, extra) = match self {
            Self::Client(ClientError::Api(error)) => ("SlackApiError", error.extra.clone()),
            Self::Client(ClientError::Transport(_)) => ("TransportError", Vec::new()),
            Self::Client(ClientError::Decode(_)) => ("DecodeError", Vec::new()),
            Self::Client(ClientError::MissingCode) => ("MissingCode", Vec::new()),
            Self::Storage(_) => ("StorageError", Vec::new()),
        };
        let message = match self {
            Self::Client(ClientError::Api(error)) => error.message.clone(),
            other => other.to_string(),
        };
        InstallErrorReport { name: name.to_owned(), message, extra }
    }
}

/// Serializable view of an [`InstallError`], delivered to handlers and echoed
/// to the browser in the completion redirect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InstallErrorReport {
    pub name: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

pub struct InstallFlow {
    api: Arc<dyn SlackApi>,
    dispatcher: Arc<EventDispatcher>,
    redirect_url: String,
}

impl InstallFlow {
    pub fn new(
        api: Arc<dyn SlackApi>,
        dispatcher: Arc<EventDispatcher>,
        redirect_url: impl Into<String>,
    ) -> Self {
        Self { api, dispatcher, redirect_url: redirect_url.into() }
    }

    /// Returns the URL the browser is redirected to. Without a `code` this is
    /// the Slack authorization page; otherwise the code is exchanged, stored,
    /// and announced, and the browser lands on the configured install page.
    /// Failures are announced and reported through the redirect.
    pub async fn handle(&self, query: OAuthQuery) -> String {
        if query.code.is_none() {
            return self.api.auth_url(&query);
        }

        match self.exchange(&query).await {
            Ok(()) => self.completion_url(query.state.as_deref()),
            Err(error) => {
                let report = error.report();
                warn!(
                    event_name = "install.failed",
                    error = %error,
                    kind = %report.name,
                    "oauth installation failed"
                );
                let url = self.failure_url(query.state.as_deref(), &report);
                let topics = vec![TopicKey::wildcard(), TopicKey::from(INSTALL_ERROR)];
                self.dispatcher
                    .notify(topics, Notification::InstallError { error: report, query })
                    .await;
                url
            }
        }
    }

    async fn exchange(&self, query: &OAuthQuery) -> Result<(), InstallError> {
        let document = self.api.install(query).await?;
        let record = self.dispatcher.store().save(document).await?;

        info!(event_name = "install.completed", team_id = %record.id, "team authorization stored");

        let bot = BotContext::new(Some(record.clone()), None, self.api.clone());
        let topics = vec![TopicKey::wildcard(), TopicKey::from(INSTALL_SUCCESS)];
        self.dispatcher.notify(topics, Notification::InstallSuccess { record, bot }).await;
        Ok(())
    }

    fn completion_url(&self, state: Option<&str>) -> String {
        let separator = if self.redirect_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}state={}",
            self.redirect_url,
            separator,
            urlencoding::encode(state.unwrap_or_default())
        )
    }

    fn failure_url(&self, state: Option<&str>, report: &InstallErrorReport) -> String {
        let body = serde_json::to_string(report).unwrap_or_else(|_| report.message.clone());
        format!("{}&error={}", self.completion_url(state), urlencoding::encode(&body))
    }
}
