use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, info, warn};

use switchboard_core::domain::authorization::AuthorizationRecord;
use switchboard_db::{AuthorizationStore, RepositoryError};

use crate::bot::BotContext;
use crate::client::{ClientError, OAuthQuery};
use crate::install::InstallErrorReport;
use crate::payload::Payload;
use crate::registry::{EventHandler, HandlerRegistry};
use crate::topics::{classify, TopicKey, WILDCARD};

/// What a handler receives.
#[derive(Clone, Debug)]
pub enum Notification {
    Event { payload: Payload, bot: BotContext },
    InstallSuccess { record: AuthorizationRecord, bot: BotContext },
    InstallError { error: InstallErrorReport, query: OAuthQuery },
}

impl Notification {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::InstallSuccess { .. } => "install_success",
            Self::InstallError { .. } => "install_error",
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Event { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn bot(&self) -> Option<&BotContext> {
        match self {
            Self::Event { bot, .. } | Self::InstallSuccess { bot, .. } => Some(bot),
            Self::InstallError { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("handler failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Storage(#[from] RepositoryError),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

/// Result of one handler invocation. `position` is the handler's index within
/// its topic's registration list.
#[derive(Debug)]
pub struct HandlerOutcome {
    pub topic: TopicKey,
    pub position: usize,
    pub result: Result<(), HandlerError>,
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    pub topics: Vec<TopicKey>,
    pub outcomes: Vec<HandlerOutcome>,
}

impl DispatchReport {
    pub fn invoked(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &HandlerOutcome> {
        self.outcomes.iter().filter(|outcome| outcome.result.is_err())
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

pub struct EventDispatcher {
    registry: Arc<HandlerRegistry>,
    store: Arc<dyn AuthorizationStore>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<HandlerRegistry>, store: Arc<dyn AuthorizationStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn AuthorizationStore> {
        &self.store
    }

    pub async fn dispatch(&self, payload: Payload, bot: BotContext) -> DispatchReport {
        let topics = classify(&payload);
        self.notify(topics, Notification::Event { payload, bot }).await
    }

    /// Starts every handler registered under each topic, in topic order, and
    /// waits for all of them to settle. Errors and panics are captured per
    /// invocation and never affect siblings.
    pub async fn notify(
        &self,
        topics: Vec<TopicKey>,
        notification: Notification,
    ) -> DispatchReport {
        let notification = Arc::new(notification);

        let invocations = topics.iter().flat_map(|topic| {
            self.registry
                .listeners_for(topic.as_str())
                .iter()
                .enumerate()
                .map(move |(position, handler)| (topic.clone(), position, handler.clone()))
        });

        let pending = invocations.map(|(topic, position, handler)| {
            let notification = notification.clone();
            let store = self.store.clone();
            async move {
                let result = AssertUnwindSafe(handler.handle(notification, store))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(&*panic))));
                HandlerOutcome { topic, position, result }
            }
        });

        let outcomes = join_all(pending).await;

        for outcome in &outcomes {
            if let Err(error) = &outcome.result {
                warn!(
                    event_name = "dispatch.handler.failed",
                    notification = notification.name(),
                    topic = %outcome.topic,
                    position = outcome.position,
                    error = %error,
                    "handler failed"
                );
            }
        }

        let report = DispatchReport { topics, outcomes };
        debug!(
            event_name = "dispatch.completed",
            notification = notification.name(),
            topics = report.topics.len(),
            invoked = report.invoked(),
            failed = report.failure_count(),
            "dispatch settled"
        );
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// Logs every notification it sees.
pub struct TracingHandler;

#[async_trait]
impl EventHandler for TracingHandler {
    async fn handle(
        &self,
        notification: Arc<Notification>,
        _store: Arc<dyn AuthorizationStore>,
    ) -> Result<(), HandlerError> {
        match notification.as_ref() {
            Notification::Event { payload, bot } => info!(
                event_name = "slack.event.received",
                kind = payload.kind().as_str(),
                team_id = bot.team_id().map(|id| id.as_str()).unwrap_or("unknown"),
                "slack payload received"
            ),
            Notification::InstallSuccess { record, .. } => info!(
                event_name = "slack.install.succeeded",
                team_id = %record.id,
                "slack app installed"
            ),
            Notification::InstallError { error, .. } => warn!(
                event_name = "slack.install.failed",
                error = %error.message,
                "slack app installation failed"
            ),
        }
        Ok(())
    }
}

pub fn default_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register(WILDCARD, Arc::new(TracingHandler));
    registry
}
