use std::collections::HashMap;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use switchboard_core::config::AppConfig;
use switchboard_core::errors::{ApplicationError, InterfaceError};
use switchboard_db::{AuthorizationStore, RepositoryError};

use crate::bot::BotContext;
use crate::client::{OAuthQuery, SlackApi};
use crate::events::EventDispatcher;
use crate::install::InstallFlow;
use crate::payload::{Payload, PayloadError};
use crate::registry::HandlerRegistry;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestMethod {
    Get,
    Post,
    Other(String),
}

impl RequestMethod {
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// Transport-neutral inbound request.
#[derive(Clone, Debug)]
pub struct WebhookRequest {
    pub method: RequestMethod,
    pub query: HashMap<String, String>,
    pub body: Value,
    pub correlation_id: String,
}

impl WebhookRequest {
    pub fn get(query: HashMap<String, String>) -> Self {
        Self::new(RequestMethod::Get, query, Value::Null)
    }

    pub fn post(body: Value) -> Self {
        Self::new(RequestMethod::Post, HashMap::new(), body)
    }

    pub fn new(method: RequestMethod, query: HashMap<String, String>, body: Value) -> Self {
        Self { method, query, body, correlation_id: "unknown-correlation-id".to_owned() }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookResponse {
    Redirect(String),
    Challenge(String),
    /// Body a handler set through [`BotContext::respond`].
    Reply(Value),
    Ack,
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("verification token mismatch")]
    Unauthorized,
    #[error(transparent)]
    MalformedPayload(#[from] PayloadError),
    #[error("authorization lookup failed: {0}")]
    Storage(#[from] RepositoryError),
    #[error("method `{0}` is not supported")]
    MethodNotAllowed(String),
}

impl WebhookError {
    pub fn into_interface(self, correlation_id: &str) -> InterfaceError {
        let application = match self {
            Self::Unauthorized => {
                ApplicationError::Unauthorized("verification token mismatch".to_owned())
            }
            Self::MalformedPayload(error) => ApplicationError::Malformed(error.to_string()),
            Self::Storage(error) => ApplicationError::from(error),
            Self::MethodNotAllowed(method) => {
                return InterfaceError::method_not_allowed(&method, correlation_id);
            }
        };
        application.into_interface(correlation_id)
    }
}

pub struct AppSettings {
    pub verification_token: Option<SecretString>,
    pub ignore_bots: bool,
    pub install_redirect_url: String,
}

impl AppSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            verification_token: config.slack.verification_token.clone(),
            ignore_bots: config.slack.ignore_bots,
            install_redirect_url: config.install.redirect_url.clone(),
        }
    }
}

pub struct SlackApp {
    dispatcher: Arc<EventDispatcher>,
    api: Arc<dyn SlackApi>,
    install: InstallFlow,
    verification_token: Option<SecretString>,
    ignore_bots: bool,
}

impl SlackApp {
    pub fn new(
        registry: HandlerRegistry,
        store: Arc<dyn AuthorizationStore>,
        api: Arc<dyn SlackApi>,
        settings: AppSettings,
    ) -> Self {
        let dispatcher = Arc::new(EventDispatcher::new(Arc::new(registry), store));
        let install =
            InstallFlow::new(api.clone(), dispatcher.clone(), settings.install_redirect_url);
        Self {
            dispatcher,
            api,
            install,
            verification_token: settings.verification_token,
            ignore_bots: settings.ignore_bots,
        }
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub async fn handle(&self, request: WebhookRequest) -> Result<WebhookResponse, WebhookError> {
        match request.method {
            RequestMethod::Get => {
                let query = OAuthQuery::from_params(&request.query);
                Ok(WebhookResponse::Redirect(self.install.handle(query).await))
            }
            RequestMethod::Post => self.ingest(request.body, &request.correlation_id).await,
            RequestMethod::Other(method) => Err(WebhookError::MethodNotAllowed(method)),
        }
    }

    async fn ingest(
        &self,
        body: Value,
        correlation_id: &str,
    ) -> Result<WebhookResponse, WebhookError> {
        let payload = Payload::from_body(body)?;

        if !self.token_matches(&payload) {
            warn!(
                event_name = "ingest.unauthorized",
                correlation_id,
                "rejected payload with mismatched verification token"
            );
            return Err(WebhookError::Unauthorized);
        }

        if let Some(challenge) = payload.challenge() {
            debug!(event_name = "ingest.challenge", correlation_id, "answering url verification");
            return Ok(WebhookResponse::Challenge(challenge.to_owned()));
        }

        if self.ignore_bots && payload.is_from_bot() {
            debug!(
                event_name = "ingest.bot_ignored",
                correlation_id,
                bot_id = payload.bot_id().unwrap_or_default(),
                "ignoring bot-originated payload"
            );
            return Ok(WebhookResponse::Ack);
        }

        let record = match payload.team_id() {
            Some(team_id) => self.dispatcher.store().get(&team_id).await?,
            None => None,
        };
        let bot = BotContext::new(record, Some(payload.clone()), self.api.clone());
        let report = self.dispatcher.dispatch(payload, bot.clone()).await;
        let reply = bot.take_response();

        info!(
            event_name = "ingest.dispatched",
            correlation_id,
            topics = report.topics.len(),
            invoked = report.invoked(),
            failed = report.failure_count(),
            replied = reply.is_some(),
            "payload dispatched"
        );
        Ok(reply.map_or(WebhookResponse::Ack, WebhookResponse::Reply))
    }

    fn token_matches(&self, payload: &Payload) -> bool {
        match &self.verification_token {
            Some(expected) => payload.token() == Some(expected.expose_secret()),
            None => true,
        }
    }
}
