use std::fmt;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use switchboard_core::domain::authorization::{AuthorizationRecord, TeamId};

use crate::client::{ClientError, SlackApi};
use crate::payload::Payload;

/// Per-dispatch handle combining the team's authorization with the payload
/// being handled. Either side may be absent. Clones share one response slot.
#[derive(Clone)]
pub struct BotContext {
    record: Option<AuthorizationRecord>,
    payload: Option<Payload>,
    api: Arc<dyn SlackApi>,
    response: Arc<Mutex<Option<Value>>>,
}

impl BotContext {
    pub fn new(
        record: Option<AuthorizationRecord>,
        payload: Option<Payload>,
        api: Arc<dyn SlackApi>,
    ) -> Self {
        Self { record, payload, api, response: Arc::default() }
    }

    pub fn record(&self) -> Option<&AuthorizationRecord> {
        self.record.as_ref()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn team_id(&self) -> Option<&TeamId> {
        self.record.as_ref().map(|record| &record.id)
    }

    pub fn token(&self) -> Option<&str> {
        self.record.as_ref().and_then(AuthorizationRecord::access_token)
    }

    pub fn api(&self) -> &Arc<dyn SlackApi> {
        &self.api
    }

    /// Calls a Web API method with the team token. `channel` defaults to the
    /// payload's channel when the message does not name one.
    pub async fn send(&self, method: &str, message: Value) -> Result<Value, ClientError> {
        let mut message = normalize(message);
        if let Some(channel) = self.payload.as_ref().and_then(Payload::channel_id) {
            set_default(&mut message, "channel", channel);
        }
        self.api.call(method, self.token(), &message).await
    }

    /// Answers the current payload: through `response_url` when Slack supplied
    /// one, otherwise with `chat.postMessage` or `chat.postEphemeral`.
    pub async fn reply(&self, message: Value, ephemeral: bool) -> Result<(), ClientError> {
        let mut message = normalize(message);

        if let Some(url) = self.payload.as_ref().and_then(Payload::response_url) {
            let response_type = if ephemeral { "ephemeral" } else { "in_channel" };
            set_default(&mut message, "response_type", response_type);
            return self.api.post_response(url, &message).await;
        }

        if ephemeral {
            if let Some(user) = self.payload.as_ref().and_then(Payload::user_id) {
                set_default(&mut message, "user", user);
            }
            self.send("chat.postEphemeral", message).await.map(drop)
        } else {
            self.send("chat.postMessage", message).await.map(drop)
        }
    }
}

impl BotContext {
    /// Sets the body of the HTTP response to the current request. Only the
    /// first call wins; returns whether this call set it.
    pub fn respond(&self, message: Value) -> bool {
        let Ok(mut slot) = self.response.lock() else {
            return false;
        };
        if slot.is_some() {
            return false;
        }
        *slot = Some(normalize(message));
        true
    }

    pub(crate) fn take_response(&self) -> Option<Value> {
        self.response.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl fmt::Debug for BotContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotContext")
            .field("team_id", &self.team_id())
            .field("has_payload", &self.payload.is_some())
            .field("has_response", &self.response.lock().is_ok_and(|slot| slot.is_some()))
            .finish_non_exhaustive()
    }
}

fn normalize(message: Value) -> Value {
    match message {
        Value::String(text) => json!({ "text": text }),
        other => other,
    }
}

fn set_default(message: &mut Value, key: &str, value: &str) {
    if let Value::Object(map) = message {
        map.entry(key).or_insert_with(|| Value::String(value.to_owned()));
    }
}
