use serde_json::{Map, Value};
use thiserror::Error;

use switchboard_core::domain::authorization::TeamId;

/// Coarse shape of an inbound callback, used for logging and handler convenience.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    UrlVerification,
    EventCallback,
    SlashCommand,
    OutgoingWebhook,
    InteractiveMessage,
    Other,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrlVerification => "url_verification",
            Self::EventCallback => "event_callback",
            Self::SlashCommand => "slash_command",
            Self::OutgoingWebhook => "outgoing_webhook",
            Self::InteractiveMessage => "interactive_message",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("interactive payload is not valid JSON: {0}")]
    MalformedInteractive(String),
}

/// One inbound Slack callback. Every field is optional; accessors treat empty
/// and non-string values as absent.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    raw: Value,
}

impl Payload {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Builds a payload from a decoded request body. Interactive messages arrive
    /// with the real payload JSON-encoded inside a `payload` form field.
    pub fn from_body(body: Value) -> Result<Self, PayloadError> {
        match body.get("payload") {
            Some(Value::String(encoded)) => serde_json::from_str(encoded)
                .map(Self::new)
                .map_err(|e| PayloadError::MalformedInteractive(e.to_string())),
            Some(Value::Object(inner)) => Ok(Self::new(Value::Object(inner.clone()))),
            _ => Ok(Self::new(body)),
        }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    pub fn kind(&self) -> PayloadKind {
        if self.payload_type() == Some("url_verification") {
            PayloadKind::UrlVerification
        } else if self.callback_id().is_some() || self.payload_type() == Some("block_actions") {
            PayloadKind::InteractiveMessage
        } else if self.command().is_some() {
            PayloadKind::SlashCommand
        } else if self.trigger_word().is_some() {
            PayloadKind::OutgoingWebhook
        } else if self.event().is_some() {
            PayloadKind::EventCallback
        } else {
            PayloadKind::Other
        }
    }

    pub fn payload_type(&self) -> Option<&str> {
        text(&self.raw, "type")
    }

    pub fn event(&self) -> Option<&Map<String, Value>> {
        self.raw.get("event").and_then(Value::as_object)
    }

    pub fn event_type(&self) -> Option<&str> {
        self.raw.get("event").and_then(|event| text(event, "type"))
    }

    pub fn command(&self) -> Option<&str> {
        text(&self.raw, "command")
    }

    pub fn trigger_word(&self) -> Option<&str> {
        text(&self.raw, "trigger_word")
    }

    pub fn callback_id(&self) -> Option<&str> {
        text(&self.raw, "callback_id")
    }

    pub fn token(&self) -> Option<&str> {
        text(&self.raw, "token")
    }

    pub fn challenge(&self) -> Option<&str> {
        text(&self.raw, "challenge")
    }

    pub fn response_url(&self) -> Option<&str> {
        text(&self.raw, "response_url")
    }

    /// Bot identity of the sender, read from `event.bot_id` when an event is
    /// present and from the top level otherwise.
    pub fn bot_id(&self) -> Option<&str> {
        match self.event() {
            Some(_) => self.raw.get("event").and_then(|event| text(event, "bot_id")),
            None => text(&self.raw, "bot_id"),
        }
    }

    pub fn is_from_bot(&self) -> bool {
        self.bot_id().is_some()
    }

    /// `team_id` for events and commands, `team.id` for interactive payloads.
    pub fn team_id(&self) -> Option<TeamId> {
        text(&self.raw, "team_id")
            .or_else(|| self.raw.get("team").and_then(|team| text(team, "id")))
            .map(|id| TeamId(id.to_owned()))
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.raw
            .get("event")
            .and_then(|event| text(event, "channel"))
            .or_else(|| text(&self.raw, "channel_id"))
            .or_else(|| self.raw.get("channel").and_then(|channel| text(channel, "id")))
            .or_else(|| text(&self.raw, "channel"))
    }

    pub fn user_id(&self) -> Option<&str> {
        self.raw
            .get("event")
            .and_then(|event| text(event, "user"))
            .or_else(|| text(&self.raw, "user_id"))
            .or_else(|| self.raw.get("user").and_then(|user| text(user, "id")))
    }
}

impl From<Value> for Payload {
    fn from(raw: Value) -> Self {
        Self::new(raw)
    }
}

fn text<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}
