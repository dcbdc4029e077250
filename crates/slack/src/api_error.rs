use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A Slack Web API call that came back with `"ok": false`.
#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize)]
#[error("slack api error: {message}")]
pub struct SlackApiError {
    pub message: String,
    pub extra: Vec<String>,
}

impl SlackApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), extra: Vec::new() }
    }

    /// Classifies a response envelope. Returns `None` when the call succeeded.
    pub fn from_envelope(envelope: &Value) -> Option<Self> {
        if envelope.get("ok").and_then(Value::as_bool) != Some(false) {
            return None;
        }

        let message =
            envelope.get("error").and_then(Value::as_str).unwrap_or("unknown_error").to_owned();
        let extra = envelope
            .pointer("/response_metadata/messages")
            .and_then(Value::as_array)
            .map(|messages| {
                messages.iter().filter_map(Value::as_str).map(str::to_owned).collect()
            })
            .unwrap_or_default();

        Some(Self { message, extra })
    }
}
