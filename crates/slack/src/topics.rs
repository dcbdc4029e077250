use std::borrow::Borrow;
use std::fmt;

use crate::payload::Payload;

pub const WILDCARD: &str = "*";
pub const EVENT: &str = "event";
pub const SLASH_COMMAND: &str = "slash_command";
pub const WEBHOOK: &str = "webhook";
pub const INTERACTIVE_MESSAGE: &str = "interactive_message";
pub const INSTALL_SUCCESS: &str = "install_success";
pub const INSTALL_ERROR: &str = "install_error";

/// Name of a dispatch channel.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicKey(String);

impl TopicKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn wildcard() -> Self {
        Self::new(WILDCARD)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for TopicKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TopicKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TopicKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Ordered topic keys for a payload. The wildcard always leads; each
/// recognized field contributes a generic channel followed by its value.
/// Duplicates are kept.
pub fn classify(payload: &Payload) -> Vec<TopicKey> {
    let mut topics = vec![TopicKey::wildcard()];

    if let Some(kind) = payload.payload_type() {
        topics.push(kind.into());
    }

    if payload.event().is_some() {
        topics.push(EVENT.into());
        if let Some(event_type) = payload.event_type() {
            topics.push(event_type.into());
        }
    }

    if let Some(command) = payload.command() {
        topics.push(SLASH_COMMAND.into());
        topics.push(command.into());
    }

    if let Some(trigger_word) = payload.trigger_word() {
        topics.push(WEBHOOK.into());
        topics.push(trigger_word.into());
    }

    if let Some(callback_id) = payload.callback_id() {
        topics.push(INTERACTIVE_MESSAGE.into());
        topics.push(callback_id.into());
    }

    topics
}
