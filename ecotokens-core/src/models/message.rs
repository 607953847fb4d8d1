//! Usage message envelope.
//!
//! Producers wrap events as `{"type": "LLM_USAGE" | "TOKEN_USAGE", "payload": {...}}`.
//! Both tags are accepted and mean the same thing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::usage::UsageEvent;

/// A usage event in its transport envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum UsageMessage {
    /// Current tag.
    #[serde(rename = "LLM_USAGE")]
    LlmUsage(UsageEvent),
    /// Legacy tag.
    #[serde(rename = "TOKEN_USAGE")]
    TokenUsage(UsageEvent),
}

impl UsageMessage {
    /// Wraps an event with the current tag.
    pub fn new(event: UsageEvent) -> Self {
        Self::LlmUsage(event)
    }

    /// Returns the wrapped event.
    pub fn event(&self) -> &UsageEvent {
        match self {
            Self::LlmUsage(event) | Self::TokenUsage(event) => event,
        }
    }

    /// Unwraps the event.
    pub fn into_event(self) -> UsageEvent {
        match self {
            Self::LlmUsage(event) | Self::TokenUsage(event) => event,
        }
    }

    /// Decodes an envelope whose payload may use a legacy shape.
    ///
    /// Returns `None` for unknown tags or a non-object payload.
    pub fn from_loose_value(value: &Value) -> Option<Self> {
        let payload = value.get("payload")?;
        let event = UsageEvent::from_loose_value(payload)?;
        match value.get("type").and_then(Value::as_str)? {
            "LLM_USAGE" => Some(Self::LlmUsage(event)),
            "TOKEN_USAGE" => Some(Self::TokenUsage(event)),
            _ => None,
        }
    }
}

impl From<UsageEvent> for UsageMessage {
    fn from(event: UsageEvent) -> Self {
        Self::new(event)
    }
}
