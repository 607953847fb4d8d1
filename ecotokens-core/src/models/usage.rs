//! Usage event types.
//!
//! A [`UsageEvent`] is one record of tokens consumed by a single exchange
//! with a provider. Events are immutable once created; the builder-style
//! `with_*` methods consume and return a new value.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::provider::ProviderKind;

/// Model label used when tokens were estimated from rendered text.
pub const ESTIMATED_MODEL: &str = "estimated";

/// Model label used when a response did not name its model.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Source timestamps below this value are seconds, not milliseconds.
pub const SECONDS_THRESHOLD: i64 = 2_000_000_000;

/// Returns the current time in milliseconds since the epoch.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Normalizes a source timestamp to milliseconds.
///
/// Values below [`SECONDS_THRESHOLD`] are treated as seconds.
pub fn normalize_timestamp(raw: i64) -> i64 {
    if raw < SECONDS_THRESHOLD {
        raw.saturating_mul(1000)
    } else {
        raw
    }
}

// ============================================================================
// Usage Event
// ============================================================================

/// One record of tokens consumed by a single exchange with a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEvent {
    /// Provider the exchange happened on.
    pub provider: ProviderKind,
    /// Best-effort model label.
    #[serde(default = "default_model")]
    pub model: String,
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Total tokens; reported by the source or `input + output`.
    #[serde(default)]
    pub total_tokens: u64,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
    /// Originating request or page URL (may be empty).
    #[serde(default)]
    pub url: String,
}

fn default_model() -> String {
    ESTIMATED_MODEL.to_string()
}

impl UsageEvent {
    /// Creates an event stamped now, with `total = input + output`.
    pub fn new(provider: ProviderKind, input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            provider,
            model: default_model(),
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
            timestamp: now_millis(),
            url: String::new(),
        }
    }

    /// Sets the model label.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the total with a value reported by the source.
    ///
    /// A reported total is authoritative even if it disagrees with
    /// `input + output`.
    #[must_use]
    pub fn with_reported_total(mut self, total: Option<u64>) -> Self {
        if let Some(total) = total {
            self.total_tokens = total;
        }
        self
    }

    /// Sets the originating URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Sets the timestamp, normalizing seconds to milliseconds.
    #[must_use]
    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = normalize_timestamp(timestamp);
        self
    }

    /// Returns true if any of the token counts is positive.
    pub fn has_tokens(&self) -> bool {
        self.input_tokens > 0 || self.output_tokens > 0 || self.total_tokens > 0
    }

    /// Returns the dedupe signature `(provider, output, total)`.
    pub fn signature(&self) -> (ProviderKind, u64, u64) {
        (self.provider, self.output_tokens, self.total_tokens)
    }

    /// Returns the timestamp as a UTC date-time.
    pub fn timestamp_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.timestamp)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Decodes a loosely shaped stored payload.
    ///
    /// Accepts the canonical camelCase shape as well as the legacy shapes
    /// written by earlier versions: a `payload` wrapper, `tool`/`platform`/
    /// `source` provider labels, snake_case token fields, a nested `usage`
    /// object, and `ts`/`created` timestamps. Returns `None` for
    /// non-object values.
    pub fn from_loose_value(value: &Value) -> Option<Self> {
        let root = value.as_object()?;
        let payload = match root.get("payload") {
            Some(Value::Object(inner)) => inner,
            _ => root,
        };
        let field = |key: &str| payload.get(key).and_then(as_count);
        let usage = payload.get("usage").and_then(Value::as_object);
        let usage_field = |key: &str| usage.and_then(|u| u.get(key)).and_then(as_count);

        let url = payload
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let provider = ["provider", "tool", "platform", "source"]
            .iter()
            .find_map(|key| {
                payload
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
            })
            .map(ProviderKind::from_loose)
            .or_else(|| provider_from_url(&url))
            .unwrap_or(ProviderKind::Unknown);

        let input = field("inputTokens")
            .or_else(|| field("input_tokens"))
            .or_else(|| field("prompt_tokens"))
            .or_else(|| usage_field("prompt_tokens"))
            .or_else(|| usage_field("input_tokens"))
            .unwrap_or(0);
        let output = field("outputTokens")
            .or_else(|| field("output_tokens"))
            .or_else(|| field("completion_tokens"))
            .or_else(|| usage_field("completion_tokens"))
            .or_else(|| usage_field("output_tokens"))
            .unwrap_or(0);
        let total = field("totalTokens")
            .or_else(|| field("total_tokens"))
            .or_else(|| usage_field("total_tokens"))
            .filter(|t| *t > 0)
            .unwrap_or(input.saturating_add(output));

        let timestamp = payload
            .get("timestamp")
            .and_then(as_millis)
            .or_else(|| payload.get("ts").and_then(as_millis))
            .or_else(|| payload.get("created").and_then(as_millis).map(normalize_timestamp))
            .unwrap_or_else(now_millis);

        let model = payload
            .get("model")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or(ESTIMATED_MODEL)
            .to_string();

        Some(Self {
            provider,
            model,
            input_tokens: input,
            output_tokens: output,
            total_tokens: total,
            timestamp,
            url,
        })
    }
}

fn provider_from_url(url: &str) -> Option<ProviderKind> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() {
        return None;
    }
    ProviderKind::from_host(host)
}

/// Reads a non-negative token count from a JSON number or numeric string.
pub fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0)
                .map(|f| f.floor() as u64)
        }),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(|f| {
            (f.is_finite() && f >= 0.0).then(|| f.floor() as u64)
        }),
        _ => None,
    }
}

fn as_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_sums_total() {
        let event = UsageEvent::new(ProviderKind::ChatGpt, 10, 20);
        assert_eq!(event.total_tokens, 30);
        assert_eq!(event.model, ESTIMATED_MODEL);
        assert!(event.has_tokens());
    }

    #[test]
    fn test_reported_total_is_authoritative() {
        let event = UsageEvent::new(ProviderKind::Gemini, 5, 7).with_reported_total(Some(15));
        assert_eq!(event.total_tokens, 15);

        let event = UsageEvent::new(ProviderKind::Gemini, 5, 7).with_reported_total(None);
        assert_eq!(event.total_tokens, 12);
    }

    #[test]
    fn test_timestamp_normalization_boundary() {
        assert_eq!(normalize_timestamp(1_700_000_000), 1_700_000_000_000);
        assert_eq!(normalize_timestamp(1_999_999_999), 1_999_999_999_000);
        assert_eq!(normalize_timestamp(2_000_000_000), 2_000_000_000);
        assert_eq!(normalize_timestamp(1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn test_camel_case_roundtrip_shape() {
        let event = UsageEvent::new(ProviderKind::Claude, 1, 2)
            .with_model("claude-3")
            .at(1_700_000_000_000);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["provider"], "claude");
        assert_eq!(value["inputTokens"], 1);
        assert_eq!(value["totalTokens"], 3);
        assert_eq!(value["timestamp"], 1_700_000_000_000_i64);
    }

    #[test]
    fn test_loose_canonical_shape() {
        let value = json!({
            "provider": "chatgpt",
            "model": "gpt-4o",
            "inputTokens": 10,
            "outputTokens": 20,
            "totalTokens": 30,
            "timestamp": 1_700_000_000_123_i64,
            "url": "https://chatgpt.com/backend-api/conversation"
        });
        let event = UsageEvent::from_loose_value(&value).unwrap();
        assert_eq!(event.provider, ProviderKind::ChatGpt);
        assert_eq!(event.model, "gpt-4o");
        assert_eq!(event.total_tokens, 30);
        assert_eq!(event.timestamp, 1_700_000_000_123);
    }

    #[test]
    fn test_loose_legacy_tool_shape() {
        let value = json!({
            "payload": {
                "tool": "Claude",
                "prompt_tokens": 400,
                "completion_tokens": 800,
                "ts": 1_700_000_000_000_i64
            }
        });
        let event = UsageEvent::from_loose_value(&value).unwrap();
        assert_eq!(event.provider, ProviderKind::Claude);
        assert_eq!(event.input_tokens, 400);
        assert_eq!(event.output_tokens, 800);
        assert_eq!(event.total_tokens, 1200);
    }

    #[test]
    fn test_loose_nested_usage_and_created_seconds() {
        let value = json!({
            "payload": {
                "platform": "gemini",
                "usage": { "total_tokens": 3000 },
                "created": 1_700_000_000
            }
        });
        let event = UsageEvent::from_loose_value(&value).unwrap();
        assert_eq!(event.provider, ProviderKind::Gemini);
        assert_eq!(event.total_tokens, 3000);
        assert_eq!(event.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn test_loose_provider_from_url() {
        let value = json!({ "totalTokens": 5, "url": "https://api.anthropic.com/v1/messages" });
        let event = UsageEvent::from_loose_value(&value).unwrap();
        assert_eq!(event.provider, ProviderKind::Claude);
    }

    #[test]
    fn test_loose_rejects_non_object() {
        assert!(UsageEvent::from_loose_value(&json!([1, 2, 3])).is_none());
        assert!(UsageEvent::from_loose_value(&json!("chatgpt")).is_none());
    }

    #[test]
    fn test_as_count() {
        assert_eq!(as_count(&json!(12)), Some(12));
        assert_eq!(as_count(&json!(12.7)), Some(12));
        assert_eq!(as_count(&json!("42")), Some(42));
        assert_eq!(as_count(&json!(-3)), None);
        assert_eq!(as_count(&json!(null)), None);
    }
}
