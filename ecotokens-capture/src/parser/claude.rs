//! Anthropic `usage` shape.

use ecotokens_core::{ProviderKind, UsageEvent};
use serde::Deserialize;
use serde_json::Value;

use super::{ParseInput, lenient_count, network_event, str_field};

/// Anthropic-style usage block.
#[derive(Debug, Default, Deserialize)]
pub struct AnthropicUsage {
    /// Input tokens.
    #[serde(default, deserialize_with = "lenient_count")]
    pub input_tokens: Option<u64>,
    /// Output tokens.
    #[serde(default, deserialize_with = "lenient_count")]
    pub output_tokens: Option<u64>,
    /// Reported total, rarely present.
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_tokens: Option<u64>,
}

/// Parses `{model?, usage: {input_tokens, output_tokens}}`.
pub fn parse_body(body: &Value, url: &str) -> Option<UsageEvent> {
    let usage = body.get("usage").filter(|u| u.is_object())?;
    let usage = AnthropicUsage::deserialize(usage).ok()?;
    Some(network_event(
        ProviderKind::Claude,
        usage.input_tokens.unwrap_or(0),
        usage.output_tokens.unwrap_or(0),
        usage.total_tokens,
        str_field(body, "model"),
        url,
    ))
}

/// Chain entry: direct JSON body on a Claude route.
pub fn extract(input: &ParseInput<'_>) -> Option<UsageEvent> {
    if !input.route.claude || input.route.chatgpt {
        return None;
    }
    parse_body(input.body.as_ref()?, input.url)
}
