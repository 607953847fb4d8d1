//! ChatGPT / OpenAI `usage` shape.

use ecotokens_core::{ProviderKind, UsageEvent};
use serde::Deserialize;
use serde_json::Value;

use super::{ParseInput, lenient_count, network_event, str_field};

/// OpenAI-style usage block.
#[derive(Debug, Default, Deserialize)]
pub struct OpenAiUsage {
    /// Prompt tokens.
    #[serde(default, deserialize_with = "lenient_count")]
    pub prompt_tokens: Option<u64>,
    /// Completion tokens.
    #[serde(default, deserialize_with = "lenient_count")]
    pub completion_tokens: Option<u64>,
    /// Reported total.
    #[serde(default, deserialize_with = "lenient_count")]
    pub total_tokens: Option<u64>,
}

/// Parses `{model?, usage: {prompt_tokens, completion_tokens, total_tokens?}}`.
pub fn parse_body(body: &Value, url: &str) -> Option<UsageEvent> {
    let usage = body.get("usage").filter(|u| u.is_object())?;
    let usage = OpenAiUsage::deserialize(usage).ok()?;
    Some(network_event(
        ProviderKind::ChatGpt,
        usage.prompt_tokens.unwrap_or(0),
        usage.completion_tokens.unwrap_or(0),
        usage.total_tokens,
        str_field(body, "model"),
        url,
    ))
}

/// Chain entry: direct JSON body on a ChatGPT route.
pub fn extract(input: &ParseInput<'_>) -> Option<UsageEvent> {
    if !input.route.chatgpt {
        return None;
    }
    parse_body(input.body.as_ref()?, input.url)
}
