//! Gemini `usageMetadata` shape, possibly nested.

use ecotokens_core::{ProviderKind, UsageEvent};
use serde::Deserialize;
use serde_json::Value;

use super::{MAX_NEST_DEPTH, ParseInput, lenient_count, network_event, str_field};

/// Keys followed when looking for a nested usage block.
const NESTING_KEYS: &[&str] = &["data", "result", "response"];

/// Gemini usage metadata, camelCase or snake_case.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Prompt tokens.
    #[serde(default, alias = "prompt_token_count", deserialize_with = "lenient_count")]
    pub prompt_token_count: Option<u64>,
    /// Candidate (output) tokens.
    #[serde(default, alias = "candidates_token_count", deserialize_with = "lenient_count")]
    pub candidates_token_count: Option<u64>,
    /// Reported total.
    #[serde(default, alias = "total_token_count", deserialize_with = "lenient_count")]
    pub total_token_count: Option<u64>,
}

/// Finds the object carrying `usageMetadata`, following `data`, `result`
/// and `response` up to [`MAX_NEST_DEPTH`] levels.
///
/// Returns the holder and its metadata value.
pub fn find_usage_metadata(value: &Value) -> Option<(&Value, &Value)> {
    let mut current = value;
    for _ in 0..=MAX_NEST_DEPTH {
        if !current.is_object() {
            return None;
        }
        if let Some(meta) = current
            .get("usageMetadata")
            .or_else(|| current.get("usage_metadata"))
            .filter(|m| m.is_object())
        {
            return Some((current, meta));
        }
        current = NESTING_KEYS
            .iter()
            .find_map(|key| current.get(*key).filter(|v| !v.is_null()))?;
    }
    None
}

/// Parses a body with a (possibly nested) usage metadata block.
pub fn parse_body(body: &Value, url: &str) -> Option<UsageEvent> {
    let (holder, meta) = find_usage_metadata(body)?;
    let meta = UsageMetadata::deserialize(meta).ok()?;
    let model = ["modelVersion", "model_version"]
        .iter()
        .find_map(|key| str_field(holder, key).or_else(|| str_field(body, key)));
    Some(network_event(
        ProviderKind::Gemini,
        meta.prompt_token_count.unwrap_or(0),
        meta.candidates_token_count.unwrap_or(0),
        meta.total_token_count,
        model,
        url,
    ))
}

/// Chain entry: JSON body on a Gemini route.
pub fn extract(input: &ParseInput<'_>) -> Option<UsageEvent> {
    let route = input.route;
    if !route.gemini || route.chatgpt || route.claude {
        return None;
    }
    parse_body(input.body.as_ref()?, input.url)
}
