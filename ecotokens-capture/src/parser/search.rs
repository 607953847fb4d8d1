//! Generic search for a bare token count anywhere in a body.
//!
//! Some endpoints report only a single number (`count_tokens`,
//! `token_count` or `total_tokens`). It is split evenly between input and
//! output, with the odd token going to output.

use ecotokens_core::{ProviderKind, UsageEvent};
use serde_json::Value;
use std::collections::HashSet;

use super::{MAX_NEST_DEPTH, ParseInput, network_event, str_field};

/// Keys holding a bare token count, in priority order.
pub const COUNT_KEYS: &[&str] = &["count_tokens", "token_count", "total_tokens"];

/// Returns the first positive count under [`COUNT_KEYS`] on this object.
///
/// Only JSON numbers count; numeric strings are ignored.
fn count_on(object: &Value) -> Option<u64> {
    let value = COUNT_KEYS
        .iter()
        .find_map(|key| object.get(*key).filter(|v| !v.is_null()))?;
    let n = value.as_f64()?;
    if n.is_finite() && n >= 1.0 {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Some(n.floor() as u64)
    } else {
        None
    }
}

/// Depth-first search for the first object carrying a positive count.
///
/// Visited nodes are tracked by address and recursion stops at
/// [`MAX_NEST_DEPTH`].
pub fn find_count_tokens(
    value: &Value,
    provider: ProviderKind,
    url: &str,
) -> Option<UsageEvent> {
    let mut seen = HashSet::new();
    search(value, provider, url, &mut seen, 0)
}

fn search(
    value: &Value,
    provider: ProviderKind,
    url: &str,
    seen: &mut HashSet<*const Value>,
    depth: usize,
) -> Option<UsageEvent> {
    if depth > MAX_NEST_DEPTH || !seen.insert(std::ptr::from_ref(value)) {
        return None;
    }
    match value {
        Value::Object(map) => {
            if let Some(total) = count_on(value) {
                let input = total / 2;
                let model = str_field(value, "model").or_else(|| str_field(value, "model_name"));
                return Some(network_event(
                    provider,
                    input,
                    total - input,
                    Some(total),
                    model,
                    url,
                ));
            }
            map.values()
                .find_map(|child| search(child, provider, url, seen, depth + 1))
        }
        Value::Array(items) => items
            .iter()
            .find_map(|child| search(child, provider, url, seen, depth + 1)),
        _ => None,
    }
}

/// Returns true if the top level of `body` has a numeric count key.
fn has_top_level_count(body: &Value) -> bool {
    COUNT_KEYS
        .iter()
        .any(|key| body.get(*key).is_some_and(Value::is_number))
}

/// Chain entry: ChatGPT report endpoints, or any body exposing a count at
/// the top level.
pub fn extract(input: &ParseInput<'_>) -> Option<UsageEvent> {
    let body = input.body.as_ref()?;
    let route = input.route;
    if (route.chatgpt && route.chatgpt_report) || has_top_level_count(body) {
        return find_count_tokens(body, route.search_provider(), input.url);
    }
    None
}
