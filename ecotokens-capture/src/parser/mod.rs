//! Response body parsing.
//!
//! [`parse_usage`] runs a fixed, prioritized chain of shape-specific
//! extractors over a captured response body. The first extractor that yields
//! an event with a positive token count wins. Every extractor guards on the
//! request route, so e.g. the Claude shape is never tried for a ChatGPT URL.
//!
//! | # | Extractor | Routes |
//! |---|-----------|--------|
//! | 1 | [`chatgpt`] direct `usage` | chatgpt |
//! | 2 | [`claude`] direct `usage` | claude |
//! | 3 | [`gemini`] nested `usageMetadata` | gemini |
//! | 4 | [`sse`] stream, last `data:` line with `usage` | chatgpt |
//! | 5 | [`search`] for `count_tokens` and friends | chatgpt, fallback |
//! | 6 | [`rpc`] length-prefixed blocks | chatgpt, google hosts |
//!
//! Parse misses are expected and frequent; they are never errors.

pub mod chatgpt;
pub mod claude;
pub mod gemini;
pub mod rpc;
pub mod search;
pub mod sse;

use ecotokens_core::{ProviderKind, UNKNOWN_MODEL, UsageEvent, as_count};
use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::trace;

pub use rpc::parse_rpc_blocks;

/// URL fragments whose responses are never parsed.
pub const BLOCKED_URL_FRAGMENTS: &[&str] = &["googleadservices.com", "analytics", "gstatic.com"];

/// Maximum recursion depth when searching nested bodies.
pub const MAX_NEST_DEPTH: usize = 16;

/// ChatGPT usage-report path: `/r` at the end or before a query.
static REPORT_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/r(\?|$)").expect("Invalid regex"));

// ============================================================================
// Routing
// ============================================================================

/// Which provider shapes apply to a request URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Route {
    /// ChatGPT backend or OpenAI host.
    pub chatgpt: bool,
    /// ChatGPT usage-report endpoint (`backend-api`, `/r`).
    pub chatgpt_report: bool,
    /// Anthropic or claude.ai host.
    pub claude: bool,
    /// Gemini / AI Studio host.
    pub gemini: bool,
    /// Any Google host, eligible for the length-prefixed format.
    pub google: bool,
}

impl Route {
    /// Resolves the route for `url` requested from a page on `page`.
    pub fn resolve(url: &str, page: Option<ProviderKind>) -> Self {
        let on_chatgpt_page = page == Some(ProviderKind::ChatGpt);
        let chatgpt = url.contains("backend-api")
            || url.contains("openai.com")
            || url.contains("chatgpt.com")
            || (on_chatgpt_page && (url.starts_with('/') || url.contains("/r")));
        let chatgpt_report = url.contains("backend-api") || REPORT_PATH_RE.is_match(url);

        Self {
            chatgpt,
            chatgpt_report,
            claude: url.contains("anthropic.com") || url.contains("claude.ai"),
            gemini: url.contains("generativelanguage.googleapis.com")
                || url.contains("gemini")
                || url.contains("aistudio.google"),
            google: url.contains("google.com"),
        }
    }

    /// Provider credited by the generic count-token search.
    pub fn search_provider(&self) -> ProviderKind {
        if self.chatgpt {
            ProviderKind::ChatGpt
        } else {
            ProviderKind::Gemini
        }
    }
}

/// Returns true if responses from `url` should be ignored outright.
///
/// On a ChatGPT page only backend and usage-report calls are considered.
pub fn is_ignored(url: &str, page: Option<ProviderKind>) -> bool {
    if BLOCKED_URL_FRAGMENTS.iter().any(|fragment| url.contains(fragment)) {
        return true;
    }
    page == Some(ProviderKind::ChatGpt) && !url.contains("backend-api") && !url.contains("/r")
}

// ============================================================================
// Chain
// ============================================================================

/// Everything an extractor may look at.
#[derive(Debug)]
pub struct ParseInput<'a> {
    /// Request URL, possibly relative.
    pub url: &'a str,
    /// Raw response text.
    pub text: &'a str,
    /// Response text decoded as JSON, if it is JSON.
    pub body: Option<Value>,
    /// Resolved route.
    pub route: Route,
}

impl<'a> ParseInput<'a> {
    /// Builds the input, decoding `text` as JSON when possible.
    pub fn new(url: &'a str, text: &'a str, page: Option<ProviderKind>) -> Self {
        Self {
            url,
            text,
            body: serde_json::from_str(text).ok(),
            route: Route::resolve(url, page),
        }
    }
}

/// A single shape-specific extractor.
pub type Extractor = fn(&ParseInput<'_>) -> Option<UsageEvent>;

/// The extractor chain, in priority order.
pub const EXTRACTORS: &[(&str, Extractor)] = &[
    ("chatgpt", chatgpt::extract),
    ("claude", claude::extract),
    ("gemini", gemini::extract),
    ("sse", sse::extract),
    ("count_tokens", search::extract),
    ("rpc", rpc::extract),
];

/// Parses a captured response body into a usage event.
///
/// `page` is the provider whose site issued the request, if known. Returns
/// `None` for blocked URLs, unrecognized shapes, and results with no
/// positive token count.
pub fn parse_usage(page: Option<ProviderKind>, text: &str, url: &str) -> Option<UsageEvent> {
    if text.is_empty() || is_ignored(url, page) {
        return None;
    }

    let input = ParseInput::new(url, text, page);
    for (name, extractor) in EXTRACTORS {
        if let Some(event) = extractor(&input).filter(UsageEvent::has_tokens) {
            trace!(extractor = name, total = event.total_tokens, "Usage extracted");
            return Some(event);
        }
    }
    trace!(url, "No usage shape matched");
    None
}

// ============================================================================
// Shared Helpers
// ============================================================================

/// Deserializes a token count from a number or numeric string.
///
/// Anything else, including negative numbers, becomes `None`.
pub(crate) fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_count))
}

/// Builds a network-parsed event.
pub(crate) fn network_event(
    provider: ProviderKind,
    input: u64,
    output: u64,
    reported_total: Option<u64>,
    model: Option<&str>,
    url: &str,
) -> UsageEvent {
    UsageEvent::new(provider, input, output)
        .with_reported_total(reported_total)
        .with_model(model.filter(|m| !m.is_empty()).unwrap_or(UNKNOWN_MODEL))
        .with_url(url)
}

/// Returns the string at `key` on an object value.
pub(crate) fn str_field<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

// ============================================================================
// Tests
// ============================================================================
