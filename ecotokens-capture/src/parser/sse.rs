//! Server-sent event streams.
//!
//! Streaming responses carry usage, if at all, on one of the final
//! `data:` lines, so lines are scanned from the end.

use ecotokens_core::{ProviderKind, UsageEvent};
use serde_json::Value;

use super::{ParseInput, chatgpt, claude};

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// Scans `data:` lines from last to first for a JSON object with `usage`.
///
/// The usage block may use OpenAI or Anthropic field names; the event is
/// credited to ChatGPT either way.
pub fn parse_stream(text: &str, url: &str) -> Option<UsageEvent> {
    let json = text
        .lines()
        .rev()
        .filter_map(|line| line.trim_end_matches('\r').strip_prefix(DATA_PREFIX))
        .filter(|data| data.trim() != DONE_MARKER)
        .filter_map(|data| serde_json::from_str::<Value>(data).ok())
        .find(|json| json.get("usage").is_some_and(Value::is_object))?;

    chatgpt::parse_body(&json, url)
        .filter(UsageEvent::has_tokens)
        .or_else(|| {
            claude::parse_body(&json, url).map(|mut event| {
                event.provider = ProviderKind::ChatGpt;
                event
            })
        })
}

/// Chain entry: streamed text on a ChatGPT route.
///
/// Skipped for report endpoints that returned a JSON body; those go to the
/// count-token search instead.
pub fn extract(input: &ParseInput<'_>) -> Option<UsageEvent> {
    let route = input.route;
    if !route.chatgpt || (route.chatgpt_report && input.body.is_some()) {
        return None;
    }
    parse_stream(input.text, input.url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_usage_line_wins() {
        let text = concat!(
            "event: delta\n",
            "data: {\"usage\":{\"prompt_tokens\":1,\"completion_tokens\":1}}\n",
            "data: {\"choices\":[]}\n",
            "data: {\"model\":\"gpt-4o\",",
            "\"usage\":{\"prompt_tokens\":9,\"completion_tokens\":11}}\r\n",
            "data: [DONE]\n",
        );
        let event = parse_stream(text, "https://chatgpt.com/backend-api/conversation").unwrap();
        assert_eq!((event.input_tokens, event.output_tokens, event.total_tokens), (9, 11, 20));
        assert_eq!(event.model, "gpt-4o");
    }

    #[test]
    fn test_anthropic_names_in_stream() {
        let text = "data: {\"usage\":{\"input_tokens\":3,\"output_tokens\":5}}\n\n";
        let event = parse_stream(text, "u").unwrap();
        assert_eq!(event.provider, ProviderKind::ChatGpt);
        assert_eq!(event.total_tokens, 8);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let text = "data: {not json\ndata: [DONE]\n";
        assert!(parse_stream(text, "u").is_none());
        assert!(parse_stream("", "u").is_none());
    }

    #[test]
    fn test_extract_via_chain() {
        let text = concat!(
            "data: {\"usage\":{\"prompt_tokens\":2,\"completion_tokens\":2}}\n",
            "data: [DONE]\n",
        );
        let event = crate::parser::parse_usage(
            None,
            text,
            "https://chatgpt.com/backend-api/f/conversation",
        )
        .unwrap();
        assert_eq!(event.total_tokens, 4);
    }
}
