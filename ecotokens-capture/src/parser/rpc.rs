//! Length-prefixed RPC responses.
//!
//! Google web apps answer batched RPCs with an anti-hijacking prefix
//! followed by blocks of `<decimal length>\n<payload>`, each payload
//! optionally followed by a newline.

use ecotokens_core::UsageEvent;
use serde_json::Value;
use tracing::trace;

use super::ParseInput;
use super::search::find_count_tokens;

/// Prefix marking a length-prefixed response.
pub const RPC_PREFIX: &str = ")]}'\n";

/// Splits a length-prefixed response into decoded JSON blocks.
///
/// Returns `None` if `text` lacks [`RPC_PREFIX`]. Parsing stops at the first
/// header that is not a positive decimal length. The length is measured in
/// characters; when the sized slice does not decode, the rest of the line is
/// tried instead, and a block that decodes neither way is skipped.
pub fn parse_rpc_blocks(text: &str) -> Option<Vec<Value>> {
    let rest = text.strip_prefix(RPC_PREFIX)?;
    let mut blocks = Vec::new();
    let mut pos = 0;

    while pos < rest.len() {
        let Some(header_end) = rest[pos..].find('\n').map(|i| pos + i) else {
            break;
        };
        let Some(len) = parse_length(&rest[pos..header_end]) else {
            break;
        };
        pos = header_end + 1;

        let sized_end = advance_chars(rest, pos, len);
        let line_end = rest[pos..].find('\n').map_or(rest.len(), |i| pos + i);

        if let Some(block) = decode(&rest[pos..sized_end]) {
            blocks.push(block);
            pos = sized_end;
        } else if let Some(block) = decode(&rest[pos..line_end]) {
            blocks.push(block);
            pos = line_end;
        } else {
            trace!(len, "Skipping undecodable RPC block");
            pos = sized_end;
        }

        if rest[pos..].starts_with('\n') {
            pos += 1;
        }
    }

    Some(blocks)
}

/// Parses the leading decimal digits of a header; zero is not a length.
fn parse_length(header: &str) -> Option<usize> {
    let header = header.trim_start();
    let digits_end = header
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(header.len());
    header[..digits_end].parse::<usize>().ok().filter(|n| *n > 0)
}

/// Returns the byte offset `chars` characters after `start`, clamped to the end.
fn advance_chars(text: &str, start: usize, chars: usize) -> usize {
    text[start..]
        .char_indices()
        .nth(chars)
        .map_or(text.len(), |(offset, _)| start + offset)
}

fn decode(block: &str) -> Option<Value> {
    serde_json::from_str::<Value>(block)
        .ok()
        .filter(|v| !v.is_null())
}

/// Chain entry: ChatGPT or Google hosts. Each block is searched for a
/// count, then the whole body as a last resort.
pub fn extract(input: &ParseInput<'_>) -> Option<UsageEvent> {
    let route = input.route;
    if !route.chatgpt && !route.google {
        return None;
    }
    let provider = route.search_provider();

    parse_rpc_blocks(input.text)
        .unwrap_or_default()
        .iter()
        .find_map(|block| find_count_tokens(block, provider, input.url))
        .or_else(|| {
            input
                .body
                .as_ref()
                .and_then(|body| find_count_tokens(body, provider, input.url))
        })
}
