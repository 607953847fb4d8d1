//! Heuristic token estimation from text length.
//!
//! A token is taken to be [`CHARS_PER_TOKEN`] characters. Length is
//! measured in Unicode scalar values, so multi-byte text is not
//! over-counted.

/// Characters per token.
pub const CHARS_PER_TOKEN: u64 = 4;

/// Estimates tokens as `ceil(chars / 4)`. Empty text is 0 tokens.
pub fn estimate_tokens(text: &str) -> u64 {
    let chars = text.chars().count() as u64;
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Like [`estimate_tokens`], but treats a missing text as 0 tokens.
pub fn estimate_tokens_opt(text: Option<&str>) -> u64 {
    text.map_or(0, estimate_tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_missing() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens_opt(None), 0);
        assert_eq!(estimate_tokens_opt(Some("")), 0);
    }

    #[test]
    fn test_ceil_division() {
        for len in 1..=64usize {
            let text = "x".repeat(len);
            let expected = (len as u64).div_ceil(CHARS_PER_TOKEN);
            assert_eq!(estimate_tokens(&text), expected, "len {len}");
        }
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        // 4 chars, 12 bytes
        assert_eq!(estimate_tokens("日本語字"), 1);
    }
}
