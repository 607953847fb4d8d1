//! Provider-related types.
//!
//! This module contains [`ProviderKind`], the AI chat service a usage event
//! was observed on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Provider Kind
// ============================================================================

/// AI chat services whose usage can be observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ProviderKind {
    /// OpenAI ChatGPT
    ChatGpt,
    /// Anthropic Claude
    Claude,
    /// Google Gemini (and AI Studio)
    Gemini,
    /// Anything we could not attribute
    Unknown,
}

impl ProviderKind {
    /// Returns the display name for this provider.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::ChatGpt => "ChatGPT",
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
            Self::Unknown => "Unknown",
        }
    }

    /// Returns the CLI / storage name for this provider (lowercase).
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::ChatGpt => "chatgpt",
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Unknown => "unknown",
        }
    }

    /// Returns the providers that can actually be observed.
    pub fn known() -> &'static [ProviderKind] {
        &[Self::ChatGpt, Self::Claude, Self::Gemini]
    }

    /// Parses a loosely formatted provider label.
    ///
    /// Trims and lowercases the input; anything unrecognized becomes
    /// [`ProviderKind::Unknown`].
    pub fn from_loose(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "chatgpt" | "openai" => Self::ChatGpt,
            "claude" | "anthropic" => Self::Claude,
            "gemini" | "google" => Self::Gemini,
            _ => Self::Unknown,
        }
    }

    /// Infers a provider from a host name.
    ///
    /// Returns `None` when the host does not belong to a known provider.
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.to_ascii_lowercase();
        if host.contains("openai") || host.contains("chatgpt") {
            Some(Self::ChatGpt)
        } else if host.contains("anthropic") || host.contains("claude") {
            Some(Self::Claude)
        } else if host.contains("google") || host.contains("gemini") {
            Some(Self::Gemini)
        } else {
            None
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_name())
    }
}

impl From<String> for ProviderKind {
    fn from(label: String) -> Self {
        Self::from_loose(&label)
    }
}

impl FromStr for ProviderKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_loose(s))
    }
}

// ============================================================================
// Tests
// ============================================================================
