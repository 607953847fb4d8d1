//! Per-site observation settings.
//!
//! Each supported chat site is described by a [`SiteConfig`]: which hosts
//! it serves, which elements hold assistant and user messages, and how long
//! to wait after page load before observing.

use ecotokens_core::ProviderKind;
use std::time::Duration;

// ============================================================================
// Site Config
// ============================================================================

/// Static configuration for one chat site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteConfig {
    /// Provider credited for messages on this site.
    pub provider: ProviderKind,
    /// Host substrings identifying the site.
    pub hostnames: &'static [&'static str],
    /// Selector group (comma-separated) matching assistant messages.
    pub assistant_selector: &'static str,
    /// Selector group (comma-separated) matching user prompts.
    pub user_selector: &'static str,
    /// Delay before observation starts; these apps render late.
    pub observe_delay: Duration,
}

impl SiteConfig {
    /// Resolves the site serving `host`.
    pub fn for_host(host: &str) -> Option<&'static SiteConfig> {
        SiteRegistry::for_host(host)
    }

    /// Returns the individual assistant selectors.
    pub fn assistant_selectors(&self) -> impl Iterator<Item = &'static str> {
        split_group(self.assistant_selector)
    }

    /// Returns true if `host` belongs to this site.
    pub fn serves(&self, host: &str) -> bool {
        self.hostnames.iter().any(|h| host.contains(h))
    }
}

fn split_group(group: &'static str) -> impl Iterator<Item = &'static str> {
    group.split(',').map(str::trim).filter(|s| !s.is_empty())
}

// ============================================================================
// Static Registry
// ============================================================================

const SITES: &[SiteConfig] = &[
    SiteConfig {
        provider: ProviderKind::ChatGpt,
        hostnames: &["chatgpt.com", "chat.openai.com"],
        assistant_selector: "[data-message-author-role='assistant']",
        user_selector: "[data-message-author-role='user']",
        observe_delay: Duration::ZERO,
    },
    SiteConfig {
        provider: ProviderKind::Claude,
        hostnames: &["claude.ai"],
        assistant_selector: concat!(
            "div.font-claude-message, [data-test-render-count], ",
            "div[class*='claude-message']",
        ),
        user_selector: "[data-testid='user-message']",
        observe_delay: Duration::from_millis(500),
    },
    SiteConfig {
        provider: ProviderKind::Gemini,
        hostnames: &["gemini.google.com", "aistudio.google.com"],
        assistant_selector: concat!(
            "[role='article'], [class*='model-response'], [class*='markdown'], ",
            "[class*='assistant-message'], [class*='bot-message'], [data-message-type='model']",
        ),
        user_selector: "[class*='user-message'], [data-message-type='user']",
        observe_delay: Duration::from_millis(500),
    },
];

/// Registry of supported chat sites.
pub struct SiteRegistry;

impl SiteRegistry {
    /// Returns all site configurations.
    pub fn all() -> &'static [SiteConfig] {
        SITES
    }

    /// Gets the site for a provider.
    pub fn get(provider: ProviderKind) -> Option<&'static SiteConfig> {
        SITES.iter().find(|s| s.provider == provider)
    }

    /// Gets the site serving `host`.
    pub fn for_host(host: &str) -> Option<&'static SiteConfig> {
        let host = host.to_ascii_lowercase();
        SITES.iter().find(|s| s.serves(&host))
    }
}

// ============================================================================
// Tests
// ============================================================================
