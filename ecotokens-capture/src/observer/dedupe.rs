//! Global duplicate suppression for DOM detections.

use ecotokens_core::ProviderKind;
use std::time::Duration;
use tokio::time::Instant;

/// Window within which a repeated signature is suppressed.
pub const DEDUPE_WINDOW: Duration = Duration::from_millis(3000);

/// Detection signature: `(provider, output tokens, total tokens)`.
pub type Signature = (ProviderKind, u64, u64);

/// Remembers the last admitted signature.
///
/// A detection identical to the last one within [`DEDUPE_WINDOW`]
/// (inclusive) is suppressed, regardless of which element produced it.
#[derive(Debug, Clone)]
pub struct DedupeWindow {
    window: Duration,
    last: Option<(Signature, Instant)>,
}

impl DedupeWindow {
    /// Creates a window of [`DEDUPE_WINDOW`].
    pub fn new() -> Self {
        Self::with_window(DEDUPE_WINDOW)
    }

    /// Creates a window of custom length.
    pub fn with_window(window: Duration) -> Self {
        Self { window, last: None }
    }

    /// Returns true and records `signature` unless it repeats the last
    /// admitted one within the window.
    pub fn admit(&mut self, signature: Signature, now: Instant) -> bool {
        if let Some((last, at)) = self.last {
            if last == signature && now.saturating_duration_since(at) <= self.window {
                return false;
            }
        }
        self.last = Some((signature, now));
        true
    }
}

impl Default for DedupeWindow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIG: Signature = (ProviderKind::ChatGpt, 50, 60);

    #[test]
    fn test_window_boundary() {
        let t0 = Instant::now();
        let mut window = DedupeWindow::new();
        assert!(window.admit(SIG, t0));
        assert!(!window.admit(SIG, t0 + Duration::from_millis(1500)));
        assert!(!window.admit(SIG, t0 + Duration::from_millis(3000)));
        assert!(window.admit(SIG, t0 + Duration::from_millis(3001)));
    }

    #[test]
    fn test_suppression_does_not_extend_window() {
        let t0 = Instant::now();
        let mut window = DedupeWindow::new();
        assert!(window.admit(SIG, t0));
        assert!(!window.admit(SIG, t0 + Duration::from_millis(2000)));
        assert!(window.admit(SIG, t0 + Duration::from_millis(3500)));
    }

    #[test]
    fn test_different_signature_admitted() {
        let t0 = Instant::now();
        let mut window = DedupeWindow::new();
        assert!(window.admit(SIG, t0));
        assert!(window.admit((ProviderKind::Claude, 50, 60), t0));
        assert!(window.admit(SIG, t0));
    }
}
