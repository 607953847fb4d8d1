//! Stability detection for streamed assistant messages.
//!
//! Assistant messages render incrementally. A message is counted once its
//! text length has stopped changing for a number of consecutive polls, or
//! once it has been watched for [`MAX_WAIT`], whichever comes first.
//!
//! Per-node state lives in an arena keyed by [`NodeId`]:
//!
//! ```text
//! Candidate --first poll--> Watching --stable / MAX_WAIT--> Confirmed
//!                              ^                                |
//!                              +------- length changed ---------+
//! ```
//!
//! Nodes that leave the page are dropped on the next poll.

use ecotokens_core::tokenizer::{estimate_tokens, estimate_tokens_opt};
use ecotokens_core::UsageEvent;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::dedupe::DedupeWindow;
use super::document::{Document, NodeId, text_len};
use crate::site::SiteConfig;

/// Poll cadence while the page is visible.
pub const VISIBLE_POLL: Duration = Duration::from_millis(200);

/// Poll cadence while the page is hidden.
pub const HIDDEN_POLL: Duration = Duration::from_millis(1000);

/// Consecutive unchanged polls required while visible.
pub const VISIBLE_STABLE_TICKS: u32 = 5;

/// Consecutive unchanged polls required while hidden.
pub const HIDDEN_STABLE_TICKS: u32 = 3;

/// Longest a node is watched before it is confirmed regardless.
pub const MAX_WAIT: Duration = Duration::from_secs(60);

/// Messages shorter than this are not counted.
pub const MIN_TEXT_CHARS: usize = 10;

/// Lifecycle of a tracked node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Matched, not yet polled.
    Candidate,
    /// Polling for a stable length.
    Watching,
    /// Counted (or deliberately skipped); ignored until its length changes.
    Confirmed,
}

#[derive(Debug, Clone)]
struct Tracked {
    state: TrackState,
    last_len: usize,
    stable_ticks: u32,
    started_at: Instant,
    processed_len: Option<usize>,
}

impl Tracked {
    fn candidate(len: usize, now: Instant) -> Self {
        Self {
            state: TrackState::Candidate,
            last_len: len,
            stable_ticks: 0,
            started_at: now,
            processed_len: None,
        }
    }

    fn rewatch(&mut self, len: usize, now: Instant) {
        self.state = TrackState::Watching;
        self.last_len = len;
        self.stable_ticks = 0;
        self.started_at = now;
    }

    fn is_pending(&self) -> bool {
        matches!(self.state, TrackState::Candidate | TrackState::Watching)
    }
}

/// Tracks assistant messages on one page and emits a usage event for each
/// message once it stops changing.
#[derive(Debug)]
pub struct StabilityDetector {
    site: &'static SiteConfig,
    tracked: HashMap<NodeId, Tracked>,
    visible: bool,
    dedupe: DedupeWindow,
}

impl StabilityDetector {
    /// Creates a detector for `site`.
    pub fn new(site: &'static SiteConfig, visible: bool) -> Self {
        Self {
            site,
            tracked: HashMap::new(),
            visible,
            dedupe: DedupeWindow::new(),
        }
    }

    /// Returns the site being observed.
    pub fn site(&self) -> &'static SiteConfig {
        self.site
    }

    /// Returns true if the page is visible.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Current poll cadence.
    pub fn poll_interval(&self) -> Duration {
        if self.visible { VISIBLE_POLL } else { HIDDEN_POLL }
    }

    /// Unchanged polls required before confirming.
    pub fn required_ticks(&self) -> u32 {
        if self.visible {
            VISIBLE_STABLE_TICKS
        } else {
            HIDDEN_STABLE_TICKS
        }
    }

    /// Returns the state of `node`, if tracked.
    pub fn state_of(&self, node: NodeId) -> Option<TrackState> {
        self.tracked.get(&node).map(|t| t.state)
    }

    /// Number of nodes awaiting confirmation.
    pub fn pending_count(&self) -> usize {
        self.tracked.values().filter(|t| t.is_pending()).count()
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    fn matches_assistant(&self, doc: &impl Document, node: NodeId) -> bool {
        self.site.assistant_selectors().any(|s| doc.matches(node, s))
    }

    fn has_tracked_ancestor(&self, doc: &impl Document, node: NodeId) -> bool {
        let mut current = doc.parent(node);
        while let Some(parent) = current {
            if self.tracked.contains_key(&parent) {
                return true;
            }
            current = doc.parent(parent);
        }
        false
    }

    fn has_nested_match(&self, doc: &impl Document, node: NodeId) -> bool {
        self.site
            .assistant_selectors()
            .any(|s| !doc.query_within(node, s).is_empty())
    }

    /// Starts watching `node` if it is a fresh, innermost assistant message,
    /// or a confirmed one whose length has changed since.
    ///
    /// Returns true if the node is now being watched.
    pub fn consider(&mut self, doc: &impl Document, node: NodeId, now: Instant) -> bool {
        if !doc.is_connected(node) || !self.matches_assistant(doc, node) {
            return false;
        }

        if let Some(tracked) = self.tracked.get_mut(&node) {
            if tracked.state != TrackState::Confirmed {
                return false;
            }
            let len = text_len(doc, node);
            if tracked.processed_len == Some(len) {
                return false;
            }
            trace!(%node, len, "Confirmed message changed, watching again");
            tracked.rewatch(len, now);
            return true;
        }

        if self.has_tracked_ancestor(doc, node) || self.has_nested_match(doc, node) {
            return false;
        }

        let len = text_len(doc, node);
        trace!(%node, len, "Watching new message");
        self.tracked.insert(node, Tracked::candidate(len, now));
        true
    }

    /// Handles newly inserted elements: each node and each matching
    /// descendant is considered.
    ///
    /// Returns the number of nodes newly watched.
    pub fn on_added(&mut self, doc: &impl Document, nodes: &[NodeId], now: Instant) -> usize {
        let site = self.site;
        let mut watched = 0;
        for &node in nodes {
            watched += usize::from(self.consider(doc, node, now));
            for selector in site.assistant_selectors() {
                for inner in doc.query_within(node, selector) {
                    watched += usize::from(self.consider(doc, inner, now));
                }
            }
        }
        watched
    }

    /// Re-queries every assistant message on the page.
    ///
    /// Returns the number of nodes newly watched.
    pub fn safety_scan(&mut self, doc: &impl Document, now: Instant) -> usize {
        let nodes = doc.query_all(self.site.assistant_selector);
        let watched = nodes
            .into_iter()
            .map(|node| usize::from(self.consider(doc, node, now)))
            .sum();
        if watched > 0 {
            debug!(watched, "Safety scan found unobserved messages");
        }
        watched
    }

    // ------------------------------------------------------------------------
    // Polling
    // ------------------------------------------------------------------------

    /// Polls every pending node and returns the events confirmed this tick.
    pub fn tick(&mut self, doc: &impl Document, now: Instant) -> Vec<UsageEvent> {
        self.tracked.retain(|node, _| doc.is_connected(*node));

        let required = self.required_ticks();
        let mut pending: Vec<NodeId> = self
            .tracked
            .iter()
            .filter(|(_, t)| t.is_pending())
            .map(|(node, _)| *node)
            .collect();
        pending.sort_unstable();

        let mut ready = Vec::new();
        for node in pending {
            let len = text_len(doc, node);
            let Some(tracked) = self.tracked.get_mut(&node) else {
                continue;
            };
            if len == tracked.last_len {
                tracked.stable_ticks += 1;
            } else {
                tracked.stable_ticks = 0;
                tracked.last_len = len;
            }
            tracked.state = TrackState::Watching;

            let forced = now.saturating_duration_since(tracked.started_at) >= MAX_WAIT;
            if tracked.stable_ticks >= required || forced {
                ready.push((node, forced));
            }
        }

        ready
            .into_iter()
            .filter_map(|(node, forced)| self.confirm(doc, node, now, forced))
            .collect()
    }

    fn confirm(
        &mut self,
        doc: &impl Document,
        node: NodeId,
        now: Instant,
        forced: bool,
    ) -> Option<UsageEvent> {
        let text = doc.text(node);
        let len = text.chars().count();
        if let Some(tracked) = self.tracked.get_mut(&node) {
            tracked.state = TrackState::Confirmed;
            tracked.processed_len = Some(len);
            tracked.stable_ticks = 0;
        }
        if forced {
            debug!(%node, len, "Message never stabilized, confirming anyway");
        }
        if len < MIN_TEXT_CHARS {
            trace!(%node, len, "Message too short to count");
            return None;
        }

        let output = estimate_tokens(&text);
        let prompt = doc
            .query_all(self.site.user_selector)
            .last()
            .map(|user| doc.text(*user));
        let input = estimate_tokens_opt(prompt.as_deref());
        let total = input + output;

        let provider = self.site.provider;
        if !self.dedupe.admit((provider, output, total), now) {
            debug!(%node, output, total, "Duplicate detection suppressed");
            return None;
        }

        debug!(%node, %provider, input, output, "Message confirmed");
        Some(UsageEvent::new(provider, input, output).with_url(doc.url()))
    }

    // ------------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------------

    /// Records a visibility change.
    ///
    /// On becoming visible, pending nodes restart their stability count,
    /// confirmed nodes whose length changed while hidden are watched again,
    /// and the page is re-scanned.
    pub fn set_visible(&mut self, doc: &impl Document, visible: bool, now: Instant) {
        let was_visible = self.visible;
        self.visible = visible;
        if !visible || was_visible {
            return;
        }

        let mut rewatched = 0usize;
        for (node, tracked) in &mut self.tracked {
            if !doc.is_connected(*node) {
                continue;
            }
            let len = text_len(doc, *node);
            if tracked.is_pending() {
                tracked.last_len = len;
                tracked.stable_ticks = 0;
            } else if tracked.processed_len != Some(len) {
                tracked.rewatch(len, now);
                rewatched += 1;
            }
        }
        debug!(rewatched, "Page visible again, rechecking");
        self.safety_scan(doc, now);
    }
}

// ============================================================================
// Tests
// ============================================================================
