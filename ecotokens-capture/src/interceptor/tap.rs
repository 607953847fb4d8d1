//! The response tap: parse, guard, post.

use bytes::Bytes;
use ecotokens_core::{ProviderKind, UsageMessage};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::parser::parse_usage;

/// Same URL, same total within this window is a duplicate.
pub const SEND_GUARD_WINDOW: Duration = Duration::from_millis(800);

/// The guard forgets everything once it would track more URLs than this.
pub const SEND_GUARD_CAPACITY: usize = 50;

/// A response as seen by an interposed request primitive.
#[derive(Debug, Clone)]
pub struct ObservedResponse {
    /// Request URL, possibly relative.
    pub url: String,
    /// Response body. Cloning is cheap.
    pub body: Bytes,
}

impl ObservedResponse {
    /// Creates an observed response.
    pub fn new(url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }
}

/// Per-URL suppression of repeated totals.
#[derive(Debug, Default)]
struct SendGuard {
    last: HashMap<String, (u64, Instant)>,
}

impl SendGuard {
    fn admit(&mut self, url: &str, total: u64, now: Instant) -> bool {
        if let Some((last_total, at)) = self.last.get(url) {
            if *last_total == total && now.saturating_duration_since(*at) <= SEND_GUARD_WINDOW {
                return false;
            }
        }
        if self.last.len() >= SEND_GUARD_CAPACITY && !self.last.contains_key(url) {
            self.last.clear();
        }
        self.last.insert(url.to_string(), (total, now));
        true
    }
}

/// Turns observed responses into usage messages.
///
/// Shared by every installed hook. Nothing here fails: unparseable bodies,
/// duplicates, and a closed channel all just drop the response.
#[derive(Debug)]
pub struct ResponseTap {
    page: Option<ProviderKind>,
    guard: Mutex<SendGuard>,
    tx: mpsc::UnboundedSender<UsageMessage>,
}

impl ResponseTap {
    /// Creates a tap for a page served by `page`, posting to `tx`.
    pub fn new(page: Option<ProviderKind>, tx: mpsc::UnboundedSender<UsageMessage>) -> Self {
        Self {
            page,
            guard: Mutex::new(SendGuard::default()),
            tx,
        }
    }

    /// Creates a tap together with the receiving end of its channel.
    pub fn channel(page: Option<ProviderKind>) -> (Self, mpsc::UnboundedReceiver<UsageMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(page, tx), rx)
    }

    /// The provider whose page this tap serves.
    pub fn page(&self) -> Option<ProviderKind> {
        self.page
    }

    /// Inspects a response. Returns true if a usage message was posted.
    pub fn observe(&self, response: &ObservedResponse) -> bool {
        let text = String::from_utf8_lossy(&response.body);
        let Some(event) = parse_usage(self.page, &text, &response.url) else {
            return false;
        };

        let admitted = self
            .guard
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .admit(&response.url, event.total_tokens, Instant::now());
        if !admitted {
            trace!(url = %response.url, total = event.total_tokens, "Repeated response suppressed");
            return false;
        }

        debug!(
            provider = %event.provider,
            total = event.total_tokens,
            "Usage captured from network"
        );
        if self.tx.send(UsageMessage::new(event)).is_err() {
            debug!("Usage channel closed");
            return false;
        }
        true
    }
}
