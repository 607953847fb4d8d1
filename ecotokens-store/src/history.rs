//! Usage history tracking.

use ecotokens_core::UsageEvent;
use serde_json::Value;
use std::collections::VecDeque;
use tracing::debug;

/// Maximum number of history entries kept.
pub const MAX_HISTORY_ENTRIES: usize = 10_000;

/// Ordered event history, oldest first, with FIFO eviction.
#[derive(Debug, Clone, Default)]
pub struct EventHistory {
    events: VecDeque<UsageEvent>,
}

impl EventHistory {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a stored history array.
    ///
    /// Entries in legacy shapes are accepted; entries that cannot be decoded
    /// at all are dropped. Anything other than an array is an empty history.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Array(items)) = value else {
            return Self::new();
        };
        let mut history = Self::new();
        for item in items {
            match UsageEvent::from_loose_value(item) {
                Some(event) => history.push(event),
                None => debug!("Skipping undecodable history entry"),
            }
        }
        history
    }

    /// Encodes the history in its canonical shape.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.events
                .iter()
                .filter_map(|e| serde_json::to_value(e).ok())
                .collect(),
        )
    }

    /// Appends an event, evicting the oldest once over the limit.
    pub fn push(&mut self, event: UsageEvent) {
        self.events.push_back(event);
        while self.events.len() > MAX_HISTORY_ENTRIES {
            self.events.pop_front();
        }
    }

    /// Number of stored events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &UsageEvent> {
        self.events.iter()
    }

    /// Returns the most recent event.
    pub fn latest(&self) -> Option<&UsageEvent> {
        self.events.back()
    }

    /// Consumes the history, oldest first.
    pub fn into_vec(self) -> Vec<UsageEvent> {
        self.events.into()
    }
}
