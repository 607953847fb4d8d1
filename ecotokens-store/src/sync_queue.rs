//! Records waiting to be added to the remote aggregate.

use ecotokens_core::{ESTIMATED_MODEL, UsageEvent};
use ecotokens_fetch::AggregateIncrement;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;

/// Maximum number of queued records.
pub const MAX_PENDING_SYNC: usize = 500;

/// A usage event normalized for sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRecord {
    /// Lowercase provider label.
    pub provider: String,
    /// Model label.
    #[serde(default)]
    pub model: String,
    /// Prompt tokens.
    #[serde(default)]
    pub input_tokens: u64,
    /// Completion tokens.
    #[serde(default)]
    pub output_tokens: u64,
    /// Tokens credited to the aggregate.
    #[serde(default)]
    pub total_tokens: u64,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: i64,
}

impl From<&UsageEvent> for SyncRecord {
    fn from(event: &UsageEvent) -> Self {
        let model = if event.model.is_empty() {
            ESTIMATED_MODEL.to_string()
        } else {
            event.model.clone()
        };
        let total = if event.total_tokens > 0 {
            event.total_tokens
        } else {
            event.input_tokens.saturating_add(event.output_tokens)
        };
        Self {
            provider: event.provider.cli_name().to_string(),
            model,
            input_tokens: event.input_tokens,
            output_tokens: event.output_tokens,
            total_tokens: total,
            timestamp: event.timestamp,
        }
    }
}

/// FIFO queue of [`SyncRecord`]s, bounded to [`MAX_PENDING_SYNC`].
#[derive(Debug, Clone, Default)]
pub struct PendingSyncQueue {
    records: VecDeque<SyncRecord>,
}

impl PendingSyncQueue {
    /// Decodes the stored queue. Undecodable entries are dropped.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Array(items)) = value else {
            return Self::default();
        };
        let mut queue = Self::default();
        for item in items {
            if let Ok(record) = serde_json::from_value::<SyncRecord>(item.clone()) {
                queue.push(record);
            }
        }
        queue
    }

    /// Encodes the queue.
    pub fn to_value(&self) -> Value {
        Value::Array(
            self.records
                .iter()
                .filter_map(|r| serde_json::to_value(r).ok())
                .collect(),
        )
    }

    /// Appends a record. Returns how many old records were evicted.
    pub fn push(&mut self, record: SyncRecord) -> usize {
        self.records.push_back(record);
        let mut evicted = 0;
        while self.records.len() > MAX_PENDING_SYNC {
            self.records.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Sums the queue into one increment, grouped by provider.
    pub fn batch(&self) -> AggregateIncrement {
        let mut increment = AggregateIncrement::default();
        for record in &self.records {
            increment.add(&record.provider, record.total_tokens);
        }
        increment
    }

    /// Removes up to `count` records from the front.
    pub fn remove_front(&mut self, count: usize) {
        let count = count.min(self.records.len());
        self.records.drain(..count);
    }

    /// Number of queued records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the queued records, oldest first.
    pub fn to_vec(&self) -> Vec<SyncRecord> {
        self.records.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecotokens_core::ProviderKind;
    use serde_json::json;

    fn record(provider: &str, total: u64) -> SyncRecord {
        SyncRecord {
            provider: provider.to_string(),
            model: ESTIMATED_MODEL.to_string(),
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: total,
            timestamp: 0,
        }
    }

    #[test]
    fn test_record_normalization() {
        let event = UsageEvent::new(ProviderKind::ChatGpt, 10, 20).with_model("");
        let r = SyncRecord::from(&event);
        assert_eq!(r.provider, "chatgpt");
        assert_eq!(r.model, ESTIMATED_MODEL);
        assert_eq!(r.total_tokens, 30);

        let reported = UsageEvent::new(ProviderKind::Gemini, 5, 7).with_reported_total(Some(15));
        assert_eq!(SyncRecord::from(&reported).total_tokens, 15);
    }

    #[test]
    fn test_cap_and_batch() {
        let mut queue = PendingSyncQueue::default();
        for i in 0..MAX_PENDING_SYNC {
            assert_eq!(queue.push(record(if i % 2 == 0 { "claude" } else { "gemini" }, 2)), 0);
        }
        assert_eq!(queue.push(record("chatgpt", 10)), 1);
        assert_eq!(queue.len(), MAX_PENDING_SYNC);

        let increment = queue.batch();
        assert_eq!(increment.total_tokens, 2 * 499 + 10);
        assert_eq!(increment.total_by_provider["chatgpt"], 10);
        assert_eq!(increment.total_by_provider["claude"], 2 * 249);
        assert_eq!(increment.total_by_provider["gemini"], 2 * 250);

        queue.remove_front(MAX_PENDING_SYNC - 1);
        assert_eq!(queue.to_vec(), vec![record("chatgpt", 10)]);
        queue.remove_front(10);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_decode_skips_bad_entries() {
        let stored = json!([
            { "provider": "claude", "model": "x", "totalTokens": 5, "timestamp": 1 },
            { "no": "provider" },
        ]);
        let queue = PendingSyncQueue::from_value(Some(&stored));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.to_value()[0]["totalTokens"], 5);
    }
}
