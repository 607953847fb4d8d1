//! Integration tests for the history-to-stats path.

use chrono::{TimeZone, Utc};
use ecotokens_core::{ProviderKind, Settings, UsageEvent, UsageStats, estimate_tokens};
use serde_json::json;

#[test]
fn test_legacy_history_feeds_stats() {
    let now = Utc.with_ymd_and_hms(2026, 3, 14, 18, 30, 0).unwrap();
    let today = now.timestamp_millis();

    let stored = vec![
        json!({
            "provider": "chatgpt",
            "inputTokens": 10,
            "outputTokens": 20,
            "totalTokens": 30,
            "timestamp": today
        }),
        json!({
            "payload": {
                "tool": "Claude",
                "prompt_tokens": 100,
                "completion_tokens": 50,
                "ts": today
            }
        }),
        json!("garbage"),
    ];
    let events: Vec<UsageEvent> = stored.iter().filter_map(UsageEvent::from_loose_value).collect();
    assert_eq!(events.len(), 2);

    let stats = UsageStats::compute_at(&events, &Settings::default(), &now);
    assert_eq!(stats.today_tokens, 180);
    assert_eq!(stats.by_provider[0].provider, ProviderKind::Claude);
    assert!(stats.today_water.ml > 0.0);
}

#[test]
fn test_estimated_event_from_text() {
    let prompt = "What is the boiling point of water at altitude?";
    let reply = "It drops by roughly one degree Celsius per 300 metres.";
    let event = UsageEvent::new(
        ProviderKind::Gemini,
        estimate_tokens(prompt),
        estimate_tokens(reply),
    );
    assert_eq!(event.input_tokens, 12);
    assert_eq!(event.output_tokens, 14);
    assert_eq!(event.total_tokens, 26);
}
