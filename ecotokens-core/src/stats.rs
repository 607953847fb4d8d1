//! Aggregated usage statistics derived from event history.
//!
//! Everything here is a pure function of a history snapshot and the
//! current settings; nothing is cached between calls.

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::impact::{WaterUsage, co2_grams, compute_water};
use crate::models::{ProviderKind, Settings, UsageEvent};

/// Daily token count below which usage counts as light.
const LIGHT_USAGE_TOKENS: u64 = 5_000;

/// Daily token count below which usage counts as moderate.
const MODERATE_USAGE_TOKENS: u64 = 15_000;

/// Token share of a single provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderShare {
    /// Provider.
    pub provider: ProviderKind,
    /// Tokens attributed to the provider.
    pub tokens: u64,
    /// Share of all tokens, 0-100.
    pub percent: f64,
}

/// Token total for one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    /// Calendar day in the reporting time zone.
    pub date: NaiveDate,
    /// Tokens on that day.
    pub tokens: u64,
    /// Number of events on that day.
    pub events: usize,
}

/// Derived statistics for display.
#[derive(Debug, Clone, Serialize)]
pub struct UsageStats {
    /// Day the "today" figures refer to.
    pub today: NaiveDate,
    /// Tokens today.
    pub today_tokens: u64,
    /// Tokens across all retained history.
    pub total_tokens: u64,
    /// Events today.
    pub today_events: usize,
    /// Events across all retained history.
    pub total_events: usize,
    /// Water attributed to today's tokens.
    pub today_water: WaterUsage,
    /// Water attributed to all tokens.
    pub total_water: WaterUsage,
    /// Grams of CO2 attributed to today's tokens.
    pub today_co2_grams: f64,
    /// Grams of CO2 attributed to all tokens.
    pub total_co2_grams: f64,
    /// All-time per-provider breakdown, largest first.
    pub by_provider: Vec<ProviderShare>,
    /// Today's per-provider breakdown, largest first.
    pub today_by_provider: Vec<ProviderShare>,
    /// Per-day totals, oldest first.
    pub daily: Vec<DailyTotal>,
    /// True if limits are enabled and today's tokens or water exceed them.
    pub limit_reached: bool,
    /// Short suggestion based on today's usage.
    pub eco_tip: &'static str,
}

impl UsageStats {
    /// Computes statistics relative to the local calendar day.
    pub fn compute(events: &[UsageEvent], settings: &Settings) -> Self {
        Self::compute_at(events, settings, &Local::now())
    }

    /// Computes statistics relative to `now`'s calendar day and time zone.
    pub fn compute_at<Tz: TimeZone>(
        events: &[UsageEvent],
        settings: &Settings,
        now: &DateTime<Tz>,
    ) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();

        let mut daily: BTreeMap<NaiveDate, DailyTotal> = BTreeMap::new();
        let mut all_by_provider: HashMap<ProviderKind, u64> = HashMap::new();
        let mut today_by_provider: HashMap<ProviderKind, u64> = HashMap::new();
        let mut total_tokens = 0u64;
        let mut today_tokens = 0u64;
        let mut today_events = 0usize;

        for event in events {
            let date = event.timestamp_utc().with_timezone(&tz).date_naive();
            let tokens = event.total_tokens;

            total_tokens = total_tokens.saturating_add(tokens);
            *all_by_provider.entry(event.provider).or_default() += tokens;

            let day = daily.entry(date).or_insert(DailyTotal {
                date,
                tokens: 0,
                events: 0,
            });
            day.tokens = day.tokens.saturating_add(tokens);
            day.events += 1;

            if date == today {
                today_tokens = today_tokens.saturating_add(tokens);
                today_events += 1;
                *today_by_provider.entry(event.provider).or_default() += tokens;
            }
        }

        let today_water = compute_water(today_tokens, settings.water_intensity);
        let total_water = compute_water(total_tokens, settings.water_intensity);
        let limit_reached = settings.limits_enabled
            && (today_tokens >= settings.token_limit || today_water.oz >= settings.oz_limit);

        Self {
            today,
            today_tokens,
            total_tokens,
            today_events,
            total_events: events.len(),
            today_water,
            total_water,
            today_co2_grams: co2_grams(today_tokens),
            total_co2_grams: co2_grams(total_tokens),
            by_provider: shares(all_by_provider),
            today_by_provider: shares(today_by_provider),
            daily: daily.into_values().collect(),
            limit_reached,
            eco_tip: eco_tip(today_tokens),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn shares(totals: HashMap<ProviderKind, u64>) -> Vec<ProviderShare> {
    let sum: u64 = totals.values().sum();
    let mut out: Vec<ProviderShare> = totals
        .into_iter()
        .map(|(provider, tokens)| ProviderShare {
            provider,
            tokens,
            percent: if sum > 0 {
                tokens as f64 / sum as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect();
    out.sort_by(|a, b| b.tokens.cmp(&a.tokens).then(a.provider.cmp(&b.provider)));
    out
}

/// Returns a short suggestion for the given daily token count.
pub fn eco_tip(today_tokens: u64) -> &'static str {
    if today_tokens < LIGHT_USAGE_TOKENS {
        "You're in the green! Keep up the efficient prompting."
    } else if today_tokens < MODERATE_USAGE_TOKENS {
        "Consider summarizing your prompts to save tokens and water."
    } else {
        "Try smaller models or reduce context window to minimize footprint."
    }
}

/// Returns up to `limit` events, newest first.
pub fn recent(events: &[UsageEvent], limit: usize) -> Vec<&UsageEvent> {
    let mut sorted: Vec<&UsageEvent> = events.iter().collect();
    sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    sorted.truncate(limit);
    sorted
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impact::WaterIntensity;
    use chrono::{Duration, Utc};

    fn event(provider: ProviderKind, total: u64, at: DateTime<Utc>) -> UsageEvent {
        UsageEvent::new(provider, 0, total).at(at.timestamp_millis())
    }

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_history() {
        let stats = UsageStats::compute_at(&[], &Settings::default(), &noon());
        assert_eq!(stats.total_tokens, 0);
        assert_eq!(stats.today_tokens, 0);
        assert!(stats.by_provider.is_empty());
        assert!(stats.daily.is_empty());
        assert!(!stats.limit_reached);
    }

    #[test]
    fn test_today_and_all_time() {
        let now = noon();
        let events = vec![
            event(ProviderKind::ChatGpt, 1200, now - Duration::minutes(5)),
            event(ProviderKind::Claude, 1200, now - Duration::hours(1)),
            event(ProviderKind::ChatGpt, 8500, now - Duration::days(1)),
        ];
        let stats = UsageStats::compute_at(&events, &Settings::default(), &now);

        assert_eq!(stats.today_tokens, 2400);
        assert_eq!(stats.total_tokens, 10_900);
        assert_eq!(stats.today_events, 2);
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.daily.len(), 2);
        assert_eq!(stats.daily[1].date, now.date_naive());
        assert_eq!(stats.by_provider[0].provider, ProviderKind::ChatGpt);
        assert_eq!(stats.by_provider[0].tokens, 9700);
        assert_eq!(stats.today_by_provider.len(), 2);
    }

    #[test]
    fn test_percent_shares_sum_to_hundred() {
        let now = noon();
        let events = vec![
            event(ProviderKind::ChatGpt, 300, now),
            event(ProviderKind::Gemini, 100, now),
        ];
        let stats = UsageStats::compute_at(&events, &Settings::default(), &now);
        let sum: f64 = stats.by_provider.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert!((stats.by_provider[0].percent - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_limit_reached_by_tokens() {
        let now = noon();
        let events = vec![event(ProviderKind::Claude, 600, now)];
        let settings = Settings {
            limits_enabled: true,
            token_limit: 500,
            ..Settings::default()
        };
        assert!(UsageStats::compute_at(&events, &settings, &now).limit_reached);

        let disabled = Settings {
            limits_enabled: false,
            ..settings
        };
        assert!(!UsageStats::compute_at(&events, &disabled, &now).limit_reached);
    }

    #[test]
    fn test_limit_reached_by_water() {
        let now = noon();
        // 1M tokens at high = 6000 mL = ~203 oz
        let events = vec![event(ProviderKind::Gemini, 1_000_000, now)];
        let settings = Settings {
            limits_enabled: true,
            token_limit: u64::MAX,
            oz_limit: 16.9,
            water_intensity: WaterIntensity::High,
            ..Settings::default()
        };
        assert!(UsageStats::compute_at(&events, &settings, &now).limit_reached);
    }

    #[test]
    fn test_eco_tip_bands() {
        assert!(eco_tip(0).contains("green"));
        assert!(eco_tip(5_000).contains("summarizing"));
        assert!(eco_tip(15_000).contains("smaller models"));
    }

    #[test]
    fn test_recent_newest_first() {
        let now = noon();
        let events = vec![
            event(ProviderKind::ChatGpt, 1, now - Duration::hours(2)),
            event(ProviderKind::Claude, 2, now),
            event(ProviderKind::Gemini, 3, now - Duration::hours(1)),
        ];
        let recent = recent(&events, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].total_tokens, 2);
        assert_eq!(recent[1].total_tokens, 3);
    }
}
