//! JSON output formatting.

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use ecotokens_core::impact::{
    MILES_TIERS, WATER_TIERS, best_equivalence, co2_equivalence, format_co2,
};
use ecotokens_core::{ProviderShare, Settings, UsageEvent, UsageStats, WaterUsage};
use ecotokens_fetch::{AggregateTotals, Identity};
use ecotokens_store::{DrainOutcome, SyncRecord};
use serde::{Serialize, Serializer};

/// Grams of CO2 per mile used to express CO2 as distance.
const GRAMS_PER_MILE: f64 = ecotokens_core::impact::GRAMS_CO2_PER_MILE_DRIVING;

// ============================================================================
// Output Types
// ============================================================================

/// JSON output for a usage event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventOutput {
    pub provider: String,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    #[serde(serialize_with = "serialize_datetime")]
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
}

impl From<&UsageEvent> for EventOutput {
    fn from(event: &UsageEvent) -> Self {
        Self {
            provider: event.provider.cli_name().to_string(),
            model: event.model.clone(),
            input_tokens: event.input_tokens,
            output_tokens: event.output_tokens,
            total_tokens: event.total_tokens,
            timestamp: event.timestamp_utc(),
            url: event.url.clone(),
        }
    }
}

/// Water figures with a readable equivalence.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaterOutput {
    pub ml: f64,
    pub oz: f64,
    pub bottles: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equivalent: Option<String>,
}

impl From<&WaterUsage> for WaterOutput {
    fn from(water: &WaterUsage) -> Self {
        Self {
            ml: water.ml,
            oz: water.oz,
            bottles: water.bottles,
            equivalent: best_equivalence(water.ml / 1000.0, WATER_TIERS).map(|e| e.label()),
        }
    }
}

/// CO2 figures with readable equivalences.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Co2Output {
    pub grams: f64,
    pub formatted: String,
    pub equivalent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
}

impl Co2Output {
    fn new(grams: f64) -> Self {
        Self {
            grams,
            formatted: format_co2(grams),
            equivalent: co2_equivalence(grams),
            distance: best_equivalence(grams / GRAMS_PER_MILE, MILES_TIERS).map(|e| e.label()),
        }
    }
}

/// A provider's share of tokens.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareOutput {
    pub provider: String,
    pub tokens: u64,
    pub percent: f64,
}

/// Tokens on one calendar day.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayOutput {
    pub date: String,
    pub tokens: u64,
    pub events: usize,
}

/// Daily limit status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOutput {
    pub enabled: bool,
    pub token_limit: u64,
    pub oz_limit: f64,
    pub reached: bool,
    pub hard_block: bool,
}

/// JSON output for the `stats` command.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsOutput {
    pub today: String,
    pub today_tokens: u64,
    pub total_tokens: u64,
    pub today_events: usize,
    pub total_events: usize,
    pub today_water: WaterOutput,
    pub total_water: WaterOutput,
    pub today_co2: Co2Output,
    pub total_co2: Co2Output,
    pub by_provider: Vec<ShareOutput>,
    pub today_by_provider: Vec<ShareOutput>,
    pub daily: Vec<DayOutput>,
    pub limits: LimitOutput,
    pub water_intensity: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eco_tip: Option<String>,
}

impl StatsOutput {
    /// Builds the output from computed stats and the settings they used.
    pub fn new(stats: &UsageStats, settings: &Settings) -> Self {
        let shares = |list: &[ProviderShare]| -> Vec<ShareOutput> {
            list.iter()
                .map(|s| ShareOutput {
                    provider: s.provider.cli_name().to_string(),
                    tokens: s.tokens,
                    percent: s.percent,
                })
                .collect()
        };

        Self {
            today: stats.today.format("%Y-%m-%d").to_string(),
            today_tokens: stats.today_tokens,
            total_tokens: stats.total_tokens,
            today_events: stats.today_events,
            total_events: stats.total_events,
            today_water: WaterOutput::from(&stats.today_water),
            total_water: WaterOutput::from(&stats.total_water),
            today_co2: Co2Output::new(stats.today_co2_grams),
            total_co2: Co2Output::new(stats.total_co2_grams),
            by_provider: shares(&stats.by_provider),
            today_by_provider: shares(&stats.today_by_provider),
            daily: stats
                .daily
                .iter()
                .map(|d| DayOutput {
                    date: d.date.format("%Y-%m-%d").to_string(),
                    tokens: d.tokens,
                    events: d.events,
                })
                .collect(),
            limits: LimitOutput {
                enabled: settings.limits_enabled,
                token_limit: settings.token_limit,
                oz_limit: settings.oz_limit,
                reached: stats.limit_reached,
                hard_block: settings.hard_block,
            },
            water_intensity: settings.water_intensity.to_string(),
            eco_tip: settings.eco_mode.then(|| stats.eco_tip.to_string()),
        }
    }
}

/// JSON output for commands that record an event.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordOutput {
    pub recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// JSON output for `sync`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutput {
    pub status: &'static str,
    pub records: usize,
    pub tokens: u64,
    pub remaining: usize,
}

impl SyncOutput {
    /// Describes a drain outcome and how much is still queued.
    pub fn new(outcome: &DrainOutcome, remaining: usize) -> Self {
        let (status, records, tokens) = match outcome {
            DrainOutcome::NotSignedIn => ("notSignedIn", 0, 0),
            DrainOutcome::NothingPending => ("nothingPending", 0, 0),
            DrainOutcome::InFlight => ("inFlight", 0, 0),
            DrainOutcome::Synced { records, tokens } => ("synced", *records, *tokens),
        };
        Self {
            status,
            records,
            tokens,
            remaining,
        }
    }
}

/// JSON output for `whoami`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountOutput {
    pub signed_in: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub pending_records: usize,
    pub pending_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<AggregateTotals>,
}

impl AccountOutput {
    /// Describes the session, the queue, and the remote totals if known.
    pub fn new(
        identity: Option<&Identity>,
        bound_uid: Option<String>,
        pending: &[SyncRecord],
        remote: Option<AggregateTotals>,
    ) -> Self {
        Self {
            signed_in: bound_uid.is_some(),
            uid: bound_uid,
            email: identity.map(|i| i.email.clone()),
            pending_records: pending.len(),
            pending_tokens: pending.iter().map(|r| r.total_tokens).sum(),
            remote,
        }
    }
}

// ============================================================================
// Serializers
// ============================================================================

fn serialize_datetime<S>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

// ============================================================================
// JSON Formatter
// ============================================================================

/// JSON formatter.
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    /// Creates a new JSON formatter.
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    /// Formats any serializable data.
    pub fn format<T: Serialize>(&self, data: &T) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(data)?)
        } else {
            Ok(serde_json::to_string(data)?)
        }
    }

    /// Formats events, newest first as given.
    pub fn format_events(&self, events: &[&UsageEvent]) -> Result<String> {
        let outputs: Vec<EventOutput> = events.iter().map(|e| EventOutput::from(*e)).collect();
        self.format(&outputs)
    }
}

// ============================================================================
// Tests
// ============================================================================
