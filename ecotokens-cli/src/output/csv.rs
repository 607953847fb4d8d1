//! CSV export of the usage history.

use anyhow::Result;
use chrono::SecondsFormat;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use ecotokens_core::UsageEvent;

/// Columns of the export.
pub const CSV_COLUMNS: [&str; 6] = [
    "ts_iso",
    "tool",
    "tokens_total",
    "prompt_tokens",
    "completion_tokens",
    "raw_json",
];

/// Renders `events` as CSV, one row per event in the given order.
///
/// Zero prompt or completion counts are left blank. The last column holds
/// the event's stored JSON.
pub fn export_csv(events: &[UsageEvent]) -> Result<String> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::with_capacity(64 + events.len() * 160));

    writer.write_record(CSV_COLUMNS)?;
    for event in events {
        writer.write_record(row(event)?)?;
    }

    let bytes = writer.into_inner().map_err(csv::IntoInnerError::into_error)?;
    Ok(String::from_utf8(bytes)?)
}

fn row(event: &UsageEvent) -> Result<[String; 6]> {
    Ok([
        event
            .timestamp_utc()
            .to_rfc3339_opts(SecondsFormat::Millis, true),
        event.provider.cli_name().to_string(),
        event.total_tokens.to_string(),
        blank_if_zero(event.input_tokens),
        blank_if_zero(event.output_tokens),
        serde_json::to_string(event)?,
    ])
}

fn blank_if_zero(n: u64) -> String {
    if n == 0 { String::new() } else { n.to_string() }
}
