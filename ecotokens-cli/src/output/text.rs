//! Text output formatting with progress bars and colors.

use ecotokens_core::impact::{
    GRAMS_CO2_PER_MILE_DRIVING, MILES_TIERS, WATER_TIERS, best_equivalence, co2_equivalence,
    format_co2, format_number,
};
use ecotokens_core::{Settings, UsageEvent, UsageStats, WaterUsage};
use ecotokens_fetch::{AggregateTotals, Identity};
use ecotokens_store::{DrainOutcome, SyncRecord};

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";

// Progress bar characters
const BAR_FULL: char = '█';
const BAR_EMPTY: char = '░';

/// Share of a limit at which the bar turns yellow.
const WARN_PERCENT: f64 = 80.0;

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    bar_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            bar_width: 10,
        }
    }

    /// Formats the usage summary.
    pub fn format_stats(&self, stats: &UsageStats, settings: &Settings) -> String {
        let mut lines = Vec::new();

        lines.push(format!(
            "{} {}",
            self.bold("EcoTokens Usage"),
            self.dim(&stats.today.format("%a %b %-d").to_string())
        ));
        lines.push("─".repeat(40));

        lines.push(format!(
            "Today:    {} tokens {}",
            self.bold(&format_number(as_f64(stats.today_tokens))),
            self.dim(&plural(stats.today_events, "message"))
        ));
        lines.push(format!(
            "All time: {} tokens {}",
            format_number(as_f64(stats.total_tokens)),
            self.dim(&plural(stats.total_events, "message"))
        ));

        lines.push(String::new());
        lines.push(format!(
            "Water ({}):",
            self.cyan(settings.water_intensity.as_str())
        ));
        lines.push(format!("  Today    {}", self.format_water(&stats.today_water)));
        lines.push(format!("  All time {}", self.format_water(&stats.total_water)));

        lines.push(String::new());
        lines.push("CO2:".to_string());
        lines.push(format!("  Today    {}", self.format_co2_line(stats.today_co2_grams)));
        lines.push(format!("  All time {}", self.format_co2_line(stats.total_co2_grams)));

        if !stats.by_provider.is_empty() {
            lines.push(String::new());
            lines.push("By provider:".to_string());
            for share in &stats.by_provider {
                lines.push(format!(
                    "  {:<8} {} {:>5.1}%  {}",
                    share.provider.display_name(),
                    self.share_bar(share.percent),
                    share.percent,
                    self.dim(&format_number(as_f64(share.tokens)))
                ));
            }
        }

        if settings.limits_enabled {
            lines.push(String::new());
            lines.push(self.format_limits(stats, settings));
        }

        if settings.eco_mode {
            lines.push(String::new());
            lines.push(format!("{} {}", self.green("Tip:"), stats.eco_tip));
        }

        lines.join("\n")
    }

    fn format_water(&self, water: &WaterUsage) -> String {
        let mut line = format!("{:.1} ml ({:.2} oz)", water.ml, water.oz);
        let litres = water.ml / 1000.0;
        if let Some(eq) = best_equivalence(litres, WATER_TIERS).filter(|e| e.count > 0.0) {
            line.push_str(&format!(" {}", self.dim(&format!("≈ {}", eq.label()))));
        }
        line
    }

    fn format_co2_line(&self, grams: f64) -> String {
        let mut line = format_co2(grams);
        let eq = co2_equivalence(grams);
        if eq != "-" {
            line.push_str(&format!(" {}", self.dim(&eq)));
        }
        if let Some(distance) = best_equivalence(grams / GRAMS_CO2_PER_MILE_DRIVING, MILES_TIERS)
            .filter(|e| e.count >= 1.0)
        {
            line.push_str(&format!(" {}", self.dim(&format!("≈ {}", distance.label()))));
        }
        line
    }

    fn format_limits(&self, stats: &UsageStats, settings: &Settings) -> String {
        let token_pct = percent_of(as_f64(stats.today_tokens), as_f64(settings.token_limit));
        let oz_pct = percent_of(stats.today_water.oz, settings.oz_limit);

        let mut lines = vec![
            format!(
                "Tokens   {} {}",
                self.limit_bar(token_pct),
                self.color_for_usage(
                    token_pct,
                    &format!(
                        "{} / {}",
                        format_number(as_f64(stats.today_tokens)),
                        format_number(as_f64(settings.token_limit))
                    )
                )
            ),
            format!(
                "Water    {} {}",
                self.limit_bar(oz_pct),
                self.color_for_usage(
                    oz_pct,
                    &format!("{:.2} / {:.1} oz", stats.today_water.oz, settings.oz_limit)
                )
            ),
        ];

        if stats.limit_reached {
            let note = if settings.hard_block {
                "Daily limit reached. Time for a break from AI chat."
            } else {
                "Daily limit reached."
            };
            lines.push(self.red(note));
        }

        lines.join("\n")
    }

    /// Formats events as a table, in the order given.
    pub fn format_events(&self, events: &[&UsageEvent]) -> String {
        if events.is_empty() {
            return self.dim("No usage recorded yet.");
        }

        let mut lines = vec![format!(
            "{:<16}  {:<8}  {:<20}  {:>7}  {:>7}  {:>8}",
            self.bold("Time"),
            self.bold("Provider"),
            self.bold("Model"),
            self.bold("In"),
            self.bold("Out"),
            self.bold("Total")
        )];
        for event in events {
            lines.push(self.format_event_line(event));
        }
        lines.join("\n")
    }

    fn format_event_line(&self, event: &UsageEvent) -> String {
        let local = event.timestamp_utc().with_timezone(&chrono::Local);
        format!(
            "{:<16}  {:<8}  {:<20}  {:>7}  {:>7}  {:>8}",
            local.format("%Y-%m-%d %H:%M").to_string(),
            event.provider.cli_name(),
            truncate(&event.model, 20),
            event.input_tokens,
            event.output_tokens,
            event.total_tokens
        )
    }

    /// Confirms a recorded event.
    pub fn format_recorded(&self, event: &UsageEvent) -> String {
        format!(
            "{} {} tokens on {} ({} in, {} out, {})",
            self.green("✓"),
            format_number(as_f64(event.total_tokens)),
            self.bold(event.provider.display_name()),
            event.input_tokens,
            event.output_tokens,
            event.model
        )
    }

    /// Formats settings, one key per line.
    pub fn format_settings(&self, settings: &Settings) -> String {
        let value = serde_json::to_value(settings).unwrap_or_default();
        let mut lines = vec![self.bold("EcoTokens Settings"), "─".repeat(40)];
        for key in Settings::KEYS {
            let shown = match value.get(*key) {
                Some(serde_json::Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => "-".to_string(),
            };
            lines.push(format!("{key:<16} {}", self.cyan(&shown)));
        }
        lines.join("\n")
    }

    /// Describes a sync attempt.
    pub fn format_sync(&self, outcome: &DrainOutcome, remaining: usize) -> String {
        match outcome {
            DrainOutcome::NotSignedIn => format!(
                "{} Not signed in; {} waiting. Run `ecotokens login` to sync.",
                self.yellow("!"),
                plural(remaining, "record")
            ),
            DrainOutcome::NothingPending => format!("{} Nothing to sync.", self.green("✓")),
            DrainOutcome::InFlight => format!(
                "{} Another sync is already running; {} waiting.",
                self.yellow("!"),
                plural(remaining, "record")
            ),
            DrainOutcome::Synced { records, tokens } => {
                let mut line = format!(
                    "{} Synced {} ({} tokens).",
                    self.green("✓"),
                    plural(*records, "record"),
                    format_number(as_f64(*tokens))
                );
                if remaining > 0 {
                    line.push_str(&format!(
                        " {}",
                        self.dim(&format!("{} queued meanwhile.", plural(remaining, "record")))
                    ));
                }
                line
            }
        }
    }

    /// Describes the signed-in account.
    pub fn format_account(
        &self,
        identity: Option<&Identity>,
        bound_uid: Option<&str>,
        pending: &[SyncRecord],
        remote: Option<&AggregateTotals>,
    ) -> String {
        let mut lines = Vec::new();
        match (identity, bound_uid) {
            (Some(identity), _) => {
                lines.push(format!("Signed in as {}", self.cyan(&identity.email)));
                lines.push(format!("User id:     {}", identity.uid));
            }
            (None, Some(uid)) => lines.push(format!("Syncing as   {}", self.cyan(uid))),
            (None, None) => lines.push(self.dim("Not signed in.")),
        }

        let pending_tokens: u64 = pending.iter().map(|r| r.total_tokens).sum();
        lines.push(format!(
            "Pending:     {} ({} tokens)",
            plural(pending.len(), "record"),
            format_number(as_f64(pending_tokens))
        ));

        if let Some(totals) = remote {
            lines.push(format!(
                "Remote:      {} tokens",
                self.blue(&format_number(as_f64(totals.total_tokens)))
            ));
            for (provider, tokens) in &totals.total_by_provider {
                lines.push(format!("  {provider:<10} {}", format_number(as_f64(*tokens))));
            }
        }

        lines.join("\n")
    }

    /// Formats a progress bar filled to `percent`.
    pub fn progress_bar(&self, percent: f64) -> String {
        let percent = percent.clamp(0.0, 100.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let filled = ((percent / 100.0) * as_f64(self.bar_width as u64)).round() as usize;
        let empty = self.bar_width.saturating_sub(filled);

        format!(
            "{}{}",
            BAR_FULL.to_string().repeat(filled),
            BAR_EMPTY.to_string().repeat(empty)
        )
    }

    fn share_bar(&self, percent: f64) -> String {
        let bar = self.progress_bar(percent);
        self.blue(&bar)
    }

    fn limit_bar(&self, percent: f64) -> String {
        let bar = self.progress_bar(percent);
        self.color_for_usage(percent, &bar)
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn color_for_usage(&self, percent: f64, text: &str) -> String {
        if !self.use_colors {
            return text.to_string();
        }

        if percent >= 100.0 {
            self.red(text)
        } else if percent >= WARN_PERCENT {
            self.yellow(text)
        } else {
            self.green(text)
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn blue(&self, text: &str) -> String {
        self.paint(BLUE, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

#[allow(clippy::cast_precision_loss)]
fn as_f64(n: u64) -> f64 {
    n as f64
}

fn percent_of(value: f64, limit: f64) -> f64 {
    if limit > 0.0 {
        value / limit * 100.0
    } else if value > 0.0 {
        100.0
    } else {
        0.0
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{} {noun}s", format_number(as_f64(n as u64)))
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

// ============================================================================
// Tests
// ============================================================================
