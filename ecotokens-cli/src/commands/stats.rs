//! Stats command - today's and all-time usage with water and CO2.

use anyhow::Result;
use ecotokens_core::UsageStats;

use crate::context::AppContext;
use crate::output::{JsonFormatter, StatsOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Computes and renders the stats for the current history and settings.
pub async fn render(ctx: &AppContext, cli: &Cli) -> Result<String> {
    let events = ctx.events.get_all().await?;
    let settings = ctx.settings.get().await?;
    let stats = UsageStats::compute(&events, &settings);

    match cli.format {
        OutputFormat::Json => {
            JsonFormatter::new(cli.pretty).format(&StatsOutput::new(&stats, &settings))
        }
        OutputFormat::Text => Ok(TextFormatter::new(!cli.no_color).format_stats(&stats, &settings)),
    }
}

/// Runs the stats command.
pub async fn run(cli: &Cli) -> Result<()> {
    let ctx = AppContext::open(cli)?;
    println!("{}", render(&ctx, cli).await?);
    Ok(())
}
