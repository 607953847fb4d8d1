//! History command - list recent usage events.

use anyhow::Result;
use clap::Args;
use ecotokens_core::stats::recent;

use crate::context::AppContext;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the history command.
#[derive(Args)]
pub struct HistoryArgs {
    /// Number of events to show, newest first.
    #[arg(long, short = 'n', default_value = "20")]
    pub limit: usize,
}

/// Runs the history command.
pub async fn run(args: &HistoryArgs, cli: &Cli) -> Result<()> {
    let ctx = AppContext::open(cli)?;
    let events = ctx.events.get_all().await?;
    let latest = recent(&events, args.limit);

    match cli.format {
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format_events(&latest)?);
        }
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_events(&latest));
            if !cli.quiet && events.len() > latest.len() {
                println!("\n{} of {} events shown", latest.len(), events.len());
            }
        }
    }
    Ok(())
}
