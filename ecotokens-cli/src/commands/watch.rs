//! Watch command - re-render stats whenever the data changes.

use anyhow::Result;
use clap::Args;
use std::io::{Write, stdout};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{debug, info};

use crate::context::AppContext;
use crate::{Cli, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// How often to check the data file for changes from other processes, in milliseconds.
    #[arg(long, short, default_value = "1000")]
    pub interval: u64,

    /// Minimum interval to use.
    #[arg(long, default_value = "100")]
    pub min_interval: u64,
}

/// Runs the watch command.
pub async fn run(args: &WatchArgs, cli: &Cli) -> Result<()> {
    let period = Duration::from_millis(args.interval.max(args.min_interval));
    info!(?period, "Starting watch mode");

    let ctx = AppContext::open(cli)?;
    let mut changes = ctx.events.subscribe();
    let poller = Arc::clone(&ctx.kv).watch_external(period);

    loop {
        let rendered = super::stats::render(&ctx, cli).await?;
        if cli.format == OutputFormat::Text {
            // Clear screen
            print!("\x1b[2J\x1b[H");
            println!("{rendered}");
            println!();
            println!("Watching {} (Ctrl+C to exit)", ctx.kv.path().display());
        } else {
            println!("{rendered}");
        }
        stdout().flush()?;

        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                debug!("Store changed, re-rendering");
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    poller.abort();
    Ok(())
}
