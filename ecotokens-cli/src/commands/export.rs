//! Export command - write the history as CSV.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::info;

use crate::Cli;
use crate::context::AppContext;
use crate::output::export_csv;

/// Arguments for the export command.
#[derive(Args)]
pub struct ExportArgs {
    /// Output file (standard output if absent).
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

/// Runs the export command.
pub async fn run(args: &ExportArgs, cli: &Cli) -> Result<()> {
    let ctx = AppContext::open(cli)?;
    let events = ctx.events.get_all().await?;
    let csv = export_csv(&events)?;

    match &args.out {
        Some(path) => {
            tokio::fs::write(path, csv.as_bytes())
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), rows = events.len(), "History exported");
            if !cli.quiet {
                eprintln!("Exported {} events to {}", events.len(), path.display());
            }
        }
        None => print!("{csv}"),
    }
    Ok(())
}
