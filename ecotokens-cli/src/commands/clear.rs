//! Clear command - delete the local history.

use anyhow::{Result, bail};
use clap::Args;
use ecotokens_store::ClearScope;
use tracing::info;

use crate::Cli;
use crate::context::AppContext;

/// Arguments for the clear command.
#[derive(Args)]
pub struct ClearArgs {
    /// Confirm deletion.
    #[arg(long, short)]
    pub yes: bool,

    /// Also drop usage that has not been synced yet.
    #[arg(long)]
    pub include_queue: bool,
}

impl ClearArgs {
    /// Returns what to clear, refusing without confirmation.
    pub fn scope(&self) -> Result<ClearScope> {
        if !self.yes {
            bail!("Refusing to clear history without --yes");
        }
        Ok(if self.include_queue {
            ClearScope::HistoryAndQueue
        } else {
            ClearScope::HistoryOnly
        })
    }
}

/// Runs the clear command.
pub async fn run(args: &ClearArgs, cli: &Cli) -> Result<()> {
    let scope = args.scope()?;
    let ctx = AppContext::open(cli)?;
    ctx.events.clear(scope).await?;
    info!(?scope, "History cleared");
    if !cli.quiet {
        println!("History cleared.");
    }
    Ok(())
}
