// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! `EcoTokens` CLI - AI chat token usage and environmental impact from the
//! command line.
//!
//! # Examples
//!
//! ```bash
//! # Today's usage, water, and CO2
//! ecotokens
//!
//! # Record usage from a captured response body
//! ecotokens ingest --provider chatgpt --url https://chatgpt.com/backend-api/conversation body.txt
//!
//! # Record an estimate from message texts
//! ecotokens estimate --provider claude --input prompt.txt --output reply.txt
//!
//! # Recent events as JSON
//! ecotokens history --limit 20 --format json --pretty
//!
//! # Export everything as CSV
//! ecotokens export --out usage.csv
//!
//! # Sign in and push pending totals
//! ecotokens login --email ada@example.org
//! ecotokens sync
//! ```

mod commands;
mod context;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ecotokens_fetch::FetchError;
use ecotokens_store::StoreError;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{auth, clear, estimate, export, history, ingest, settings, stats, sync, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// `EcoTokens` CLI - token usage and environmental impact tracking.
#[derive(Parser)]
#[command(name = "ecotokens")]
#[command(about = "Token usage and environmental impact tracking for AI chat")]
#[command(long_about = r"
EcoTokens tracks how many tokens your AI chat conversations consume and
estimates the water and CO2 behind them.

Supported chat sites:
  • ChatGPT (chatgpt)
  • Claude (claude)
  • Gemini / AI Studio (gemini)

Examples:
  ecotokens                        # Usage summary
  ecotokens history --limit 10     # Recent events
  ecotokens export --out usage.csv # CSV export
  ecotokens settings set tokenLimit 20000
")]
#[command(version)]
#[command(author = "EcoTokens Contributors")]
pub struct Cli {
    /// Subcommand to run. If none, runs 'stats' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,

    /// Data file holding history, settings, and session.
    #[arg(long, global = true, env = "ECOTOKENS_DATA")]
    pub data: Option<PathBuf>,

    /// Base URL of the account and aggregate service.
    #[arg(long, global = true, env = "ECOTOKENS_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Bearer token for the remote service, overriding the saved session.
    #[arg(long, global = true, env = "ECOTOKENS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show today's and all-time usage with water and CO2 (default).
    #[command(visible_alias = "s")]
    Stats,

    /// Record usage parsed from a captured response body.
    #[command(visible_alias = "i")]
    Ingest(ingest::IngestArgs),

    /// Record an estimate computed from message texts.
    #[command(visible_alias = "e")]
    Estimate(estimate::EstimateArgs),

    /// List recent usage events.
    #[command(visible_alias = "h")]
    History(history::HistoryArgs),

    /// Export the history as CSV.
    Export(export::ExportArgs),

    /// Delete the local history.
    Clear(clear::ClearArgs),

    /// Show or change preferences.
    Settings(settings::SettingsArgs),

    /// Sign in to an existing account.
    Login(auth::CredentialsArgs),

    /// Create an account and sign in.
    Signup(auth::CredentialsArgs),

    /// Sign out and stop syncing.
    Logout,

    /// Show the signed-in account.
    Whoami,

    /// Push pending usage to the remote aggregate.
    Sync(sync::SyncArgs),

    /// Re-render stats whenever the data file changes.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// The command needs a signed-in account.
    NotSignedIn = 2,
    /// The remote service could not be reached; retrying may help.
    RemoteUnavailable = 3,
    /// The data file could not be decoded.
    Corrupt = 4,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    fn for_error(err: &anyhow::Error) -> Self {
        if let Some(store) = err.downcast_ref::<StoreError>() {
            return match store {
                StoreError::Corrupt(_) | StoreError::Serialization(_) => Self::Corrupt,
                StoreError::Remote(FetchError::NotSignedIn) => Self::NotSignedIn,
                e if e.is_transient() => Self::RemoteUnavailable,
                _ => Self::Error,
            };
        }
        if let Some(fetch) = err.downcast_ref::<FetchError>() {
            return match fetch {
                FetchError::NotSignedIn => Self::NotSignedIn,
                e if e.is_transient() => Self::RemoteUnavailable,
                _ => Self::Error,
            };
        }
        Self::Error
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("ecotokens=debug,info")
    } else {
        EnvFilter::new("ecotokens=warn")
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Stats) | None => stats::run(&cli).await,
        Some(Commands::Ingest(args)) => ingest::run(args, &cli).await,
        Some(Commands::Estimate(args)) => estimate::run(args, &cli).await,
        Some(Commands::History(args)) => history::run(args, &cli).await,
        Some(Commands::Export(args)) => export::run(args, &cli).await,
        Some(Commands::Clear(args)) => clear::run(args, &cli).await,
        Some(Commands::Settings(args)) => settings::run(args, &cli).await,
        Some(Commands::Login(args)) => auth::login(args, &cli).await,
        Some(Commands::Signup(args)) => auth::signup(args, &cli).await,
        Some(Commands::Logout) => auth::logout(&cli).await,
        Some(Commands::Whoami) => auth::whoami(&cli).await,
        Some(Commands::Sync(args)) => sync::run(args, &cli).await,
        Some(Commands::Watch(args)) => watch::run(args, &cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}
