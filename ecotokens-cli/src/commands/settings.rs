//! Settings command - show or change preferences.

use anyhow::Result;
use clap::{Args, Subcommand};
use ecotokens_core::Settings;
use tracing::info;

use crate::context::AppContext;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the settings command.
#[derive(Args)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub action: SettingsAction,
}

/// Settings subcommands.
#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show current settings.
    Show,

    /// Set one setting.
    Set {
        /// Setting key (ecoMode, limitsEnabled, tokenLimit, ozLimit, hardBlock, waterIntensity).
        key: String,
        /// New value.
        value: String,
    },

    /// Reset to defaults.
    Reset,

    /// Show the data file path.
    Path,
}

/// Runs the settings command.
pub async fn run(args: &SettingsArgs, cli: &Cli) -> Result<()> {
    let ctx = AppContext::open(cli)?;
    match &args.action {
        SettingsAction::Show => {
            let settings = ctx.settings.get().await?;
            print_settings(&settings, cli)
        }
        SettingsAction::Set { key, value } => {
            let settings = ctx.settings.set_field(key, value).await?;
            info!(key, value, "Setting changed");
            print_settings(&settings, cli)
        }
        SettingsAction::Reset => {
            let settings = Settings::default();
            ctx.settings.save(&settings).await?;
            info!("Settings reset to defaults");
            print_settings(&settings, cli)
        }
        SettingsAction::Path => {
            match cli.format {
                OutputFormat::Json => println!(
                    "{}",
                    JsonFormatter::new(cli.pretty)
                        .format(&serde_json::json!({ "data": ctx.kv.path() }))?
                ),
                OutputFormat::Text => println!("{}", ctx.kv.path().display()),
            }
            Ok(())
        }
    }
}

fn print_settings(settings: &Settings, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Json => println!("{}", JsonFormatter::new(cli.pretty).format(settings)?),
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", TextFormatter::new(!cli.no_color).format_settings(settings));
            }
        }
    }
    Ok(())
}
