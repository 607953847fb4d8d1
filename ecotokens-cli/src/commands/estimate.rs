//! Estimate command - record usage estimated from message texts.

use anyhow::Result;
use clap::Args;
use ecotokens_capture::observer::detector::MIN_TEXT_CHARS;
use ecotokens_core::tokenizer::{estimate_tokens, estimate_tokens_opt};
use ecotokens_core::{ProviderKind, UsageEvent};
use std::path::PathBuf;
use tracing::info;

use super::ingest::print_recorded;
use crate::Cli;
use crate::context::AppContext;

/// Arguments for the estimate command.
#[derive(Args)]
pub struct EstimateArgs {
    /// Chat site the exchange happened on.
    #[arg(long, short, default_value = "unknown")]
    pub provider: String,

    /// File holding the user's prompt.
    #[arg(long, short)]
    pub input: Option<PathBuf>,

    /// File holding the assistant's reply (standard input if absent or "-").
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Page URL to attach to the event.
    #[arg(long)]
    pub url: Option<String>,
}

/// Builds the estimated event for a prompt and reply.
///
/// Replies shorter than the minimum message length yield nothing.
pub fn estimate_event(
    provider: ProviderKind,
    prompt: Option<&str>,
    reply: &str,
    url: Option<&str>,
) -> Option<UsageEvent> {
    if reply.chars().count() < MIN_TEXT_CHARS {
        return None;
    }
    let event = UsageEvent::new(provider, estimate_tokens_opt(prompt), estimate_tokens(reply));
    Some(match url {
        Some(url) => event.with_url(url),
        None => event,
    })
}

/// Runs the estimate command.
pub async fn run(args: &EstimateArgs, cli: &Cli) -> Result<()> {
    let prompt = match &args.input {
        Some(path) => Some(super::read_input(Some(path)).await?),
        None => None,
    };
    let reply = super::read_input(args.output.as_deref()).await?;

    let provider = ProviderKind::from_loose(&args.provider);
    let event = estimate_event(
        provider,
        prompt.as_deref().map(str::trim),
        reply.trim(),
        args.url.as_deref(),
    );

    if let Some(event) = &event {
        info!(
            %provider,
            input = event.input_tokens,
            output = event.output_tokens,
            "Recording estimate"
        );
        AppContext::open(cli)?.events.append(event.clone()).await?;
    }
    print_recorded(event.as_ref(), "reply too short to count", cli)
}
