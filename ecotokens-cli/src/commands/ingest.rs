//! Ingest command - record usage from a captured response body.

use anyhow::Result;
use clap::Args;
use ecotokens_capture::parse_usage;
use ecotokens_core::{ProviderKind, UsageEvent};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::context::AppContext;
use crate::output::{EventOutput, JsonFormatter, RecordOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Chat site the response was captured on (chatgpt, claude, gemini).
    #[arg(long, short)]
    pub provider: Option<String>,

    /// Request URL the body was returned for.
    #[arg(long, short)]
    pub url: String,

    /// Host of the page that made the request, used when --provider is absent.
    #[arg(long)]
    pub page_host: Option<String>,

    /// File holding the response body (standard input if absent or "-").
    pub file: Option<PathBuf>,
}

impl IngestArgs {
    /// Resolves the page's provider from the flags.
    pub fn page_provider(&self) -> Option<ProviderKind> {
        self.provider
            .as_deref()
            .map(ProviderKind::from_loose)
            .filter(|p| *p != ProviderKind::Unknown)
            .or_else(|| self.page_host.as_deref().and_then(ProviderKind::from_host))
    }
}

/// Parses `body` and records the event it yields, if any.
pub async fn ingest_body(
    ctx: &AppContext,
    page: Option<ProviderKind>,
    url: &str,
    body: &str,
) -> Result<Option<UsageEvent>> {
    let Some(event) = parse_usage(page, body, url) else {
        debug!(url, bytes = body.len(), "No usage in response body");
        return Ok(None);
    };
    info!(provider = %event.provider, total = event.total_tokens, "Recording captured usage");
    ctx.events.append(event.clone()).await?;
    Ok(Some(event))
}

/// Runs the ingest command.
pub async fn run(args: &IngestArgs, cli: &Cli) -> Result<()> {
    let body = super::read_input(args.file.as_deref()).await?;
    let ctx = AppContext::open(cli)?;
    let recorded = ingest_body(&ctx, args.page_provider(), &args.url, &body).await?;
    print_recorded(recorded.as_ref(), "no usage found in response", cli)
}

/// Prints the outcome of a recording command.
pub(crate) fn print_recorded(event: Option<&UsageEvent>, reason: &str, cli: &Cli) -> Result<()> {
    match cli.format {
        OutputFormat::Json => {
            let output = RecordOutput {
                recorded: event.is_some(),
                event: event.map(EventOutput::from),
                reason: event.is_none().then(|| reason.to_string()),
            };
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
        OutputFormat::Text => {
            if cli.quiet {
                return Ok(());
            }
            match event {
                Some(event) => {
                    println!("{}", TextFormatter::new(!cli.no_color).format_recorded(event));
                }
                None => println!("Nothing recorded: {reason}."),
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CliConfig;

    fn context(dir: &tempfile::TempDir) -> AppContext {
        AppContext::with_config(CliConfig {
            data_path: dir.path().join("store.json"),
            remote_url: None,
            token: None,
        })
    }

    fn args(provider: Option<&str>, page_host: Option<&str>) -> IngestArgs {
        IngestArgs {
            provider: provider.map(String::from),
            url: "https://example.org/api".into(),
            page_host: page_host.map(String::from),
            file: None,
        }
    }

    #[test]
    fn test_page_provider_resolution() {
        assert_eq!(args(Some("Claude"), None).page_provider(), Some(ProviderKind::Claude));
        assert_eq!(
            args(Some("nope"), Some("chatgpt.com")).page_provider(),
            Some(ProviderKind::ChatGpt)
        );
        assert_eq!(args(None, Some("example.org")).page_provider(), None);
    }

    #[tokio::test]
    async fn test_ingest_records_json_usage() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let body = concat!(
            r#"{"model":"gpt-4o","#,
            r#""usage":{"prompt_tokens":12,"completion_tokens":30,"total_tokens":42}}"#,
        );

        let event = ingest_body(
            &ctx,
            Some(ProviderKind::ChatGpt),
            "https://chatgpt.com/backend-api/conversation",
            body,
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(event.total_tokens, 42);

        let stored = ctx.events.get_all().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].provider, ProviderKind::ChatGpt);
    }

    #[tokio::test]
    async fn test_ingest_without_usage_records_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        let recorded = ingest_body(&ctx, None, "https://example.org/x", "<html></html>")
            .await
            .unwrap();
        assert!(recorded.is_none());
        assert!(ctx.events.get_all().await.unwrap().is_empty());
    }
}
