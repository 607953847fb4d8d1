//! Sync command - push pending usage to the remote aggregate.

use anyhow::{Context, Result};
use clap::Args;
use ecotokens_fetch::{AggregateStore, RetryStrategy};
use ecotokens_store::{DrainOutcome, EventStoreHandle, StoreError};
use std::time::Duration;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::output::{JsonFormatter, SyncOutput, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the sync command.
#[derive(Args)]
pub struct SyncArgs {
    /// Extra attempts after a transient failure.
    #[arg(long, default_value = "2")]
    pub retries: u32,

    /// Base delay between attempts, in milliseconds.
    #[arg(long, default_value = "1000")]
    pub retry_delay_ms: u64,
}

impl SyncArgs {
    fn strategy(&self) -> RetryStrategy {
        RetryStrategy::new(self.retries.saturating_add(1))
            .with_base_delay(Duration::from_millis(self.retry_delay_ms))
    }
}

/// Drains the queue, retrying transient failures per `strategy`.
pub async fn drain_with_retry(
    events: &EventStoreHandle,
    remote: &dyn AggregateStore,
    strategy: &RetryStrategy,
) -> Result<DrainOutcome, StoreError> {
    let mut attempt = 1;
    loop {
        match events.drain(remote).await {
            Ok(outcome) => return Ok(outcome),
            Err(err) if attempt < strategy.max_attempts && err.is_transient() => {
                let delay = strategy.delay_for_attempt(attempt);
                warn!(attempt, ?delay, error = %err, "Sync failed, retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Runs the sync command.
pub async fn run(args: &SyncArgs, cli: &Cli) -> Result<()> {
    let ctx = AppContext::open(cli)?;
    let session = ctx.session().await?;
    let remote = ctx.aggregate_store(session.as_ref())?;

    let outcome = drain_with_retry(&ctx.events, &remote, &args.strategy())
        .await
        .context("Sync failed; pending usage was kept. Run `ecotokens sync` to retry")?;
    let remaining = ctx.events.pending().await?.len();
    info!(?outcome, remaining, "Sync finished");

    match cli.format {
        OutputFormat::Json => {
            println!(
                "{}",
                JsonFormatter::new(cli.pretty).format(&SyncOutput::new(&outcome, remaining))?
            );
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", TextFormatter::new(!cli.no_color).format_sync(&outcome, remaining));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ecotokens_core::{ProviderKind, UsageEvent};
    use ecotokens_fetch::{AggregateIncrement, AggregateTotals, FetchError};
    use ecotokens_store::{EventStore, MemoryStore};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with the given status for the first `failures` calls.
    struct FlakyRemote {
        failures: u32,
        status: u16,
        calls: AtomicU32,
    }

    impl FlakyRemote {
        fn new(failures: u32, status: u16) -> Self {
            Self {
                failures,
                status,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl AggregateStore for FlakyRemote {
        async fn apply_increment(
            &self,
            _uid: &str,
            _increment: &AggregateIncrement,
        ) -> Result<(), FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(FetchError::Status {
                    status: self.status,
                    message: "unavailable".into(),
                });
            }
            Ok(())
        }

        async fn read_totals(&self, _uid: &str) -> Result<AggregateTotals, FetchError> {
            Ok(AggregateTotals::default())
        }
    }

    async fn queued_store() -> EventStoreHandle {
        let events = EventStore::spawn(Arc::new(MemoryStore::new()));
        events.bind_identity(Some("u-1".into())).await.unwrap();
        events
            .append(UsageEvent::new(ProviderKind::ChatGpt, 40, 60))
            .await
            .unwrap();
        events
    }

    fn fast(attempts: u32) -> RetryStrategy {
        RetryStrategy::new(attempts).with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let events = queued_store().await;
        let remote = FlakyRemote::new(1, 503);

        let outcome = drain_with_retry(&events, &remote, &fast(3)).await.unwrap();
        assert_eq!(outcome, DrainOutcome::Synced { records: 1, tokens: 100 });
        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
        assert!(events.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_failure_keeps_queue() {
        let events = queued_store().await;
        let remote = FlakyRemote::new(5, 403);

        let err = drain_with_retry(&events, &remote, &fast(3)).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(events.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let events = queued_store().await;
        let remote = FlakyRemote::new(10, 502);

        assert!(drain_with_retry(&events, &remote, &fast(2)).await.is_err());
        assert_eq!(remote.calls.load(Ordering::SeqCst), 2);
        assert_eq!(events.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_not_signed_in_sends_nothing() {
        let events = EventStore::spawn(Arc::new(MemoryStore::new()));
        let remote = FlakyRemote::new(0, 200);
        let outcome = drain_with_retry(&events, &remote, &fast(1)).await.unwrap();
        assert_eq!(outcome, DrainOutcome::NotSignedIn);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }
}
