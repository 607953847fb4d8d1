//! Account commands - login, signup, logout, whoami.
//!
//! Signing in saves the session, binds its uid to the event store so new
//! usage is queued for that account, and pushes whatever is pending.
//! Signing out is local-first: the session and binding are dropped even if
//! the server cannot be told.

use anyhow::{Context, Result};
use clap::Args;
use ecotokens_fetch::{AggregateStore, Identity, IdentityProvider};
use ecotokens_store::{DrainOutcome, save_session};
use std::io::BufRead;
use tracing::{info, warn};

use crate::context::AppContext;
use crate::output::{AccountOutput, JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Credentials for login and signup.
#[derive(Args)]
pub struct CredentialsArgs {
    /// Account email.
    #[arg(long, short)]
    pub email: String,

    /// Account password (read from standard input if absent).
    #[arg(long, env = "ECOTOKENS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

impl CredentialsArgs {
    async fn password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin()
                .lock()
                .read_line(&mut line)
                .context("Failed to read password")?;
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
        .await?
    }
}

/// Records a fresh sign-in and pushes pending usage.
///
/// A failed push is logged and left for `ecotokens sync`.
pub async fn complete_sign_in(
    ctx: &AppContext,
    identity: &Identity,
    remote: &dyn AggregateStore,
) -> Result<DrainOutcome> {
    save_session(ctx.store(), Some(identity)).await?;
    ctx.events.bind_identity(Some(identity.uid.clone())).await?;
    match ctx.events.drain(remote).await {
        Ok(outcome) => Ok(outcome),
        Err(e) => {
            warn!(error = %e, "Initial sync failed; run `ecotokens sync` to retry");
            Ok(DrainOutcome::NothingPending)
        }
    }
}

/// Forgets the session and stops queueing usage for it.
pub async fn complete_sign_out(ctx: &AppContext) -> Result<()> {
    save_session(ctx.store(), None).await?;
    ctx.events.bind_identity(None).await?;
    Ok(())
}

/// Runs the login command.
pub async fn login(args: &CredentialsArgs, cli: &Cli) -> Result<()> {
    sign_in(args, cli, false).await
}

/// Runs the signup command.
pub async fn signup(args: &CredentialsArgs, cli: &Cli) -> Result<()> {
    sign_in(args, cli, true).await
}

async fn sign_in(args: &CredentialsArgs, cli: &Cli, create: bool) -> Result<()> {
    let ctx = AppContext::open(cli)?;
    let provider = ctx.identity_provider(None)?;
    let password = args.password().await?;

    let identity = if create {
        provider.signup(&args.email, &password).await?
    } else {
        provider.login(&args.email, &password).await?
    };
    let remote = ctx.aggregate_store(Some(&identity))?;
    let outcome = complete_sign_in(&ctx, &identity, &remote).await?;
    info!(uid = %identity.uid, ?outcome, "Signed in");

    print_account(&ctx, cli, Some(&identity), None).await
}

/// Runs the logout command.
pub async fn logout(cli: &Cli) -> Result<()> {
    let ctx = AppContext::open(cli)?;
    let session = ctx.session().await?;
    if session.is_some() && ctx.config.remote_url.is_some() {
        let provider = ctx.identity_provider(session)?;
        if let Err(e) = provider.logout().await {
            warn!(error = %e, "Remote logout failed; signing out locally");
        }
    }
    complete_sign_out(&ctx).await?;
    if !cli.quiet && cli.format == OutputFormat::Text {
        println!("Signed out.");
    }
    if cli.format == OutputFormat::Json {
        let output = serde_json::json!({ "signedIn": false });
        println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
    }
    Ok(())
}

/// Runs the whoami command.
pub async fn whoami(cli: &Cli) -> Result<()> {
    let ctx = AppContext::open(cli)?;
    let session = ctx.session().await?;

    let remote = match (&session, ctx.config.remote_url.is_some()) {
        (Some(identity), true) => {
            let store = ctx.aggregate_store(Some(identity))?;
            match store.read_totals(&identity.uid).await {
                Ok(totals) => Some(totals),
                Err(e) => {
                    warn!(error = %e, "Could not read remote totals");
                    None
                }
            }
        }
        _ => None,
    };

    print_account(&ctx, cli, session.as_ref(), remote).await
}

async fn print_account(
    ctx: &AppContext,
    cli: &Cli,
    identity: Option<&Identity>,
    remote: Option<ecotokens_fetch::AggregateTotals>,
) -> Result<()> {
    let bound = ctx.events.identity().await?;
    let pending = ctx.events.pending().await?;
    match cli.format {
        OutputFormat::Json => {
            let output = AccountOutput::new(identity, bound, &pending, remote);
            println!("{}", JsonFormatter::new(cli.pretty).format(&output)?);
        }
        OutputFormat::Text => {
            let text = TextFormatter::new(!cli.no_color).format_account(
                identity,
                bound.as_deref(),
                &pending,
                remote.as_ref(),
            );
            println!("{text}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CliConfig;
    use async_trait::async_trait;
    use ecotokens_core::{ProviderKind, UsageEvent};
    use ecotokens_fetch::{AggregateIncrement, AggregateTotals, FetchError};
    use ecotokens_store::load_session;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRemote {
        calls: Mutex<Vec<(String, AggregateIncrement)>>,
        fail: bool,
    }

    #[async_trait]
    impl AggregateStore for RecordingRemote {
        async fn apply_increment(
            &self,
            uid: &str,
            increment: &AggregateIncrement,
        ) -> Result<(), FetchError> {
            if self.fail {
                return Err(FetchError::Status {
                    status: 503,
                    message: "down".into(),
                });
            }
            self.calls
                .lock()
                .unwrap()
                .push((uid.to_string(), increment.clone()));
            Ok(())
        }

        async fn read_totals(&self, _uid: &str) -> Result<AggregateTotals, FetchError> {
            Ok(AggregateTotals::default())
        }
    }

    fn context(dir: &tempfile::TempDir) -> AppContext {
        AppContext::with_config(CliConfig {
            data_path: dir.path().join("store.json"),
            remote_url: None,
            token: None,
        })
    }

    fn identity() -> Identity {
        Identity {
            uid: "u-42".into(),
            email: "ada@example.org".into(),
            token: Some("t".into()),
        }
    }

    #[tokio::test]
    async fn test_sign_in_binds_and_syncs_pending() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        ctx.events.bind_identity(Some("u-42".into())).await.unwrap();
        ctx.events
            .append(UsageEvent::new(ProviderKind::Claude, 10, 20))
            .await
            .unwrap();

        let remote = RecordingRemote::default();
        let outcome = complete_sign_in(&ctx, &identity(), &remote).await.unwrap();
        assert_eq!(outcome, DrainOutcome::Synced { records: 1, tokens: 30 });

        let calls = remote.calls.lock().unwrap();
        assert_eq!(calls[0].0, "u-42");
        assert_eq!(calls[0].1.total_by_provider["claude"], 30);
        assert_eq!(load_session(ctx.store()).await.unwrap(), Some(identity()));
        assert_eq!(ctx.events.identity().await.unwrap().as_deref(), Some("u-42"));
    }

    #[tokio::test]
    async fn test_failed_initial_sync_keeps_queue() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        ctx.events.bind_identity(Some("u-42".into())).await.unwrap();
        ctx.events
            .append(UsageEvent::new(ProviderKind::Gemini, 5, 5))
            .await
            .unwrap();

        let remote = RecordingRemote {
            fail: true,
            ..RecordingRemote::default()
        };
        complete_sign_in(&ctx, &identity(), &remote).await.unwrap();
        assert_eq!(ctx.events.pending().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_clears_session_and_binding() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        complete_sign_in(&ctx, &identity(), &RecordingRemote::default())
            .await
            .unwrap();

        complete_sign_out(&ctx).await.unwrap();
        assert_eq!(load_session(ctx.store()).await.unwrap(), None);
        assert_eq!(ctx.events.identity().await.unwrap(), None);
    }
}
