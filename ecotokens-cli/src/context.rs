//! Shared state opened by each command.

use anyhow::{Context as _, Result, bail};
use ecotokens_fetch::{HttpAggregateStore, HttpClient, HttpIdentityProvider, Identity};
use ecotokens_store::{
    EventStore, EventStoreHandle, JsonFileStore, KeyValueStore, SettingsStore, default_store_path,
    load_session,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::Cli;

/// Where the data lives and how to reach the remote service.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Path of the JSON data file.
    pub data_path: PathBuf,
    /// Base URL of the account and aggregate service.
    pub remote_url: Option<Url>,
    /// Bearer token that overrides the saved session's.
    pub token: Option<String>,
}

impl CliConfig {
    /// Resolves the config from flags and environment.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let remote_url = cli
            .remote_url
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| Url::parse(s.trim()).with_context(|| format!("Invalid remote URL: {s}")))
            .transpose()?;

        Ok(Self {
            data_path: cli.data.clone().unwrap_or_else(default_store_path),
            remote_url,
            token: cli.token.clone().filter(|t| !t.is_empty()),
        })
    }
}

/// Stores opened over one data file.
pub struct AppContext {
    /// Resolved configuration.
    pub config: CliConfig,
    /// The backing file store.
    pub kv: Arc<JsonFileStore>,
    /// Event history and sync queue.
    pub events: EventStoreHandle,
    /// User preferences.
    pub settings: SettingsStore,
}

impl AppContext {
    /// Opens the data file named by `cli`.
    pub fn open(cli: &Cli) -> Result<Self> {
        let config = CliConfig::from_cli(cli)?;
        Ok(Self::with_config(config))
    }

    /// Opens the data file named by `config`.
    pub fn with_config(config: CliConfig) -> Self {
        debug!(path = %config.data_path.display(), "Opening data file");
        let kv = Arc::new(JsonFileStore::new(&config.data_path));
        let shared: Arc<dyn KeyValueStore> = kv.clone();
        Self {
            events: EventStore::spawn(shared.clone()),
            settings: SettingsStore::new(shared),
            config,
            kv,
        }
    }

    /// Returns the key-value store.
    pub fn store(&self) -> &dyn KeyValueStore {
        self.kv.as_ref()
    }

    /// Returns the saved session, if any.
    pub async fn session(&self) -> Result<Option<Identity>> {
        Ok(load_session(self.store()).await?)
    }

    /// Returns the remote base URL or explains how to set one.
    pub fn remote_url(&self) -> Result<Url> {
        match &self.config.remote_url {
            Some(url) => Ok(url.clone()),
            None => {
                bail!("No remote service configured (use --remote-url or ECOTOKENS_REMOTE_URL)")
            }
        }
    }

    /// Builds an HTTP client restricted to the remote service's host.
    fn http_client(base: &Url) -> Result<HttpClient> {
        let client = HttpClient::new()?;
        Ok(match base.host_str() {
            Some(host) => client.with_allowed_domains(vec![host.to_string()]),
            None => client,
        })
    }

    /// Builds the identity client, resuming `session`.
    pub fn identity_provider(&self, session: Option<Identity>) -> Result<HttpIdentityProvider> {
        let base = self.remote_url()?;
        let client = Self::http_client(&base)?;
        Ok(HttpIdentityProvider::with_session(client, base, session))
    }

    /// Builds the aggregate client, authenticating as `session` unless a
    /// token was given explicitly.
    pub fn aggregate_store(&self, session: Option<&Identity>) -> Result<HttpAggregateStore> {
        let base = self.remote_url()?;
        let client = Self::http_client(&base)?;
        let token = self
            .config
            .token
            .clone()
            .or_else(|| session.and_then(|s| s.token.clone()));
        Ok(HttpAggregateStore::new(client, base, token))
    }
}
