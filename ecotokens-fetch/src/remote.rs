//! Remote per-user aggregate totals.
//!
//! The remote keeps one document per user with a running token total and a
//! per-provider breakdown. Clients never overwrite it; they send
//! increments, which the server adds atomically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, instrument};
use url::Url;

use crate::error::FetchError;
use crate::host::http::{HttpClient, endpoint, ensure_success};

// ============================================================================
// Wire Types
// ============================================================================

/// Amount to add to a user's aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateIncrement {
    /// Tokens to add to the running total.
    pub total_tokens: u64,
    /// Tokens to add per provider, keyed by lowercase provider label.
    pub total_by_provider: BTreeMap<String, u64>,
}

impl AggregateIncrement {
    /// Adds `tokens` for `provider`, normalizing the label to lowercase.
    pub fn add(&mut self, provider: &str, tokens: u64) {
        let key = provider.trim().to_ascii_lowercase();
        let key = if key.is_empty() { "unknown".to_string() } else { key };
        self.total_tokens = self.total_tokens.saturating_add(tokens);
        let slot = self.total_by_provider.entry(key).or_default();
        *slot = slot.saturating_add(tokens);
    }

    /// Returns true if the increment carries no tokens.
    pub fn is_empty(&self) -> bool {
        self.total_by_provider.is_empty()
    }
}

/// A user's aggregate as stored remotely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateTotals {
    /// Running token total.
    pub total_tokens: u64,
    /// Running total per provider.
    pub total_by_provider: BTreeMap<String, u64>,
    /// Server time of the last increment.
    pub updated_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Aggregate Store Trait
// ============================================================================

/// Remote store of per-user aggregate totals.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Atomically adds `increment` to the user's aggregate.
    async fn apply_increment(&self, uid: &str, increment: &AggregateIncrement)
    -> Result<(), FetchError>;

    /// Reads the user's current aggregate.
    async fn read_totals(&self, uid: &str) -> Result<AggregateTotals, FetchError>;
}

// ============================================================================
// HTTP Implementation
// ============================================================================

/// [`AggregateStore`] backed by a JSON HTTP API.
///
/// - `POST {base}/users/{uid}/increment` with an [`AggregateIncrement`] body
/// - `GET {base}/users/{uid}` returning [`AggregateTotals`]
#[derive(Debug, Clone)]
pub struct HttpAggregateStore {
    client: HttpClient,
    base: Url,
    token: Option<String>,
}

impl HttpAggregateStore {
    /// Creates a store for `base`, authenticating with `token` if given.
    pub fn new(client: HttpClient, base: Url, token: Option<String>) -> Self {
        Self {
            client,
            base,
            token,
        }
    }
}

#[async_trait]
impl AggregateStore for HttpAggregateStore {
    #[instrument(skip(self, increment), fields(total = increment.total_tokens))]
    async fn apply_increment(
        &self,
        uid: &str,
        increment: &AggregateIncrement,
    ) -> Result<(), FetchError> {
        let url = endpoint(&self.base, &["users", uid, "increment"])?;
        let response = self
            .client
            .post_json_with_auth(&url, increment, self.token.as_deref())
            .await?;
        ensure_success(response).await?;
        debug!("Increment applied");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn read_totals(&self, uid: &str) -> Result<AggregateTotals, FetchError> {
        let url = endpoint(&self.base, &["users", uid])?;
        let response = self
            .client
            .get_with_auth(&url, self.token.as_deref())
            .await?;
        let response = ensure_success(response).await?;
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::InvalidResponse(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }
}

// ============================================================================
// Tests
// ============================================================================
