// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! # EcoTokens Fetch
//!
//! Remote boundaries for the EcoTokens application.
//!
//! Both remote services are opaque; this crate models them as traits with
//! thin JSON-over-HTTP implementations:
//!
//! - [`remote::AggregateStore`] - per-user running token totals, updated by increments
//! - [`identity::IdentityProvider`] - sign-in yielding the uid that keys the aggregate
//!
//! ## Host APIs
//!
//! - [`host::http`] - HTTP client with tracing and domain allowlist
//!
//! ## Example
//!
//! ```ignore
//! use ecotokens_fetch::{AggregateIncrement, AggregateStore, HttpAggregateStore, HttpClient};
//!
//! let store = HttpAggregateStore::new(HttpClient::new()?, base_url, Some(token));
//! let mut increment = AggregateIncrement::default();
//! increment.add("claude", 1200);
//! store.apply_increment(&uid, &increment).await?;
//! ```

pub mod error;
pub mod host;
pub mod identity;
pub mod remote;
pub mod retry;

pub use error::{FetchError, HttpError};
pub use host::http::HttpClient;
pub use identity::{HttpIdentityProvider, Identity, IdentityProvider, normalize_email};
pub use remote::{AggregateIncrement, AggregateStore, AggregateTotals, HttpAggregateStore};
pub use retry::RetryStrategy;
