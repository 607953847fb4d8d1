//! Host APIs for remote calls.
//!
//! - [`http`] - HTTP client with tracing, bearer auth, and domain allowlist

pub mod http;

pub use http::{HttpClient, endpoint, ensure_success};
