// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `EcoTokens` Capture
//!
//! Usage capture for AI chat sites.
//!
//! Two independent sources produce [`UsageMessage`]s:
//!
//! - **Network**: [`interceptor`] hooks feed response bodies to the
//!   [`parser`], which recognizes the usage shapes each provider emits
//! - **DOM**: the [`observer`] watches rendered assistant messages and
//!   estimates tokens from text once a message stops streaming
//!
//! Both feed the same channel; the store decides what to keep.
//!
//! ## Supported Sites
//!
//! | Provider | Network shapes | DOM selectors |
//! |----------|----------------|---------------|
//! | ChatGPT  | `usage`, SSE, `count_tokens`, length-prefixed | ✅ |
//! | Claude   | `usage` | ✅ |
//! | Gemini   | `usageMetadata`, length-prefixed | ✅ |
//!
//! ## Usage
//!
//! ```ignore
//! use ecotokens_capture::{parse_usage, ResponseTap, ObservedResponse};
//! use ecotokens_core::ProviderKind;
//!
//! let event = parse_usage(Some(ProviderKind::ChatGpt), body, url);
//!
//! let (tap, mut rx) = ResponseTap::channel(Some(ProviderKind::ChatGpt));
//! tap.observe(&ObservedResponse::new(url, body));
//! ```
//!
//! [`UsageMessage`]: ecotokens_core::UsageMessage

pub mod interceptor;
pub mod observer;
pub mod parser;
pub mod site;

pub use interceptor::{
    HostCapabilities, InterceptionHandle, InterceptionLayer, ObservedResponse, RequestHook,
    ResponseTap, TappedClient, TappedResponse,
};
pub use observer::{DomSignal, Document, NodeId, ObserverRunner, StabilityDetector, TrackState};
pub use parser::{parse_rpc_blocks, parse_usage};
pub use site::{SiteConfig, SiteRegistry};
