// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # `EcoTokens` Core
//!
//! Core types and pure computations shared by every `EcoTokens` crate.
//!
//! This crate has no I/O. It provides:
//!
//! - Domain models (providers, usage events, settings)
//! - Heuristic token estimation from text
//! - Water and CO2 impact math with everyday equivalences
//! - Aggregated statistics over an event history
//!
//! ## Key Types
//!
//! - [`UsageEvent`] - One exchange's token counts
//! - [`ProviderKind`] - Which chat service an event came from
//! - [`Settings`] - User preferences (limits, water intensity)
//! - [`UsageStats`] - Today / all-time totals and breakdowns
//! - [`WaterIntensity`] - mL of water per 1000 tokens

pub mod error;
pub mod impact;
pub mod models;
pub mod stats;
pub mod tokenizer;

pub use error::CoreError;
pub use impact::{WaterIntensity, WaterUsage, compute_water};
pub use models::{
    ESTIMATED_MODEL, ProviderKind, Settings, UNKNOWN_MODEL, UsageEvent, UsageMessage, as_count,
};
pub use stats::{DailyTotal, ProviderShare, UsageStats};
pub use tokenizer::estimate_tokens;
