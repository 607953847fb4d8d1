//! Domain models for EcoTokens.
//!
//! ## Submodules
//!
//! - [`provider`] - Provider identification ([`ProviderKind`])
//! - [`usage`] - Usage events and timestamp handling
//! - [`settings`] - User preferences
//! - [`message`] - Transport envelope for usage events

mod message;
mod provider;
mod settings;
mod usage;

pub use message::UsageMessage;
pub use provider::ProviderKind;
pub use settings::Settings;
pub use usage::{
    ESTIMATED_MODEL, SECONDS_THRESHOLD, UNKNOWN_MODEL, UsageEvent, as_count, normalize_timestamp,
    now_millis,
};
