//! Core error types for `EcoTokens`.

use thiserror::Error;

/// Core error type for `EcoTokens` operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid settings value.
    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting {
        /// Setting key (camelCase, as persisted).
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// Unknown setting key.
    #[error("Unknown setting: {0}")]
    UnknownSetting(String),

    /// Invalid data in a stored or relayed payload.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
