//! Store error types.

use ecotokens_core::CoreError;
use ecotokens_fetch::FetchError;
use thiserror::Error;

/// Errors that can occur in the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data has an unexpected shape.
    #[error("Corrupt store data: {0}")]
    Corrupt(String),

    /// Rejected settings value.
    #[error("Settings error: {0}")]
    Settings(#[from] CoreError),

    /// The event store task has stopped.
    #[error("Event store is not running")]
    ActorClosed,

    /// Remote aggregate or identity call failed.
    #[error("Remote sync failed: {0}")]
    Remote(#[from] FetchError),
}

impl StoreError {
    /// Returns true if this is a transient error that might succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Io(_) => true,
            StoreError::Remote(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Io(std::io::Error::other("disk")).is_transient());
        let unavailable = FetchError::Status {
            status: 503,
            message: String::new(),
        };
        assert!(StoreError::Remote(unavailable).is_transient());
        assert!(!StoreError::Remote(FetchError::NotSignedIn).is_transient());
        assert!(!StoreError::ActorClosed.is_transient());
        assert!(!StoreError::Corrupt("x".into()).is_transient());
    }
}
