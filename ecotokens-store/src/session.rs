//! Persisted sign-in session.
//!
//! The identity returned by sign-in (uid, email, bearer token) is kept
//! under [`SESSION_KEY`] so later commands can resume it. Binding the uid
//! for sync is the event store's job; this only remembers who signed in.

use ecotokens_fetch::Identity;
use serde_json::Value;
use tracing::warn;

use crate::error::StoreError;
use crate::kv::{KeyValueStore, get_one, set_one};

/// Key holding the saved identity.
pub const SESSION_KEY: &str = "session";

/// Loads the saved identity, if any.
pub async fn load_session(kv: &dyn KeyValueStore) -> Result<Option<Identity>, StoreError> {
    match get_one(kv, SESSION_KEY).await? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match serde_json::from_value(value) {
            Ok(identity) => Ok(Some(identity)),
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable saved session");
                Ok(None)
            }
        },
    }
}

/// Saves `identity`, or forgets the session when `None`.
pub async fn save_session(
    kv: &dyn KeyValueStore,
    identity: Option<&Identity>,
) -> Result<(), StoreError> {
    match identity {
        Some(identity) => set_one(kv, SESSION_KEY, serde_json::to_value(identity)?).await,
        None => kv.remove(&[SESSION_KEY]).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_session_roundtrip_and_forget() {
        let kv = MemoryStore::new();
        assert_eq!(load_session(&kv).await.unwrap(), None);

        let identity = Identity {
            uid: "u-1".into(),
            email: "ada@example.org".into(),
            token: Some("t".into()),
        };
        save_session(&kv, Some(&identity)).await.unwrap();
        assert_eq!(load_session(&kv).await.unwrap(), Some(identity));

        save_session(&kv, None).await.unwrap();
        assert_eq!(load_session(&kv).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unreadable_session_is_none() {
        let kv = MemoryStore::new();
        set_one(&kv, SESSION_KEY, json!({ "email": 3 })).await.unwrap();
        assert_eq!(load_session(&kv).await.unwrap(), None);
    }
}
