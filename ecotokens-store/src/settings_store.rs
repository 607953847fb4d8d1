//! User preferences store.
//!
//! Settings live in the key-value store under [`SETTINGS_KEY`] and are
//! overwritten wholesale on save.

use ecotokens_core::Settings;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::kv::{KeyValueStore, Record, get_one, set_one};

/// Key holding the settings object.
pub const SETTINGS_KEY: &str = "settings";

/// Loads and saves [`Settings`].
#[derive(Clone)]
pub struct SettingsStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    /// Creates a settings store over `kv`.
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Gets the current settings.
    ///
    /// Missing settings are the defaults. Fields absent from a stored
    /// record take their defaults; a record that cannot be decoded at all
    /// is replaced by the defaults with a warning.
    pub async fn get(&self) -> Result<Settings, StoreError> {
        Ok(decode(get_one(self.kv.as_ref(), SETTINGS_KEY).await?))
    }

    /// Validates and saves `settings`, replacing the stored record.
    pub async fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        settings.validate()?;
        set_one(self.kv.as_ref(), SETTINGS_KEY, serde_json::to_value(settings)?).await?;
        info!("Settings saved");
        Ok(())
    }

    /// Loads, modifies, and saves the settings in one store update.
    ///
    /// When `f` or validation fails, the stored record is left as it was.
    pub async fn update<F>(&self, f: F) -> Result<Settings, StoreError>
    where
        F: FnOnce(&mut Settings) -> Result<(), StoreError> + Send,
    {
        let mut outcome = None;
        self.kv
            .update(Box::new(|data: &mut Record| {
                let mut settings = decode(data.get(SETTINGS_KEY).cloned());
                let encoded = f(&mut settings)
                    .and_then(|()| Ok(settings.validate()?))
                    .and_then(|()| Ok(serde_json::to_value(&settings)?));
                outcome = Some(encoded.map(|value| {
                    data.insert(SETTINGS_KEY.to_string(), value);
                    settings
                }));
            }))
            .await?;

        let settings = outcome
            .ok_or_else(|| StoreError::Corrupt("settings update did not run".into()))??;
        info!("Settings saved");
        Ok(settings)
    }

    /// Sets one field from its textual form.
    pub async fn set_field(&self, key: &str, value: &str) -> Result<Settings, StoreError> {
        self.update(|s| s.set_field(key, value).map_err(StoreError::from))
            .await
    }

    /// Subscribes to store changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.kv.subscribe()
    }
}

fn decode(value: Option<Value>) -> Settings {
    match value {
        None | Some(Value::Null) => {
            debug!("No stored settings, using defaults");
            Settings::default()
        }
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to decode settings, using defaults");
            Settings::default()
        }),
    }
}

// ============================================================================
// Tests
// ============================================================================
