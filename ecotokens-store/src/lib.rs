// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! # `EcoTokens` Store
//!
//! Local persistence for `EcoTokens`.
//!
//! This crate provides:
//!
//! - **EventStore**: Single-writer actor over the usage history and sync queue
//! - **KeyValueStore**: The persistence boundary, with memory and JSON-file stores
//! - **SettingsStore**: User preferences, saved wholesale
//! - **Session**: The saved sign-in identity
//!
//! ## Stored Keys
//!
//! | Key | Contents |
//! |-----|----------|
//! | `usageHistory` | Event array, oldest first, at most 10 000 |
//! | `pendingSync` | Sync records awaiting the remote, at most 500 |
//! | `identityUid` | Uid the queue is synced to |
//! | `settings` | [`ecotokens_core::Settings`] |
//! | `session` | [`ecotokens_fetch::Identity`] |
//!
//! ## Usage
//!
//! ```ignore
//! use ecotokens_store::{EventStore, JsonFileStore};
//! use std::sync::Arc;
//!
//! let kv = Arc::new(JsonFileStore::open_default());
//! let store = EventStore::spawn(kv);
//!
//! store.append(event).await?;
//!
//! let mut rx = store.subscribe();
//! while rx.changed().await.is_ok() {
//!     println!("Usage updated!");
//! }
//! ```

pub mod error;
pub mod event_store;
pub mod history;
pub mod kv;
pub mod persistence;
pub mod session;
pub mod settings_store;
pub mod sync_queue;

pub use error::StoreError;
pub use event_store::{ClearScope, DrainOutcome, EventStore, EventStoreHandle};
pub use history::{EventHistory, MAX_HISTORY_ENTRIES};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore, Mutation, Record};
pub use persistence::{default_data_dir, default_store_path, save_json};
pub use session::{load_session, save_session};
pub use settings_store::SettingsStore;
pub use sync_queue::{MAX_PENDING_SYNC, PendingSyncQueue, SyncRecord};
