//! The event store actor.
//!
//! All writes to the usage history and the sync queue go through a single
//! task that owns the key-value store and handles commands in arrival
//! order. Concurrent producers can never interleave a read-modify-write.
//!
//! ```text
//! EventStoreHandle --StoreCommand--> [ actor task ] --get/set--> KeyValueStore
//!        ^                                 |
//!        +------------ oneshot reply ------+
//! ```
//!
//! Each command is a single [`KeyValueStore::update`], so stores in other
//! processes sharing the same file cannot interleave with it either.
//!
//! Syncing is split in two so the remote call never blocks the actor:
//! [`EventStoreHandle::drain`] snapshots the queue, sends one increment,
//! then asks the actor to drop exactly what was sent. Only one snapshot may
//! be outstanding at a time.

use ecotokens_core::{UsageEvent, UsageMessage};
use ecotokens_fetch::{AggregateIncrement, AggregateStore};
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::history::EventHistory;
use crate::kv::{KeyValueStore, Record};
use crate::sync_queue::{PendingSyncQueue, SyncRecord};

/// Key holding the event history array.
pub const HISTORY_KEY: &str = "usageHistory";

/// Key holding the pending sync array.
pub const PENDING_SYNC_KEY: &str = "pendingSync";

/// Key holding the signed-in user's uid.
pub const IDENTITY_KEY: &str = "identityUid";

const COMMAND_BUFFER: usize = 64;

/// What [`EventStoreHandle::clear`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    /// Only the event history.
    HistoryOnly,
    /// The event history and the pending sync queue.
    HistoryAndQueue,
}

/// Result of a drain attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// No identity is bound; nothing was sent.
    NotSignedIn,
    /// The queue was empty; nothing was sent.
    NothingPending,
    /// Another drain is waiting on the remote; nothing was sent.
    InFlight,
    /// One increment was applied.
    Synced {
        /// Records removed from the queue.
        records: usize,
        /// Tokens added to the aggregate.
        tokens: u64,
    },
}

/// A snapshot of the queue taken for one sync attempt.
///
/// Holding the batch holds the store's drain claim. The claim ends when
/// the batch is dropped: after commit, on failure, or when the caller
/// gives up mid-request.
#[derive(Debug)]
struct DrainBatch {
    uid: String,
    count: usize,
    evicted_mark: u64,
    increment: AggregateIncrement,
    _claim: Arc<()>,
}

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

enum StoreCommand {
    Append {
        event: UsageEvent,
        reply: Reply<()>,
    },
    GetAll {
        reply: Reply<Vec<UsageEvent>>,
    },
    Clear {
        scope: ClearScope,
        reply: Reply<()>,
    },
    BindIdentity {
        uid: Option<String>,
        reply: Reply<()>,
    },
    Identity {
        reply: Reply<Option<String>>,
    },
    Pending {
        reply: Reply<Vec<SyncRecord>>,
    },
    Snapshot {
        reply: Reply<Result<DrainBatch, DrainOutcome>>,
    },
    Commit {
        batch: DrainBatch,
        reply: Reply<()>,
    },
}

// ============================================================================
// Actor
// ============================================================================

struct StoreActor {
    kv: Arc<dyn KeyValueStore>,
    /// Records evicted from the queue front since startup. A drain commit
    /// discounts evictions that happened while its request was in flight.
    evicted: u64,
    /// Live while a snapshotted batch is outstanding.
    in_flight: Weak<()>,
}

fn identity_of(data: &Record) -> Option<String> {
    data.get(IDENTITY_KEY)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .map(str::to_string)
}

impl StoreActor {
    async fn run(mut self, mut commands: mpsc::Receiver<StoreCommand>) {
        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }
        debug!("Event store stopped");
    }

    async fn handle(&mut self, command: StoreCommand) {
        // A dropped reply receiver means the caller gave up; nothing to do.
        match command {
            StoreCommand::Append { event, reply } => {
                let _ = reply.send(self.append(event).await);
            }
            StoreCommand::GetAll { reply } => {
                let _ = reply.send(self.get_all().await);
            }
            StoreCommand::Clear { scope, reply } => {
                let _ = reply.send(self.clear(scope).await);
            }
            StoreCommand::BindIdentity { uid, reply } => {
                let _ = reply.send(self.bind_identity(uid).await);
            }
            StoreCommand::Identity { reply } => {
                let result = self.kv.get(&[IDENTITY_KEY]).await.map(|d| identity_of(&d));
                let _ = reply.send(result);
            }
            StoreCommand::Pending { reply } => {
                let _ = reply.send(self.queue().await.map(|q| q.to_vec()));
            }
            StoreCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot().await);
            }
            StoreCommand::Commit { batch, reply } => {
                let _ = reply.send(self.commit(batch).await);
            }
        }
    }

    async fn queue(&self) -> Result<PendingSyncQueue, StoreError> {
        let data = self.kv.get(&[PENDING_SYNC_KEY]).await?;
        Ok(PendingSyncQueue::from_value(data.get(PENDING_SYNC_KEY)))
    }

    async fn append(&mut self, event: UsageEvent) -> Result<(), StoreError> {
        let record = SyncRecord::from(&event);
        let mut entries = 0;
        let mut evicted = 0;

        self.kv
            .update(Box::new(|data: &mut Record| {
                let mut history = EventHistory::from_value(data.get(HISTORY_KEY));
                history.push(event);
                entries = history.len();
                data.insert(HISTORY_KEY.to_string(), history.to_value());

                if identity_of(data).is_some() {
                    let mut queue = PendingSyncQueue::from_value(data.get(PENDING_SYNC_KEY));
                    evicted = queue.push(record);
                    data.insert(PENDING_SYNC_KEY.to_string(), queue.to_value());
                }
            }))
            .await?;

        if evicted > 0 {
            debug!(evicted, "Sync queue full, dropped oldest");
        }
        self.evicted += evicted as u64;
        debug!(entries, "Usage event stored");
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<UsageEvent>, StoreError> {
        let data = self.kv.get(&[HISTORY_KEY]).await?;
        Ok(EventHistory::from_value(data.get(HISTORY_KEY)).into_vec())
    }

    async fn clear(&mut self, scope: ClearScope) -> Result<(), StoreError> {
        let mut dropped = 0;
        self.kv
            .update(Box::new(|data: &mut Record| {
                data.insert(HISTORY_KEY.to_string(), Value::Array(Vec::new()));
                if scope == ClearScope::HistoryAndQueue {
                    dropped = PendingSyncQueue::from_value(data.get(PENDING_SYNC_KEY)).len();
                    data.insert(PENDING_SYNC_KEY.to_string(), Value::Array(Vec::new()));
                }
            }))
            .await?;
        self.evicted += dropped as u64;
        info!(?scope, "Usage data cleared");
        Ok(())
    }

    async fn bind_identity(&self, uid: Option<String>) -> Result<(), StoreError> {
        match uid.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            Some(uid) => {
                let mut items = Record::new();
                items.insert(IDENTITY_KEY.to_string(), Value::String(uid.clone()));
                self.kv.set(items).await?;
                info!(%uid, "Identity bound");
            }
            None => {
                self.kv.remove(&[IDENTITY_KEY]).await?;
                info!("Identity unbound");
            }
        }
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<Result<DrainBatch, DrainOutcome>, StoreError> {
        if self.in_flight.strong_count() > 0 {
            return Ok(Err(DrainOutcome::InFlight));
        }
        let data = self.kv.get(&[PENDING_SYNC_KEY, IDENTITY_KEY]).await?;
        let Some(uid) = identity_of(&data) else {
            return Ok(Err(DrainOutcome::NotSignedIn));
        };
        let queue = PendingSyncQueue::from_value(data.get(PENDING_SYNC_KEY));
        if queue.is_empty() {
            return Ok(Err(DrainOutcome::NothingPending));
        }
        let claim = Arc::new(());
        self.in_flight = Arc::downgrade(&claim);
        Ok(Ok(DrainBatch {
            uid,
            count: queue.len(),
            evicted_mark: self.evicted,
            increment: queue.batch(),
            _claim: claim,
        }))
    }

    async fn commit(&mut self, batch: DrainBatch) -> Result<(), StoreError> {
        let gone = usize::try_from(self.evicted - batch.evicted_mark).unwrap_or(usize::MAX);
        let remove = batch.count.saturating_sub(gone);
        let mut remaining = 0;

        self.kv
            .update(Box::new(|data: &mut Record| {
                let mut queue = PendingSyncQueue::from_value(data.get(PENDING_SYNC_KEY));
                queue.remove_front(remove);
                remaining = queue.len();
                data.insert(PENDING_SYNC_KEY.to_string(), queue.to_value());
            }))
            .await?;
        self.evicted += remove as u64;
        debug!(removed = remove, remaining, "Sync queue trimmed");
        Ok(())
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Entry point for spawning the event store.
pub struct EventStore;

impl EventStore {
    /// Spawns the actor over `kv` and returns a handle to it.
    ///
    /// The actor stops once every handle has been dropped.
    pub fn spawn(kv: Arc<dyn KeyValueStore>) -> EventStoreHandle {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let actor = StoreActor {
            kv: Arc::clone(&kv),
            evicted: 0,
            in_flight: Weak::new(),
        };
        tokio::spawn(actor.run(rx));
        EventStoreHandle { tx, kv }
    }
}

/// Cloneable handle to the event store.
#[derive(Clone)]
pub struct EventStoreHandle {
    tx: mpsc::Sender<StoreCommand>,
    kv: Arc<dyn KeyValueStore>,
}

impl EventStoreHandle {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> StoreCommand,
    ) -> Result<T, StoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .await
            .map_err(|_| StoreError::ActorClosed)?;
        rx.await.map_err(|_| StoreError::ActorClosed)?
    }

    /// Appends an event to the history and, when signed in, the sync queue.
    pub async fn append(&self, event: UsageEvent) -> Result<(), StoreError> {
        self.request(|reply| StoreCommand::Append { event, reply }).await
    }

    /// Appends the event carried by a usage message.
    pub async fn append_message(&self, message: UsageMessage) -> Result<(), StoreError> {
        self.append(message.into_event()).await
    }

    /// Returns the full history, oldest first.
    pub async fn get_all(&self) -> Result<Vec<UsageEvent>, StoreError> {
        self.request(|reply| StoreCommand::GetAll { reply }).await
    }

    /// Clears stored usage.
    pub async fn clear(&self, scope: ClearScope) -> Result<(), StoreError> {
        self.request(|reply| StoreCommand::Clear { scope, reply }).await
    }

    /// Binds (or with `None`, unbinds) the uid that keys the remote
    /// aggregate. Events are queued for sync only while bound.
    pub async fn bind_identity(&self, uid: Option<String>) -> Result<(), StoreError> {
        self.request(|reply| StoreCommand::BindIdentity { uid, reply })
            .await
    }

    /// Returns the bound uid.
    pub async fn identity(&self) -> Result<Option<String>, StoreError> {
        self.request(|reply| StoreCommand::Identity { reply }).await
    }

    /// Returns the queued sync records, oldest first.
    pub async fn pending(&self) -> Result<Vec<SyncRecord>, StoreError> {
        self.request(|reply| StoreCommand::Pending { reply }).await
    }

    /// Sends the pending queue to `remote` as one increment.
    ///
    /// On success exactly the records sent are removed; records appended
    /// meanwhile stay queued. On failure the queue is left untouched. While
    /// one drain waits on the remote, others return
    /// [`DrainOutcome::InFlight`] without sending anything.
    pub async fn drain(&self, remote: &dyn AggregateStore) -> Result<DrainOutcome, StoreError> {
        let batch = match self.request(|reply| StoreCommand::Snapshot { reply }).await? {
            Ok(batch) => batch,
            Err(outcome) => return Ok(outcome),
        };

        let records = batch.count;
        let tokens = batch.increment.total_tokens;
        if let Err(e) = remote.apply_increment(&batch.uid, &batch.increment).await {
            warn!(error = %e, records, "Sync failed, keeping queue");
            return Err(e.into());
        }

        self.request(|reply| StoreCommand::Commit { batch, reply })
            .await?;
        info!(records, tokens, "Synced usage");
        Ok(DrainOutcome::Synced { records, tokens })
    }

    /// Subscribes to store change notifications.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.kv.subscribe()
    }

    /// Appends every message received on `messages` until the channel
    /// closes.
    pub fn forward(&self, mut messages: mpsc::UnboundedReceiver<UsageMessage>) -> JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                if let Err(e) = handle.append_message(message).await {
                    warn!(error = %e, "Failed to store usage event");
                }
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
