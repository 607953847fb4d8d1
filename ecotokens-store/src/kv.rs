//! Key-value persistence boundary.
//!
//! Every piece of local state is a JSON value under a string key. Writers
//! bump a version number on a `watch` channel so readers know to re-read.
//! Read-modify-write sequences go through [`KeyValueStore::update`] so that
//! no other writer can slip in between the read and the write.

use async_trait::async_trait;
use fs2::FileExt;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::error::StoreError;
use crate::persistence::{default_store_path, ensure_dir, save_json};

/// A set of keys and their values.
pub type Record = Map<String, Value>;

/// An in-place edit of the whole stored record.
pub type Mutation<'a> = Box<dyn FnOnce(&mut Record) + Send + 'a>;

/// Local key-value storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns the values stored under `keys`. Missing keys are absent
    /// from the result.
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError>;

    /// Stores every entry of `items`, replacing existing values.
    async fn set(&self, items: Record) -> Result<(), StoreError>;

    /// Removes `keys`.
    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError>;

    /// Reads the record, applies `f`, and writes the result back as one
    /// step. Writers in this process and in others wait for it to finish.
    async fn update<'a>(&'a self, f: Mutation<'a>) -> Result<(), StoreError>;

    /// Subscribes to change notifications. The value is a version number
    /// that increases on every write.
    fn subscribe(&self) -> watch::Receiver<u64>;
}

/// Convenience for single-key reads.
pub async fn get_one(kv: &dyn KeyValueStore, key: &str) -> Result<Option<Value>, StoreError> {
    Ok(kv.get(&[key]).await?.remove(key))
}

/// Convenience for single-key writes.
pub async fn set_one(kv: &dyn KeyValueStore, key: &str, value: Value) -> Result<(), StoreError> {
    let mut items = Record::new();
    items.insert(key.to_string(), value);
    kv.set(items).await
}

fn bump(notify: &watch::Sender<u64>) {
    notify.send_modify(|version| *version += 1);
}

fn select(data: &Record, keys: &[&str]) -> Record {
    keys.iter()
        .filter_map(|k| data.get(*k).map(|v| ((*k).to_string(), v.clone())))
        .collect()
}

// ============================================================================
// Memory Store
// ============================================================================

/// In-process store. Contents are lost on drop.
#[derive(Debug)]
pub struct MemoryStore {
    data: RwLock<Record>,
    notify: watch::Sender<u64>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            data: RwLock::new(Record::new()),
            notify,
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError> {
        Ok(select(&*self.data.read().await, keys))
    }

    async fn set(&self, items: Record) -> Result<(), StoreError> {
        self.data.write().await.extend(items);
        bump(&self.notify);
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut data = self.data.write().await;
        for key in keys {
            data.remove(*key);
        }
        bump(&self.notify);
        Ok(())
    }

    async fn update<'a>(&'a self, f: Mutation<'a>) -> Result<(), StoreError> {
        f(&mut *self.data.write().await);
        bump(&self.notify);
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }
}

// ============================================================================
// File Lock
// ============================================================================

/// Exclusive advisory lock on a sidecar file. Released on drop.
#[derive(Debug)]
struct FileLock {
    file: File,
}

impl FileLock {
    /// Blocks (off the async workers) until the lock at `path` is ours.
    async fn acquire(path: PathBuf) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent).await?;
        }
        let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .read(true)
                .write(true)
                .open(&path)?;
            FileExt::lock_exclusive(&file)?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;
        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

// ============================================================================
// JSON File Store
// ============================================================================

/// Store backed by a single JSON object file.
///
/// The file is re-read on every access so several processes can share it.
/// Every write holds an exclusive lock on `<file>.lock` from the read to the
/// rename, so concurrent writers never lose each other's changes.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
    notify: watch::Sender<u64>,
}

impl JsonFileStore {
    /// Opens (lazily) the store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (notify, _) = watch::channel(0);
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            notify,
        }
    }

    /// Opens the store at the default location.
    pub fn open_default() -> Self {
        Self::new(default_store_path())
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".lock");
        PathBuf::from(name)
    }

    async fn load(&self) -> Result<Record, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Record::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Record::new());
        }
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(StoreError::Corrupt(format!(
                "{} holds {} instead of an object",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }

    async fn modify(&self, f: impl FnOnce(&mut Record) + Send) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let lock = FileLock::acquire(self.lock_path()).await?;
        let mut data = self.load().await?;
        f(&mut data);
        save_json(&self.path, &data).await?;
        drop(lock);
        bump(&self.notify);
        Ok(())
    }

    /// Polls the file's modification time and notifies subscribers when
    /// another process changes it.
    pub fn watch_external(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut last = modified(&self.path).await;
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let current = modified(&self.path).await;
                if current != last {
                    trace!(path = %self.path.display(), "Store file changed");
                    last = current;
                    bump(&self.notify);
                }
            }
        })
    }
}

async fn modified(path: &Path) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError> {
        Ok(select(&self.load().await?, keys))
    }

    async fn set(&self, items: Record) -> Result<(), StoreError> {
        let keys = items.len();
        self.modify(move |data| data.extend(items)).await?;
        debug!(keys, "Store updated");
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<(), StoreError> {
        let owned: Vec<String> = keys.iter().map(|k| (*k).to_string()).collect();
        self.modify(move |data| {
            for key in &owned {
                data.remove(key);
            }
        })
        .await
        .inspect_err(|e| warn!(error = %e, "Failed to remove keys"))
    }

    async fn update<'a>(&'a self, f: Mutation<'a>) -> Result<(), StoreError> {
        self.modify(f).await
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.notify.subscribe()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn exercise(kv: &dyn KeyValueStore) {
        let mut rx = kv.subscribe();
        let start = *rx.borrow_and_update();

        set_one(kv, "a", json!(1)).await.unwrap();
        set_one(kv, "b", json!([1, 2])).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), start + 2);

        let got = kv.get(&["a", "b", "missing"]).await.unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got["b"], json!([1, 2]));

        kv.remove(&["a"]).await.unwrap();
        assert_eq!(get_one(kv, "a").await.unwrap(), None);
        assert_eq!(get_one(kv, "b").await.unwrap(), Some(json!([1, 2])));

        kv.update(Box::new(|data: &mut Record| {
            let len = data.len();
            data.insert("c".into(), json!(len));
        }))
        .await
        .unwrap();
        assert_eq!(get_one(kv, "c").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_json_file_store() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(dir.path().join("store.json"));
        exercise(&store).await;

        // A second handle on the same file sees the same data.
        let other = JsonFileStore::new(store.path());
        assert_eq!(get_one(&other, "b").await.unwrap(), Some(json!([1, 2])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_updates_from_separate_handles_are_not_lost() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let stores = [Arc::new(JsonFileStore::new(&path)), Arc::new(JsonFileStore::new(&path))];

        let tasks: Vec<_> = (0..40)
            .map(|i| {
                let store = Arc::clone(&stores[i % 2]);
                tokio::spawn(async move {
                    store
                        .update(Box::new(|data: &mut Record| {
                            let n = data.get("n").and_then(Value::as_u64).unwrap_or(0);
                            data.insert("n".into(), json!(n + 1));
                        }))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(get_one(stores[0].as_ref(), "n").await.unwrap(), Some(json!(40)));
        assert!(dir.path().join("store.json.lock").exists());
    }

    #[tokio::test]
    async fn test_json_file_store_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        tokio::fs::write(&path, "[1,2,3]").await.unwrap();
        let store = JsonFileStore::new(&path);
        assert!(matches!(store.get(&["a"]).await, Err(StoreError::Corrupt(_))));

        tokio::fs::write(&path, "").await.unwrap();
        assert!(store.get(&["a"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_external_changes_notify() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = Arc::new(JsonFileStore::new(&path));
        let mut rx = store.subscribe();
        let watcher = Arc::clone(&store).watch_external(Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let writer = JsonFileStore::new(&path);
        set_one(&writer, "k", json!("v")).await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .unwrap()
            .unwrap();
        watcher.abort();
    }
}
