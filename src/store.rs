//! The subscriber store and its JSON file backend.
//!
//! `SubscriberStore` owns the in-memory subscriber set. Readers take a cheap
//! `ArcSwap` snapshot and never wait on writers; mutations are serialized by
//! an async mutex that is held across the whole modify-then-save cycle.

use crate::core::{SubscribeOutcome, SubscriberId, SubscriberStorage, UnsubscribeOutcome};
use crate::errors::StoreError;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument};

/// Persists the subscriber set as a flat JSON array of strings.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SubscriberStorage for JsonFileStorage {
    async fn load(&self) -> HashSet<SubscriberId> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No subscriber file found, starting empty.");
                return HashSet::new();
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to read subscriber file. Starting empty.");
                return HashSet::new();
            }
        };

        match serde_json::from_slice::<Vec<SubscriberId>>(&bytes) {
            Ok(ids) => {
                let subscribers: HashSet<_> = ids.into_iter().collect();
                info!(path = %self.path.display(), count = subscribers.len(), "Loaded subscribers.");
                subscribers
            }
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Subscriber file is corrupt. Resetting subscriptions.");
                HashSet::new()
            }
        }
    }

    async fn save(&self, subscribers: &HashSet<SubscriberId>) -> Result<(), StoreError> {
        let mut ids: Vec<&SubscriberId> = subscribers.iter().collect();
        ids.sort();
        let body = serde_json::to_vec(&ids)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        // Write-then-rename keeps the previous file intact if the write dies halfway.
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), count = ids.len(), "Saved subscribers.");
        Ok(())
    }
}

/// The process-wide set of subscribers.
pub struct SubscriberStore {
    current: ArcSwap<HashSet<SubscriberId>>,
    write_lock: Mutex<()>,
    storage: Arc<dyn SubscriberStorage>,
}

impl std::fmt::Debug for SubscriberStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriberStore")
            .field("count", &self.len())
            .finish_non_exhaustive()
    }
}

impl SubscriberStore {
    /// Creates a store seeded from whatever `storage` currently holds.
    pub async fn open(storage: Arc<dyn SubscriberStorage>) -> Self {
        let initial = storage.load().await;
        metrics::gauge!("subscribers").set(initial.len() as f64);
        Self {
            current: ArcSwap::from_pointee(initial),
            write_lock: Mutex::new(()),
            storage,
        }
    }

    /// Returns the current subscriber set without waiting on writers.
    pub fn snapshot(&self) -> Arc<HashSet<SubscriberId>> {
        self.current.load_full()
    }

    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.current.load().contains(id)
    }

    /// Adds `id` to the set and persists the result.
    ///
    /// A persistence failure is logged but does not undo the in-memory change.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, id: &str) -> Result<SubscribeOutcome, StoreError> {
        let id = normalize(id)?;
        let _guard = self.write_lock.lock().await;

        let current = self.current.load_full();
        if current.contains(id) {
            debug!("Subscriber already present.");
            return Ok(SubscribeOutcome::AlreadySubscribed);
        }

        let mut next = (*current).clone();
        next.insert(id.to_string());
        self.commit(next).await;
        info!("Subscriber added.");
        Ok(SubscribeOutcome::Subscribed)
    }

    /// Removes `id` from the set and persists the result.
    #[instrument(skip(self))]
    pub async fn unsubscribe(&self, id: &str) -> Result<UnsubscribeOutcome, StoreError> {
        let id = normalize(id)?;
        let _guard = self.write_lock.lock().await;

        let current = self.current.load_full();
        if !current.contains(id) {
            debug!("Subscriber not present.");
            return Ok(UnsubscribeOutcome::NotFound);
        }

        let mut next = (*current).clone();
        next.remove(id);
        self.commit(next).await;
        info!("Subscriber removed.");
        Ok(UnsubscribeOutcome::Unsubscribed)
    }

    /// Publishes `next` to readers, then writes it to storage.
    ///
    /// Must be called with `write_lock` held.
    async fn commit(&self, next: HashSet<SubscriberId>) {
        let next = Arc::new(next);
        self.current.store(next.clone());
        metrics::gauge!("subscribers").set(next.len() as f64);

        if let Err(e) = self.storage.save(&next).await {
            metrics::counter!("subscriber_persist_failures_total").increment(1);
            error!(error = %e, "Failed to persist subscribers. In-memory set still holds the change.");
        }
    }
}

fn normalize(id: &str) -> Result<&str, StoreError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(StoreError::EmptyId);
    }
    Ok(id)
}
