//! Fake transport and storage for exercising the relay without Telegram or disk.

use crate::{
    core::{SubscriberId, SubscriberStorage, Transport},
    errors::{StoreError, TransportError},
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Fake transport that records every send.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<(String, String)>>>,
    // Recipients that should fail, and the error they fail with.
    failures: Arc<Mutex<HashMap<String, TransportError>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send to `recipient` fail with `error`.
    pub fn fail_for(&self, recipient: &str, error: TransportError) {
        self.failures
            .lock()
            .unwrap()
            .insert(recipient.to_string(), error);
    }

    /// All `(recipient, text)` pairs sent so far, in the order `send` was called.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Get the number of times `recipient` was sent to
    pub fn send_count(&self, recipient: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == recipient)
            .count()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        match self.failures.lock().unwrap().get(recipient) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// In-memory storage, optionally refusing writes.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    saved: Arc<Mutex<HashSet<SubscriberId>>>,
    fail_saves: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A storage whose every save returns an I/O error.
    pub fn failing() -> Self {
        Self {
            fail_saves: true,
            ..Self::default()
        }
    }

    pub fn saved(&self) -> HashSet<SubscriberId> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriberStorage for MemoryStorage {
    async fn load(&self) -> HashSet<SubscriberId> {
        self.saved.lock().unwrap().clone()
    }

    async fn save(&self, subscribers: &HashSet<SubscriberId>) -> Result<(), StoreError> {
        if self.fail_saves {
            return Err(StoreError::Io(std::io::Error::other("storage unavailable")));
        }
        *self.saved.lock().unwrap() = subscribers.clone();
        Ok(())
    }
}
