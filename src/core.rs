//! Core domain types and service traits for sigrelay
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the application.

use crate::errors::{StoreError, TransportError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

/// An opaque chat/recipient identifier.
pub type SubscriberId = String;

/// An inbound alert, as posted by TradingView or any other webhook source.
///
/// Only `message` is read; everything else in the body is ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct AlertPayload {
    #[serde(default)]
    pub message: Option<Value>,
}

impl AlertPayload {
    /// Creates a payload carrying a plain text message.
    pub fn with_message(text: impl Into<String>) -> Self {
        Self {
            message: Some(Value::String(text.into())),
        }
    }

    /// Returns the text to broadcast, or `default` if the payload has none.
    ///
    /// Non-string values are rendered as their JSON text.
    pub fn message_or<'a>(&'a self, default: &'a str) -> std::borrow::Cow<'a, str> {
        match &self.message {
            None | Some(Value::Null) => default.into(),
            Some(Value::String(text)) => text.as_str().into(),
            Some(other) => other.to_string().into(),
        }
    }
}

/// The result of a subscribe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Subscribed,
    AlreadySubscribed,
}

/// The result of an unsubscribe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Unsubscribed,
    NotFound,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Delivers a text message to a single recipient.
#[async_trait]
pub trait Transport: Send + Sync {
    /// A short name for the transport (e.g., "telegram"), used in logs.
    fn name(&self) -> &str;

    /// Sends `text` to `recipient`.
    ///
    /// # Returns
    /// * `Ok(())` once the messaging service accepted the message
    /// * `Err` for network errors, timeouts and API rejections
    async fn send(&self, recipient: &str, text: &str) -> Result<(), TransportError>;
}

/// Loads and saves the full subscriber set.
#[async_trait]
pub trait SubscriberStorage: Send + Sync {
    /// Reads the persisted set.
    ///
    /// Never fails: missing storage yields an empty set, and unreadable or
    /// corrupt storage is logged and also yields an empty set.
    async fn load(&self) -> HashSet<SubscriberId>;

    /// Overwrites the persisted set with `subscribers`.
    async fn save(&self, subscribers: &HashSet<SubscriberId>) -> Result<(), StoreError>;
}
