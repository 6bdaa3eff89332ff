//! sigrelay - relays webhook trading alerts to subscribed Telegram chats
//!
//! This library provides the subscriber store, the fan-out relay, the
//! Telegram transport and the HTTP surface that ties them together.

pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod errors;
pub mod internal_metrics;
pub mod relay;
pub mod server;
pub mod store;
pub mod telegram;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-export core types for convenience
pub use crate::core::*;
