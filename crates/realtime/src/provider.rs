//! # Provider
//!
//! Provider defines external data interfaces for the crate.

use std::collections::HashMap;

use anyhow::Result;

/// Metadata header carrying the broker partition key.
pub const KEY_HEADER: &str = "key";

/// Message represents a message to be published.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Message {
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self { topic: topic.into(), payload: payload.to_vec(), headers: HashMap::new() }
    }

    /// Attach the partition key used by the broker to preserve ordering.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.headers.insert(KEY_HEADER.to_string(), key.into());
        self
    }

    /// The partition key, when one was attached.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.headers.get(KEY_HEADER).map(String::as_str)
    }
}

/// The `Broker` trait defines the message publishing behavior.
///
/// Implementations deliver at least once and preserve ordering between
/// messages that share a partition key.
pub trait Broker: Send + Sync {
    /// Hand a message to the broker for delivery.
    fn send(&self, message: &Message) -> impl Future<Output = Result<()>> + Send;
}
