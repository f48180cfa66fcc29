//! Shared key/value store used for response caching and cross-instance coordination
//!
//! The store itself is an external collaborator (Redis in production). Anything
//! implementing [`CacheStore`] is assumed to make each call atomic, so no
//! locking happens on this side of the trait.

pub mod memory;

pub use memory::MemoryStore;

use crate::errors::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store without expiry
    async fn set(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Store only if the key is absent. Returns whether the value was written.
    async fn set_if_absent(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool>;

    /// Delete only if the current value equals `expected`. Returns whether a delete happened.
    async fn delete_if_equals(&self, key: &str, expected: &[u8]) -> Result<bool>;
}

/// Build a namespaced cache key from its parts
pub fn key(parts: &[&str]) -> String {
    parts.join(":")
}

pub async fn get_json<T: DeserializeOwned>(store: &dyn CacheStore, key: &str) -> Result<Option<T>> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Option<Duration>,
) -> Result<()> {
    let raw = serde_json::to_vec(value)?;
    match ttl {
        Some(ttl) => store.set_with_ttl(key, raw, ttl).await,
        None => store.set(key, raw).await,
    }
}
