//! Key-value storage with per-record expiry.
//!
//! The [`KvStore`] trait is the only persistence surface the request
//! handlers see. It models a small subset of a managed key-value service:
//! string values with a time-to-live, batched reads, and one capped
//! most-recent-first list.
//!
//! | Key | Value | TTL |
//! |-----|-------|-----|
//! | `content:<id>` | ContentItem JSON | 7 days |
//! | `analysis:<id>` | AnalysisResult JSON | 30 days |
//! | `saved:<id>` | archived result JSON | 90 days |
//! | `saved_results_list` | list of saved ids, head = newest | none |
//!
//! Lists and records are independent: trimming a list never deletes the
//! records its members point at, and an expired record may still be listed.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

pub use memory::InMemoryKvStore;
pub use sqlite::SqliteKvStore;

/// List holding the identifiers of archived results, newest first.
pub const SAVED_RESULTS_LIST: &str = "saved_results_list";

pub fn content_key(id: &str) -> String {
    format!("content:{}", id)
}

pub fn analysis_key(id: &str) -> String {
    format!("analysis:{}", id)
}

pub fn saved_key(id: &str) -> String {
    format!("saved:{}", id)
}

/// Abstract key-value backend.
///
/// Implementations must be `Send + Sync`; a single instance is shared by
/// every request handler for the lifetime of the server.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value, expiring
    /// after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Read a live value. Expired keys read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Read several keys in one round trip. The result is positional:
    /// `out[i]` belongs to `keys[i]`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Insert `member` at the head of `list`, then trim the list to its
    /// first `capacity` members. Both steps happen atomically.
    async fn push_capped(&self, list: &str, member: &str, capacity: usize) -> Result<()>;

    /// Every member of `list`, head first. A missing list is empty.
    async fn list_range(&self, list: &str) -> Result<Vec<String>>;

    /// Drop expired records and return how many were removed.
    async fn purge_expired(&self) -> Result<u64>;

    /// Release backend resources. Called once at shutdown.
    async fn close(&self) {}
}

/// Serialize `value` as JSON and store it with [`KvStore::set_ex`].
pub async fn put_json<T: Serialize + ?Sized>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<()> {
    let encoded = serde_json::to_string(value)?;
    store.set_ex(key, &encoded, ttl).await
}
