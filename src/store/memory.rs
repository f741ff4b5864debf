//! In-memory [`KvStore`] implementation for tests.
//!
//! Uses `HashMap` and `VecDeque` behind `std::sync::RwLock`. Expiry is
//! checked against `Instant::now()` on every read.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::KvStore;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

pub struct InMemoryKvStore {
    entries: RwLock<HashMap<String, Entry>>,
    lists: RwLock<HashMap<String, VecDeque<String>>>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            lists: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let entries = self.entries.read().map_err(poisoned)?;
        let now = Instant::now();
        Ok(keys
            .iter()
            .map(|k| {
                entries
                    .get(k)
                    .filter(|e| e.is_live(now))
                    .map(|e| e.value.clone())
            })
            .collect())
    }

    async fn push_capped(&self, list: &str, member: &str, capacity: usize) -> Result<()> {
        let mut lists = self.lists.write().map_err(poisoned)?;
        let members = lists.entry(list.to_string()).or_default();
        members.push_front(member.to_string());
        members.truncate(capacity);
        Ok(())
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        let lists = self.lists.read().map_err(poisoned)?;
        Ok(lists
            .get(list)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn purge_expired(&self) -> Result<u64> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok((before - entries.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zero_ttl_reads_as_missing() {
        let store = InMemoryKvStore::new();
        store.set_ex("k", "v", Duration::ZERO).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.purge_expired().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn get_many_is_positional() {
        let store = InMemoryKvStore::new();
        let ttl = Duration::from_secs(60);
        store.set_ex("a", "1", ttl).await.unwrap();
        store.set_ex("c", "3", ttl).await.unwrap();

        let keys = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let values = store.get_many(&keys).await.unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn push_capped_keeps_newest_first() {
        let store = InMemoryKvStore::new();
        for i in 0..5 {
            store.push_capped("l", &i.to_string(), 3).await.unwrap();
        }
        assert_eq!(store.list_range("l").await.unwrap(), vec!["4", "3", "2"]);
        assert!(store.list_range("missing").await.unwrap().is_empty());
    }
}
