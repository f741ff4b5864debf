//! SQLite-backed [`KvStore`] implementation.
//!
//! Values live in `kv_entries` with an absolute `expires_at` (unix seconds);
//! expired rows are invisible to reads and removed by
//! [`purge_expired`](KvStore::purge_expired). List members live in
//! `kv_list_members`, ordered by a per-list sequence number whose largest
//! value is the head.
//!
//! Every write is a single statement or a transaction that opens with a
//! write, so concurrent writers queue on the busy timeout instead of
//! failing a read-to-write lock upgrade.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use super::KvStore;
use crate::config::{Config, StoreConfig};
use crate::migrate;

pub struct SqliteKvStore {
    pool: SqlitePool,
}

impl SqliteKvStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to the configured database and ensures the schema exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = connect(&config.store).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }
}

/// Opens a WAL-mode pool on the store file, creating file and parent
/// directory if needed.
pub async fn connect(store: &StoreConfig) -> Result<SqlitePool> {
    if let Some(parent) = store.path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", store.path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(store.busy_timeout_secs));

    let pool = SqlitePoolOptions::new()
        .max_connections(store.max_connections)
        .connect_with(options)
        .await?;

    Ok(pool)
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

fn expiry_ts(ttl: Duration) -> i64 {
    now_ts().saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX))
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expiry_ts(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_entries WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now_ts())
                .fetch_optional(&self.pool)
                .await?;
        Ok(value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT key, value FROM kv_entries WHERE expires_at > ");
        qb.push_bind(now_ts());
        qb.push(" AND key IN (");
        let mut separated = qb.separated(", ");
        for key in keys {
            separated.push_bind(key);
        }
        separated.push_unseparated(")");

        let rows = qb.build().fetch_all(&self.pool).await?;
        let mut found: HashMap<String, String> = HashMap::with_capacity(rows.len());
        for row in rows {
            found.insert(row.get("key"), row.get("value"));
        }

        Ok(keys.iter().map(|k| found.get(k).cloned()).collect())
    }

    async fn push_capped(&self, list: &str, member: &str, capacity: usize) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // The transaction's first statement takes the write lock
        sqlx::query(
            r#"
            INSERT INTO kv_list_members (list_key, seq, member)
            SELECT ?, COALESCE(MAX(seq), 0) + 1, ?
            FROM kv_list_members
            WHERE list_key = ?
            "#,
        )
        .bind(list)
        .bind(member)
        .bind(list)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM kv_list_members
            WHERE list_key = ?
              AND seq NOT IN (
                  SELECT seq FROM kv_list_members
                  WHERE list_key = ?
                  ORDER BY seq DESC
                  LIMIT ?
              )
            "#,
        )
        .bind(list)
        .bind(list)
        .bind(i64::try_from(capacity).unwrap_or(i64::MAX))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_range(&self, list: &str) -> Result<Vec<String>> {
        let members: Vec<String> = sqlx::query_scalar(
            "SELECT member FROM kv_list_members WHERE list_key = ? ORDER BY seq DESC",
        )
        .bind(list)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    async fn purge_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE expires_at <= ?")
            .bind(now_ts())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
