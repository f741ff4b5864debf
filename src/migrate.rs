use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::store::sqlite;

/// Creates the key-value schema in the configured database file.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = sqlite::connect(&config.store).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotent schema creation on an already-open pool.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Plain string values with an absolute expiry (unix seconds)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_entries (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            expires_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // List members; the highest seq is the head of the list
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kv_list_members (
            list_key TEXT NOT NULL,
            seq INTEGER NOT NULL,
            member TEXT NOT NULL,
            PRIMARY KEY (list_key, seq)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_kv_entries_expires_at ON kv_entries(expires_at)")
        .execute(pool)
        .await?;

    Ok(())
}
