//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// SQLite busy timeout applied to every pooled connection.
/// Lock waits beyond this surface as "database is locked" and are handled by
/// the service-level retry loop.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection pool and create tables if needed.
///
/// WAL journal mode allows concurrent readers with one writer; foreign keys
/// and the busy timeout are set per-connection through the connect options so
/// that connections opened later by the pool behave identically.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        tracing::info!("Initialized new database: {}", db_path.display());
    } else {
        tracing::info!("Opened existing database: {}", db_path.display());
    }

    // Schema creation is idempotent - safe to call multiple times
    create_records_table(&pool).await?;
    create_orders_table(&pool).await?;

    Ok(pool)
}

/// Create the records table
///
/// Holds catalog attributes plus the mutable quantity-on-hand counter.
/// The `qty >= 0` CHECK backs the no-negative-stock invariant at the
/// schema level; `track_list` is a JSON text column written wholesale by
/// enrichment.
pub async fn create_records_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            guid TEXT PRIMARY KEY,
            artist TEXT NOT NULL,
            album TEXT NOT NULL,
            price REAL NOT NULL,
            qty INTEGER NOT NULL DEFAULT 0,
            format TEXT NOT NULL CHECK (format IN ('Vinyl', 'CD', 'Cassette', 'Digital')),
            category TEXT NOT NULL CHECK (category IN ('Rock', 'Jazz', 'Hip-Hop', 'Classical', 'Pop', 'Alternative', 'Indie', 'Dance')),
            mbid TEXT,
            track_list TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (price >= 0.0),
            CHECK (qty >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_artist ON records(artist)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_album ON records(album)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_category ON records(category)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the orders table
///
/// Append-only; rows are inserted in the same transaction as the paired
/// stock decrement and never updated afterwards.
pub async fn create_orders_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS orders (
            guid TEXT PRIMARY KEY,
            record_id TEXT NOT NULL REFERENCES records(guid),
            qty INTEGER NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            CHECK (qty > 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_record_id ON orders(record_id)")
        .execute(pool)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("spindle.db")).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_init_creates_tables() {
        let (_dir, pool) = setup().await;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert!(names.contains(&"records"));
        assert!(names.contains(&"orders"));
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("spindle.db");

        let pool = init_database(&db_path).await.unwrap();
        drop(pool);
        // Second open against the same file must not fail
        init_database(&db_path).await.unwrap();
    }

    #[tokio::test]
    async fn test_negative_qty_rejected_by_schema() {
        let (_dir, pool) = setup().await;

        let result = sqlx::query(
            "INSERT INTO records (guid, artist, album, price, qty, format, category)
             VALUES ('g1', 'a', 'b', 10.0, -1, 'Vinyl', 'Rock')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_format_rejected_by_schema() {
        let (_dir, pool) = setup().await;

        let result = sqlx::query(
            "INSERT INTO records (guid, artist, album, price, qty, format, category)
             VALUES ('g1', 'a', 'b', 10.0, 1, '8-Track', 'Rock')",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_order_requires_existing_record() {
        let (_dir, pool) = setup().await;

        let result = sqlx::query(
            "INSERT INTO orders (guid, record_id, qty) VALUES ('o1', 'missing', 1)",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_zero_qty_order_rejected_by_schema() {
        let (_dir, pool) = setup().await;

        sqlx::query(
            "INSERT INTO records (guid, artist, album, price, qty, format, category)
             VALUES ('g1', 'a', 'b', 10.0, 1, 'Vinyl', 'Rock')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let result = sqlx::query(
            "INSERT INTO orders (guid, record_id, qty) VALUES ('o1', 'g1', 0)",
        )
        .execute(&pool)
        .await;

        assert!(result.is_err());
    }
}
