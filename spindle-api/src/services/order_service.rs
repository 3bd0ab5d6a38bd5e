//! Order placement
//!
//! The one code path allowed to decrement quantity-on-hand. Placement is a
//! linear pipeline: validate input, read the record, reject obviously
//! insufficient stock, then decrement and insert the order inside a single
//! transaction. The in-transaction decrement carries a `qty >= ?`
//! precondition, so two placements racing for the same stock can never drive
//! the counter negative - the loser's UPDATE matches zero rows and the whole
//! transaction is rolled back.

use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use spindle_common::db::{Order, Record};
use spindle_common::{Error, Result};

use crate::utils::db_retry::retry_on_lock;

/// Maximum quantity accepted for a single order
pub const MAX_ORDER_QTY: i64 = 100;

/// Maximum total time spent retrying lock contention before surfacing it
const MAX_LOCK_WAIT_MS: u64 = 5000;

/// A committed order with its record reference resolved to the
/// post-decrement state
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub guid: String,
    pub qty: i64,
    pub record: Record,
    pub created_at: NaiveDateTime,
}

/// Order placement coordinator
#[derive(Clone)]
pub struct OrderService {
    db: SqlitePool,
}

impl OrderService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Place an order for `qty` units of the record identified by `record_id`.
    ///
    /// Fails with `InvalidInput` before any store access when the quantity is
    /// out of range or the id is not a UUID; with `NotFound` when the record
    /// does not exist; with `InsufficientStock` when stock cannot cover the
    /// request (whether caught by the cheap pre-check or by the
    /// in-transaction re-validation - callers cannot tell which).
    /// Lock contention is retried from the top with bounded backoff.
    pub async fn place(&self, record_id: &str, qty: i64) -> Result<PlacedOrder> {
        if qty < 1 {
            return Err(Error::InvalidInput(format!(
                "Order quantity must be positive, got {}",
                qty
            )));
        }
        if qty > MAX_ORDER_QTY {
            return Err(Error::InvalidInput(format!(
                "Order quantity must be at most {}, got {}",
                MAX_ORDER_QTY, qty
            )));
        }
        let record_guid = Uuid::parse_str(record_id)
            .map_err(|_| Error::InvalidInput(format!("Invalid record id: {}", record_id)))?
            .to_string();

        retry_on_lock("order placement", MAX_LOCK_WAIT_MS, || {
            self.try_place(&record_guid, qty)
        })
        .await
    }

    /// One full read-check-write pass
    async fn try_place(&self, record_guid: &str, qty: i64) -> Result<PlacedOrder> {
        // Cheap pre-check outside the transaction: rejects the common
        // insufficient-stock case without taking the write lock. Not a
        // correctness guard - that is the conditional UPDATE below.
        let record = super::fetch_record(&self.db, record_guid).await?;
        if record.qty < qty {
            return Err(Error::InsufficientStock {
                requested: qty,
                available: record.qty,
            });
        }

        let mut tx = self.db.begin().await?;

        // Conditional decrement: re-validates stock under the transaction.
        // A zero-row match means a concurrent placement consumed the stock
        // between the read above and this write.
        let result = sqlx::query(
            "UPDATE records
             SET qty = qty - ?, updated_at = CURRENT_TIMESTAMP
             WHERE guid = ? AND qty >= ?",
        )
        .bind(qty)
        .bind(record_guid)
        .bind(qty)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;

            let available: i64 = sqlx::query_scalar("SELECT qty FROM records WHERE guid = ?")
                .bind(record_guid)
                .fetch_optional(&self.db)
                .await?
                .unwrap_or(0);

            tracing::debug!(
                record = %record_guid,
                requested = qty,
                available,
                "Lost stock race, placement rejected"
            );

            return Err(Error::InsufficientStock {
                requested: qty,
                available,
            });
        }

        let order_guid = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO orders (guid, record_id, qty) VALUES (?, ?, ?)")
            .bind(&order_guid)
            .bind(record_guid)
            .bind(qty)
            .execute(&mut *tx)
            .await?;

        // Any failure above drops `tx`, which rolls the decrement back;
        // neither write is visible unless both committed.
        tx.commit().await?;

        tracing::info!(
            order = %order_guid,
            record = %record_guid,
            qty,
            "Order placed"
        );

        let order: Order = sqlx::query_as(
            "SELECT guid, record_id, qty, created_at FROM orders WHERE guid = ?",
        )
        .bind(&order_guid)
        .fetch_one(&self.db)
        .await?;
        let record = super::fetch_record(&self.db, record_guid).await?;

        Ok(PlacedOrder {
            guid: order.guid,
            qty: order.qty,
            record,
            created_at: order.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spindle_common::db::init_database;

    async fn setup_test_db() -> (tempfile::TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database(&dir.path().join("spindle.db")).await.unwrap();
        (dir, pool)
    }

    async fn insert_record(pool: &SqlitePool, qty: i64) -> String {
        let guid = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO records (guid, artist, album, price, qty, format, category)
             VALUES (?, 'The Beatles', 'Abbey Road', 25.0, ?, 'Vinyl', 'Rock')",
        )
        .bind(&guid)
        .bind(qty)
        .execute(pool)
        .await
        .unwrap();
        guid
    }

    async fn stock_of(pool: &SqlitePool, guid: &str) -> i64 {
        sqlx::query_scalar("SELECT qty FROM records WHERE guid = ?")
            .bind(guid)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn order_count(pool: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_place_order_decrements_stock() {
        let (_dir, pool) = setup_test_db().await;
        let guid = insert_record(&pool, 10).await;
        let service = OrderService::new(pool.clone());

        let placed = service.place(&guid, 1).await.unwrap();

        assert_eq!(placed.qty, 1);
        assert_eq!(placed.record.guid, guid);
        assert_eq!(placed.record.qty, 9);
        assert_eq!(stock_of(&pool, &guid).await, 9);
        assert_eq!(order_count(&pool).await, 1);
    }

    #[tokio::test]
    async fn test_exact_stock_can_be_ordered() {
        let (_dir, pool) = setup_test_db().await;
        let guid = insert_record(&pool, 5).await;
        let service = OrderService::new(pool.clone());

        let placed = service.place(&guid, 5).await.unwrap();

        assert_eq!(placed.record.qty, 0);
        assert_eq!(stock_of(&pool, &guid).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_record_mutates_nothing() {
        let (_dir, pool) = setup_test_db().await;
        let service = OrderService::new(pool.clone());

        let result = service.place(&Uuid::new_v4().to_string(), 1).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(order_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_malformed_id_fails_before_store_access() {
        let (_dir, pool) = setup_test_db().await;
        let service = OrderService::new(pool.clone());

        let result = service.place("not-a-uuid", 1).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_quantity_bounds_rejected() {
        let (_dir, pool) = setup_test_db().await;
        let guid = insert_record(&pool, 1000).await;
        let service = OrderService::new(pool.clone());

        for qty in [0, -3, MAX_ORDER_QTY + 1] {
            let result = service.place(&guid, qty).await;
            assert!(matches!(result, Err(Error::InvalidInput(_))), "qty {}", qty);
        }

        // Nothing mutated by any of the rejected requests
        assert_eq!(stock_of(&pool, &guid).await, 1000);
        assert_eq!(order_count(&pool).await, 0);
    }

    #[tokio::test]
    async fn test_insufficient_stock_mutates_nothing() {
        let (_dir, pool) = setup_test_db().await;
        let guid = insert_record(&pool, 1).await;
        let service = OrderService::new(pool.clone());

        let result = service.place(&guid, 2).await;

        match result {
            Err(Error::InsufficientStock {
                requested,
                available,
            }) => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("Expected InsufficientStock, got {:?}", other.map(|p| p.guid)),
        }
        assert_eq!(stock_of(&pool, &guid).await, 1);
        assert_eq!(order_count(&pool).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_unit_race_has_one_winner() {
        let (_dir, pool) = setup_test_db().await;
        let guid = insert_record(&pool, 1).await;
        let service = OrderService::new(pool.clone());

        let a = {
            let service = service.clone();
            let guid = guid.clone();
            tokio::spawn(async move { service.place(&guid, 1).await })
        };
        let b = {
            let service = service.clone();
            let guid = guid.clone();
            tokio::spawn(async move { service.place(&guid, 1).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let winners = results.iter().filter(|r| r.is_ok()).count();
        let losers = results
            .iter()
            .filter(|r| matches!(r, Err(Error::InsufficientStock { .. })))
            .count();

        assert_eq!(winners, 1);
        assert_eq!(losers, 1);
        assert_eq!(stock_of(&pool, &guid).await, 0);
        assert_eq!(order_count(&pool).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_no_oversell_under_concurrency() {
        let (_dir, pool) = setup_test_db().await;
        let guid = insert_record(&pool, 5).await;
        let service = OrderService::new(pool.clone());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            let guid = guid.clone();
            handles.push(tokio::spawn(async move { service.place(&guid, 1).await }));
        }

        let mut succeeded = 0;
        let mut insufficient = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(Error::InsufficientStock { .. }) => insufficient += 1,
                Err(other) => panic!("Unexpected error: {}", other),
            }
        }

        assert_eq!(succeeded, 5);
        assert_eq!(insufficient, 3);
        assert_eq!(stock_of(&pool, &guid).await, 0);
        assert_eq!(order_count(&pool).await, 5);
    }

    /// A transaction abandoned between the decrement and the order insert
    /// must leave the stock counter untouched.
    #[tokio::test]
    async fn test_uncommitted_decrement_is_invisible() {
        let (_dir, pool) = setup_test_db().await;
        let guid = insert_record(&pool, 10).await;

        {
            let mut tx = pool.begin().await.unwrap();
            sqlx::query("UPDATE records SET qty = qty - 3 WHERE guid = ? AND qty >= 3")
                .bind(&guid)
                .execute(&mut *tx)
                .await
                .unwrap();
            // Dropped without commit
        }

        assert_eq!(stock_of(&pool, &guid).await, 10);
        assert_eq!(order_count(&pool).await, 0);
    }

    /// A failing order insert rolls the paired decrement back.
    #[tokio::test]
    async fn test_failed_insert_rolls_back_decrement() {
        let (_dir, pool) = setup_test_db().await;
        let guid = insert_record(&pool, 10).await;

        let mut tx = pool.begin().await.unwrap();
        sqlx::query("UPDATE records SET qty = qty - 3 WHERE guid = ? AND qty >= 3")
            .bind(&guid)
            .execute(&mut *tx)
            .await
            .unwrap();

        // Violates the orders qty CHECK, failing the second write of the pair
        let insert = sqlx::query("INSERT INTO orders (guid, record_id, qty) VALUES (?, ?, 0)")
            .bind(Uuid::new_v4().to_string())
            .bind(&guid)
            .execute(&mut *tx)
            .await;
        assert!(insert.is_err());
        drop(tx);

        assert_eq!(stock_of(&pool, &guid).await, 10);
        assert_eq!(order_count(&pool).await, 0);
    }
}
