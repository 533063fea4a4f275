#![allow(dead_code)]

use adsql::error::{DbError, Result};
use adsql::execution::{Database, Row, SqliteDatabase};
use adsql::fallback::SAFE_FALLBACK_SQL;
use adsql::llm::TextGenerator;
use adsql::SqlParam;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

const DDL: &[&str] = &[
    "CREATE TABLE ad_sales (date TEXT, item_id INTEGER, ad_sales REAL, impressions INTEGER, ad_spend REAL, clicks INTEGER, units_sold INTEGER)",
    "CREATE TABLE total_sales (date TEXT, item_id INTEGER, total_sales REAL, total_units_ordered INTEGER)",
    "CREATE TABLE eligibility (eligibility_datetime_utc TEXT, item_id INTEGER, eligibility INTEGER, message TEXT)",
];

/// CPC per item: 1 → 0.5, 2 → 1.5, 3 → 0.2, 4 → 4.0. Total revenue 570.
const SEED: &[&str] = &[
    "INSERT INTO ad_sales VALUES \
        ('2025-06-01', 1, 100.0, 1000, 20.0, 40, 5), \
        ('2025-06-01', 2, 50.0, 2000, 30.0, 20, 2), \
        ('2025-06-02', 3, 80.0, 500, 10.0, 50, 4), \
        ('2025-06-02', 4, 10.0, 800, 40.0, 10, 1)",
    "INSERT INTO total_sales VALUES \
        ('2025-06-01', 1, 300.0, 12), \
        ('2025-06-01', 2, 120.0, 6), \
        ('2025-06-02', 3, 90.0, 9), \
        ('2025-06-02', 4, 60.0, 3)",
    "INSERT INTO eligibility VALUES \
        ('2025-06-01 10:00:00', 1, 1, 'eligible'), \
        ('2025-06-01 10:00:00', 4, 0, 'suppressed')",
];

/// In-memory database with the three tables and no rows.
pub async fn empty_database() -> SqliteDatabase {
    let pool = adsql::db::memory_pool().await.unwrap();
    for statement in DDL {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    SqliteDatabase::from_pool(pool)
}

pub async fn seeded_database() -> SqliteDatabase {
    let db = empty_database().await;
    for statement in SEED {
        sqlx::query(statement).execute(db.pool()).await.unwrap();
    }
    db
}

/// Returns the same text for every prompt.
pub struct Canned(pub &'static str);

#[async_trait]
impl TextGenerator for Canned {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Never answers within any sane timeout.
pub struct Sleeping;

#[async_trait]
impl TextGenerator for Sleeping {
    fn name(&self) -> &str {
        "sleeping"
    }

    async fn complete(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(String::new())
    }
}

/// Delegates to SQLite, but drops the connection for statements matching
/// `fails`.
pub struct Flaky {
    pub inner: SqliteDatabase,
    pub fails: fn(&str) -> bool,
    pub calls: AtomicUsize,
}

impl Flaky {
    pub fn new(inner: SqliteDatabase, fails: fn(&str) -> bool) -> Self {
        Self {
            inner,
            fails,
            calls: AtomicUsize::new(0),
        }
    }

    /// Everything except the safe fallback fails.
    pub fn only_safe(inner: SqliteDatabase) -> Self {
        Self::new(inner, |sql| sql != SAFE_FALLBACK_SQL)
    }

    pub fn down(inner: SqliteDatabase) -> Self {
        Self::new(inner, |_| true)
    }

    fn check(&self, sql: &str) -> std::result::Result<(), DbError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if (self.fails)(sql) {
            Err(DbError::ConnectionLost("connection reset by peer".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Database for Flaky {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn fetch_rows(&self, sql: &str, params: &[SqlParam]) -> std::result::Result<Vec<Row>, DbError> {
        self.check(sql)?;
        self.inner.fetch_rows(sql, params).await
    }

    async fn fetch_scalar(&self, sql: &str, params: &[SqlParam]) -> std::result::Result<(String, Value), DbError> {
        self.check(sql)?;
        self.inner.fetch_scalar(sql, params).await
    }

    async fn fetch_row(&self, sql: &str, params: &[SqlParam]) -> std::result::Result<Row, DbError> {
        self.check(sql)?;
        self.inner.fetch_row(sql, params).await
    }
}

/// Takes a pooled connection for the rows tier and never finishes with it.
pub struct Holding {
    pub pool: SqlitePool,
    pub acquired: AtomicBool,
}

impl Holding {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            acquired: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Database for Holding {
    fn name(&self) -> &'static str {
        "holding"
    }

    async fn fetch_rows(&self, _sql: &str, _params: &[SqlParam]) -> std::result::Result<Vec<Row>, DbError> {
        let _connection = self.pool.acquire().await?;
        self.acquired.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn fetch_scalar(&self, _sql: &str, _params: &[SqlParam]) -> std::result::Result<(String, Value), DbError> {
        Err(DbError::NoRows)
    }

    async fn fetch_row(&self, _sql: &str, _params: &[SqlParam]) -> std::result::Result<Row, DbError> {
        Err(DbError::NoRows)
    }
}
