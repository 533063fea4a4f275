//! Execution Coordinator
//!
//! Runs one accepted statement with a tiered strategy: rows, then a single
//! value, then a single row. The first tier that succeeds decides the shape.

use super::engine::Database;
use super::result::QueryResult;
use crate::candidate::SqlCandidate;
use crate::error::{DbError, ExecutionError};
use crate::validation::starts_with_select;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct ExecutionCoordinator {
    db: Arc<dyn Database>,
    query_timeout: Duration,
}

impl ExecutionCoordinator {
    pub fn new(db: Arc<dyn Database>, query_timeout: Duration) -> Self {
        Self { db, query_timeout }
    }

    pub async fn execute(&self, candidate: &SqlCandidate) -> Result<QueryResult, ExecutionError> {
        let sql = candidate.sql.as_str();
        let params = candidate.params.as_slice();
        let engine = self.db.name();

        if !candidate.is_executable() {
            return Err(self.error(sql, DbError::Rejected("candidate failed validation".to_string())));
        }
        if !starts_with_select(sql) {
            return Err(self.error(sql, DbError::Rejected("only SELECT statements are executed".to_string())));
        }

        let start = Instant::now();
        info!("Executing {} SQL on {}", candidate.provenance, engine);

        let rows_err = match self.bounded(self.db.fetch_rows(sql, params)).await {
            Ok(rows) => return Ok(QueryResult::rows(rows, engine, elapsed_ms(start))),
            Err(e) => e,
        };
        debug!("Rows tier failed: {}", rows_err);

        let scalar_err = match self.bounded(self.db.fetch_scalar(sql, params)).await {
            Ok((column, value)) => return Ok(QueryResult::scalar(column, value, engine, elapsed_ms(start))),
            Err(e) => e,
        };
        debug!("Scalar tier failed: {}", scalar_err);

        match self.bounded(self.db.fetch_row(sql, params)).await {
            Ok(row) => Ok(QueryResult::row(row, engine, elapsed_ms(start))),
            Err(e) => {
                warn!("All fetch tiers failed on {}: {}", engine, e);
                Err(self.error(sql, e))
            }
        }
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T, DbError>>) -> Result<T, DbError> {
        tokio::time::timeout(self.query_timeout, fut)
            .await
            .map_err(|_| DbError::Timeout(self.query_timeout))?
    }

    fn error(&self, sql: &str, source: DbError) -> ExecutionError {
        ExecutionError {
            engine: self.db.name().to_string(),
            sql: sql.to_string(),
            source,
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::SqlParam;
    use crate::execution::engine::Row;
    use crate::execution::result::Shape;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails every tier before `succeed_at` (0 = rows, 1 = scalar, 2 = row).
    struct Tiered {
        succeed_at: usize,
        calls: AtomicUsize,
    }

    impl Tiered {
        fn new(succeed_at: usize) -> Self {
            Self {
                succeed_at,
                calls: AtomicUsize::new(0),
            }
        }

        fn attempt(&self, tier: usize) -> Result<(), DbError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if tier >= self.succeed_at {
                Ok(())
            } else {
                Err(DbError::ShapeMismatch(format!("tier {}", tier)))
            }
        }
    }

    fn row() -> Row {
        let mut row = Row::new();
        row.insert("item_id".to_string(), json!(1));
        row
    }

    #[async_trait]
    impl Database for Tiered {
        fn name(&self) -> &'static str {
            "tiered"
        }

        async fn fetch_rows(&self, _sql: &str, _params: &[SqlParam]) -> Result<Vec<Row>, DbError> {
            self.attempt(0).map(|_| vec![row(), row()])
        }

        async fn fetch_scalar(&self, _sql: &str, _params: &[SqlParam]) -> Result<(String, Value), DbError> {
            self.attempt(1).map(|_| ("total".to_string(), json!(42)))
        }

        async fn fetch_row(&self, _sql: &str, _params: &[SqlParam]) -> Result<Row, DbError> {
            self.attempt(2).map(|_| row())
        }
    }

    struct Hanging;

    #[async_trait]
    impl Database for Hanging {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn fetch_rows(&self, _sql: &str, _params: &[SqlParam]) -> Result<Vec<Row>, DbError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Vec::new())
        }

        async fn fetch_scalar(&self, _sql: &str, _params: &[SqlParam]) -> Result<(String, Value), DbError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(("x".to_string(), Value::Null))
        }

        async fn fetch_row(&self, _sql: &str, _params: &[SqlParam]) -> Result<Row, DbError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Row::new())
        }
    }

    fn template(sql: &str) -> SqlCandidate {
        SqlCandidate::template(sql, Vec::new())
    }

    #[tokio::test]
    async fn test_first_successful_tier_sets_shape() {
        for (succeed_at, shape) in [(0, Shape::Rows), (1, Shape::Scalar), (2, Shape::Row)] {
            let coordinator = ExecutionCoordinator::new(Arc::new(Tiered::new(succeed_at)), Duration::from_secs(1));
            let result = coordinator.execute(&template("SELECT 1")).await.unwrap();
            assert_eq!(result.shape(), shape);
            assert_eq!(result.engine, "tiered");
        }
    }

    #[tokio::test]
    async fn test_all_tiers_fail() {
        let db = Arc::new(Tiered::new(3));
        let coordinator = ExecutionCoordinator::new(db.clone(), Duration::from_secs(1));
        let err = coordinator.execute(&template("SELECT 1")).await.unwrap_err();
        assert_eq!(db.calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.sql, "SELECT 1");
        assert!(matches!(err.source, DbError::ShapeMismatch(_)));
    }

    #[tokio::test]
    async fn test_refuses_unvalidated_and_mutating_sql() {
        let db = Arc::new(Tiered::new(0));
        let coordinator = ExecutionCoordinator::new(db.clone(), Duration::from_secs(1));

        let err = coordinator
            .execute(&SqlCandidate::model_generated("SELECT * FROM sales_data"))
            .await
            .unwrap_err();
        assert!(matches!(err.source, DbError::Rejected(_)));

        let err = coordinator.execute(&template("DELETE FROM ad_sales")).await.unwrap_err();
        assert!(matches!(err.source, DbError::Rejected(_)));
        assert_eq!(db.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_each_tier_is_time_bounded() {
        let coordinator = ExecutionCoordinator::new(Arc::new(Hanging), Duration::from_millis(20));
        let err = coordinator.execute(&template("SELECT 1")).await.unwrap_err();
        assert!(matches!(err.source, DbError::Timeout(_)));
    }
}
