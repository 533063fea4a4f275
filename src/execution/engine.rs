//! Database collaborator contract
//!
//! The coordinator only ever talks to this trait, so the SQLite engine can be
//! swapped for a stub in tests (or another backend later).

use crate::candidate::SqlParam;
use crate::error::DbError;
use async_trait::async_trait;

/// One result row, column order preserved.
pub type Row = serde_json::Map<String, serde_json::Value>;

#[async_trait]
pub trait Database: Send + Sync {
    /// Engine name (e.g. "sqlite")
    fn name(&self) -> &'static str;

    /// Tabular fetch. Reports `ShapeMismatch` when the statement produced a
    /// single value rather than a table.
    async fn fetch_rows(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, DbError>;

    /// Single value: exactly one column of the first row, with its name.
    async fn fetch_scalar(
        &self,
        sql: &str,
        params: &[SqlParam],
    ) -> Result<(String, serde_json::Value), DbError>;

    /// First row only.
    async fn fetch_row(&self, sql: &str, params: &[SqlParam]) -> Result<Row, DbError>;
}
