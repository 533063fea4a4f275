//! SQLite engine over a bounded `sqlx` pool.
//!
//! Each fetch borrows a connection from the pool for the duration of the call
//! and returns it on every exit path, including when the future is dropped.

use super::engine::{Database, Row};
use crate::candidate::SqlParam;
use crate::error::DbError;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn bind_all<'q>(sql: &'q str, params: &'q [SqlParam]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    params.iter().fold(sqlx::query(sql), |query, param| match param {
        SqlParam::Integer(i) => query.bind(*i),
        SqlParam::Real(f) => query.bind(*f),
        SqlParam::Text(s) => query.bind(s.as_str()),
    })
}

fn decode_value(row: &SqliteRow, index: usize) -> Result<Value, DbError> {
    let type_name = {
        let raw = row.try_get_raw(index)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_uppercase()
    };

    let value = match type_name.as_str() {
        "INTEGER" | "INT" | "INT8" | "BIGINT" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(index)?),
        "REAL" | "NUMERIC" => serde_json::Number::from_f64(row.try_get::<f64, _>(index)?)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BLOB" => {
            let bytes: Vec<u8> = row.try_get(index)?;
            Value::String(format!("<{} bytes>", bytes.len()))
        }
        _ => Value::String(row.try_get::<String, _>(index)?),
    };
    Ok(value)
}

fn decode_row(row: &SqliteRow) -> Result<Row, DbError> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), decode_value(row, index)?);
    }
    Ok(out)
}

#[async_trait]
impl Database for SqliteDatabase {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn fetch_rows(&self, sql: &str, params: &[SqlParam]) -> Result<Vec<Row>, DbError> {
        let rows = bind_all(sql, params).fetch_all(&self.pool).await?;
        if rows.len() == 1 && rows[0].columns().len() == 1 {
            return Err(DbError::ShapeMismatch("statement produced a single value".to_string()));
        }
        rows.iter().map(decode_row).collect()
    }

    async fn fetch_scalar(&self, sql: &str, params: &[SqlParam]) -> Result<(String, Value), DbError> {
        let row = bind_all(sql, params)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NoRows)?;
        if row.columns().len() != 1 {
            return Err(DbError::ShapeMismatch(format!(
                "expected one column, found {}",
                row.columns().len()
            )));
        }
        let name = row.columns()[0].name().to_string();
        Ok((name, decode_value(&row, 0)?))
    }

    async fn fetch_row(&self, sql: &str, params: &[SqlParam]) -> Result<Row, DbError> {
        let row = bind_all(sql, params)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(DbError::NoRows)?;
        decode_row(&row)
    }
}
