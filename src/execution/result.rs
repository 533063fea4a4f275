//! Query Result - normalized output of the execution coordinator

use super::engine::Row;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which fetch tier produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Rows,
    Scalar,
    Row,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Rows => write!(f, "rows"),
            Shape::Scalar => write!(f, "scalar"),
            Shape::Row => write!(f, "row"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "data", rename_all = "snake_case")]
pub enum QueryData {
    Rows(Vec<Row>),
    Scalar(Value),
    Row(Row),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(flatten)]
    pub data: QueryData,

    /// Column names in result order
    pub columns: Vec<String>,

    pub row_count: usize,

    /// Wall time across all tiers tried
    pub elapsed_ms: u64,

    /// Engine that executed the query
    pub engine: String,
}

impl QueryResult {
    pub fn rows(rows: Vec<Row>, engine: &str, elapsed_ms: u64) -> Self {
        let columns = rows
            .first()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            row_count: rows.len(),
            data: QueryData::Rows(rows),
            columns,
            elapsed_ms,
            engine: engine.to_string(),
        }
    }

    pub fn scalar(column: String, value: Value, engine: &str, elapsed_ms: u64) -> Self {
        Self {
            data: QueryData::Scalar(value),
            columns: vec![column],
            row_count: 1,
            elapsed_ms,
            engine: engine.to_string(),
        }
    }

    pub fn row(row: Row, engine: &str, elapsed_ms: u64) -> Self {
        Self {
            columns: row.keys().cloned().collect(),
            data: QueryData::Row(row),
            row_count: 1,
            elapsed_ms,
            engine: engine.to_string(),
        }
    }

    pub fn shape(&self) -> Shape {
        match self.data {
            QueryData::Rows(_) => Shape::Rows,
            QueryData::Scalar(_) => Shape::Scalar,
            QueryData::Row(_) => Shape::Row,
        }
    }

    /// Every row as a column→value map, whatever the shape.
    pub fn as_rows(&self) -> Vec<Row> {
        match &self.data {
            QueryData::Rows(rows) => rows.clone(),
            QueryData::Row(row) => vec![row.clone()],
            QueryData::Scalar(value) => {
                let mut row = Row::new();
                let name = self.columns.first().cloned().unwrap_or_else(|| "value".to_string());
                row.insert(name, value.clone());
                vec![row]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape_tag() {
        let result = QueryResult::scalar("revenue".to_string(), json!(1250.5), "sqlite", 3);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["shape"], "scalar");
        assert_eq!(value["data"], json!(1250.5));
        assert_eq!(value["row_count"], 1);
        assert_eq!(result.as_rows()[0]["revenue"], json!(1250.5));
    }

    #[test]
    fn test_rows_columns_follow_first_row() {
        let mut row = Row::new();
        row.insert("item_id".to_string(), json!(7));
        row.insert("cpc".to_string(), json!(0.42));
        let result = QueryResult::rows(vec![row], "sqlite", 1);
        assert_eq!(result.columns, ["item_id", "cpc"]);
        assert_eq!(result.shape(), Shape::Rows);

        let empty = QueryResult::rows(Vec::new(), "sqlite", 1);
        assert_eq!(empty.row_count, 0);
        assert!(empty.columns.is_empty());
    }
}
