use std::time::Duration;
use thiserror::Error;

use crate::validation::Violation;

/// Failure reported by a database collaborator for a single fetch attempt.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Query returned no rows")]
    NoRows,

    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Statement rejected: {0}")]
    Rejected(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// All fetch tiers failed for one statement.
#[derive(Error, Debug)]
#[error("Execution failed on {engine}: {source}")]
pub struct ExecutionError {
    pub engine: String,
    pub sql: String,
    #[source]
    pub source: DbError,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Question is empty")]
    EmptyQuestion,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("No SQL candidate was generated")]
    GenerationAbsent,

    #[error("Validation failed: {}", format_violations(.0))]
    ValidationFailed(Vec<Violation>),

    #[error("Repair failed: {0}")]
    RepairFailed(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("Database unavailable: {primary}; safe fallback also failed: {fallback}")]
    DatabaseUnavailable {
        primary: Box<ExecutionError>,
        fallback: Box<ExecutionError>,
    },
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type Result<T> = std::result::Result<T, PipelineError>;
