//! Error Classifier
//!
//! Classifies database failures into a small taxonomy for logging and for the
//! terminal failure message.

use crate::error::DbError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DbErrorClass {
    ConnectionLost,
    Timeout,
    MissingTable,
    MissingColumn,
    Syntax,
    ShapeMismatch,
    Other,
}

impl fmt::Display for DbErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbErrorClass::ConnectionLost => write!(f, "ConnectionLost"),
            DbErrorClass::Timeout => write!(f, "Timeout"),
            DbErrorClass::MissingTable => write!(f, "MissingTable"),
            DbErrorClass::MissingColumn => write!(f, "MissingColumn"),
            DbErrorClass::Syntax => write!(f, "Syntax"),
            DbErrorClass::ShapeMismatch => write!(f, "ShapeMismatch"),
            DbErrorClass::Other => write!(f, "Other"),
        }
    }
}

pub struct ErrorClassifier;

impl ErrorClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, error: &DbError) -> DbErrorClass {
        match error {
            DbError::ConnectionLost(_) => DbErrorClass::ConnectionLost,
            DbError::Timeout(_) => DbErrorClass::Timeout,
            DbError::ShapeMismatch(_) | DbError::NoRows => DbErrorClass::ShapeMismatch,
            DbError::Rejected(_) => DbErrorClass::Other,
            DbError::Sqlx(e) => match e {
                sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
                | sqlx::Error::Io(_) => DbErrorClass::ConnectionLost,
                other => self.classify_message(&other.to_string()),
            },
        }
    }

    /// Pattern matching on SQLite error messages
    fn classify_message(&self, message: &str) -> DbErrorClass {
        let msg = message.to_lowercase();

        if msg.contains("no such table") {
            return DbErrorClass::MissingTable;
        }

        if msg.contains("no such column") || msg.contains("ambiguous column") {
            return DbErrorClass::MissingColumn;
        }

        if msg.contains("syntax error") || msg.contains("incomplete input") {
            return DbErrorClass::Syntax;
        }

        if msg.contains("unable to open") || msg.contains("disk i/o") || msg.contains("database is locked") {
            return DbErrorClass::ConnectionLost;
        }

        DbErrorClass::Other
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_classify_collaborator_errors() {
        let classifier = ErrorClassifier::new();
        assert_eq!(
            classifier.classify(&DbError::ConnectionLost("reset by peer".to_string())),
            DbErrorClass::ConnectionLost
        );
        assert_eq!(
            classifier.classify(&DbError::Timeout(Duration::from_secs(1))),
            DbErrorClass::Timeout
        );
        assert_eq!(classifier.classify(&DbError::NoRows), DbErrorClass::ShapeMismatch);
        assert_eq!(
            classifier.classify(&DbError::Sqlx(sqlx::Error::PoolTimedOut)),
            DbErrorClass::ConnectionLost
        );
    }

    #[test]
    fn test_classify_sqlite_messages() {
        let classifier = ErrorClassifier::new();
        assert_eq!(classifier.classify_message("no such table: sales_data"), DbErrorClass::MissingTable);
        assert_eq!(classifier.classify_message("no such column: a.revenue"), DbErrorClass::MissingColumn);
        assert_eq!(classifier.classify_message("near \"FORM\": syntax error"), DbErrorClass::Syntax);
        assert_eq!(classifier.classify_message("something else"), DbErrorClass::Other);
    }

    #[tokio::test]
    async fn test_classify_real_sqlite_error() {
        let pool = crate::db::memory_pool().await.unwrap();
        let err = match sqlx::query("SELECT * FROM sales_data").fetch_all(&pool).await {
            Ok(rows) => panic!("expected an error, got {} rows", rows.len()),
            Err(e) => e,
        };
        assert_eq!(ErrorClassifier::new().classify(&DbError::from(err)), DbErrorClass::MissingTable);
    }
}
