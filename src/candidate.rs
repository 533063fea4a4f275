//! SQL candidates and their provenance

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which stage produced a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provenance {
    ModelGenerated,
    Template,
    SafeFallback,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Provenance::ModelGenerated => "MODEL_GENERATED",
            Provenance::Template => "TEMPLATE",
            Provenance::SafeFallback => "SAFE_FALLBACK",
        };
        f.write_str(s)
    }
}

/// Value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    Integer(i64),
    Real(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlCandidate {
    pub sql: String,
    pub provenance: Provenance,
    /// Set once the statement has passed validation (templates and the safe
    /// fallback are valid by construction)
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<SqlParam>,
}

impl SqlCandidate {
    pub fn model_generated(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            provenance: Provenance::ModelGenerated,
            valid: false,
            params: Vec::new(),
        }
    }

    pub fn template(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            provenance: Provenance::Template,
            valid: true,
            params,
        }
    }

    pub fn safe_fallback(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            provenance: Provenance::SafeFallback,
            valid: true,
            params: Vec::new(),
        }
    }

    /// Same provenance and params, new text. Validity must be re-established.
    pub fn with_sql(&self, sql: String) -> Self {
        Self {
            sql,
            provenance: self.provenance,
            valid: self.provenance != Provenance::ModelGenerated && self.valid,
            params: self.params.clone(),
        }
    }

    pub fn mark_valid(mut self) -> Self {
        self.valid = true;
        self
    }

    /// Model output that failed validation must never reach the database.
    pub fn is_executable(&self) -> bool {
        self.valid || self.provenance != Provenance::ModelGenerated
    }
}
