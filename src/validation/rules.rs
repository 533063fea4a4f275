//! Validation rule identifiers and the report handed back to the pipeline.

use crate::intent::Metric;
use serde::Serialize;
use std::fmt;

/// Identifiers that models invent when they do not know the real schema.
pub const DENYLISTED_IDENTIFIERS: &[&str] = &[
    "sales_data",
    "sales",
    "product",
    "products",
    "user",
    "users",
    "orders",
    "items",
    "data",
    "ads",
];

/// Statement keywords that never belong in a read-only query.
pub const FORBIDDEN_KEYWORDS: &[&str] = &[
    "insert", "update", "delete", "drop", "alter", "create", "attach", "detach", "pragma", "replace",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "detail", rename_all = "snake_case")]
pub enum Violation {
    // structural
    NotSelect,
    MultipleStatements,
    ForbiddenKeyword(String),
    UnauthorizedTable {
        name: String,
        suggestion: Option<&'static str>,
    },
    DeniedIdentifier(String),
    UnknownColumn(String),
    // semantic
    Unparseable(String),
    MetricMismatch(Metric),
    ColumnMissing(String),
    LimitMissing { expected: u32 },
    LimitMismatch { expected: u32, found: String },
    UnexpectedLimit,
    GroupingMissing,
}

impl Violation {
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Violation::NotSelect
                | Violation::MultipleStatements
                | Violation::ForbiddenKeyword(_)
                | Violation::UnauthorizedTable { .. }
                | Violation::DeniedIdentifier(_)
                | Violation::UnknownColumn(_)
        )
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NotSelect => write!(f, "statement is not a SELECT"),
            Violation::MultipleStatements => write!(f, "more than one statement"),
            Violation::ForbiddenKeyword(k) => write!(f, "forbidden keyword {}", k.to_uppercase()),
            Violation::UnauthorizedTable { name, suggestion: Some(s) } => {
                write!(f, "unauthorized table '{}' (did you mean '{}'?)", name, s)
            }
            Violation::UnauthorizedTable { name, suggestion: None } => {
                write!(f, "unauthorized table '{}'", name)
            }
            Violation::DeniedIdentifier(name) => write!(f, "denylisted identifier '{}'", name),
            Violation::UnknownColumn(name) => write!(f, "unknown column '{}'", name),
            Violation::Unparseable(e) => write!(f, "unparseable SQL: {}", e),
            Violation::MetricMismatch(m) => write!(f, "expression does not compute {}", m),
            Violation::ColumnMissing(c) => write!(f, "statement never reads {}", c),
            Violation::LimitMissing { expected } => write!(f, "missing LIMIT {}", expected),
            Violation::LimitMismatch { expected, found } => {
                write!(f, "LIMIT {} does not match requested {}", found, expected)
            }
            Violation::UnexpectedLimit => write!(f, "LIMIT on a total"),
            Violation::GroupingMissing => write!(f, "missing GROUP BY"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
    /// Whether the statement's structure reflects the classified intent
    pub intent_match: bool,
}

impl ValidationReport {
    pub(crate) fn from_violations(mut violations: Vec<Violation>) -> Self {
        let mut seen = Vec::with_capacity(violations.len());
        violations.retain(|v| {
            if seen.contains(v) {
                false
            } else {
                seen.push(v.clone());
                true
            }
        });
        let intent_match = violations.is_empty();
        Self {
            violations,
            intent_match,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty() && self.intent_match
    }

    pub fn has_structural_violation(&self) -> bool {
        self.violations.iter().any(Violation::is_structural)
    }
}
