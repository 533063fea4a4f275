//! Pipeline stages and the record of why each downgrade happened.

use super::error_classifier::DbErrorClass;
use crate::candidate::{Provenance, SqlCandidate};
use crate::error::{ExecutionError, PipelineError};
use crate::validation::Violation;
use serde::Serialize;
use std::fmt;

/// States of one `answer` run. Each transition moves strictly toward a
/// more conservative source of SQL.
#[derive(Debug)]
pub(crate) enum Stage {
    /// Ask the model, then validate and repair its statement
    Model,
    /// Hand-written SQL for the intent
    Template,
    Execute(SqlCandidate),
    /// Last resort, carrying the failure that led here
    Safe(ExecutionError),
}

/// Why the pipeline moved on from a candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FallbackReason {
    GenerationAbsent,
    ValidationFailed {
        violations: Vec<Violation>,
    },
    RepairFailed {
        detail: String,
    },
    ExecutionFailed {
        provenance: Provenance,
        class: DbErrorClass,
        detail: String,
    },
    Unexpected {
        detail: String,
    },
}

impl From<PipelineError> for FallbackReason {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::GenerationAbsent => FallbackReason::GenerationAbsent,
            PipelineError::ValidationFailed(violations) => FallbackReason::ValidationFailed { violations },
            PipelineError::RepairFailed(detail) => FallbackReason::RepairFailed { detail },
            other => FallbackReason::Unexpected {
                detail: other.to_string(),
            },
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::GenerationAbsent => write!(f, "model produced no SQL"),
            FallbackReason::ValidationFailed { violations } => write!(
                f,
                "validation failed: {}",
                violations.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
            ),
            FallbackReason::RepairFailed { detail } => write!(f, "repair failed: {}", detail),
            FallbackReason::ExecutionFailed {
                provenance,
                class,
                detail,
            } => write!(f, "{} SQL failed ({}): {}", provenance, class, detail),
            FallbackReason::Unexpected { detail } => write!(f, "{}", detail),
        }
    }
}
