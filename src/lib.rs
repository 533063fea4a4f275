pub mod candidate;
pub mod config;
pub mod db;
pub mod error;
pub mod execution;
pub mod fallback;
pub mod generation;
pub mod intent;
pub mod llm;
pub mod pipeline;
pub mod rewriter;
pub mod schema;
pub mod validation;

pub use candidate::{Provenance, SqlCandidate, SqlParam};
pub use config::PipelineConfig;
pub use error::{DbError, ExecutionError, PipelineError, Result};
pub use execution::{QueryData, QueryResult, Shape};
pub use intent::{Aggregation, Intent, Metric};
pub use pipeline::{Answer, FallbackReason, QueryPipeline};
pub use schema::{SchemaDescriptor, Table};
