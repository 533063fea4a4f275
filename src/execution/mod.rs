//! Execution layer: database collaborator trait, SQLite engine, normalized
//! results and the tiered coordinator.

pub mod coordinator;
pub mod engine;
pub mod result;
pub mod sqlite_engine;

pub use coordinator::ExecutionCoordinator;
pub use engine::{Database, Row};
pub use result::{QueryData, QueryResult, Shape};
pub use sqlite_engine::SqliteDatabase;
