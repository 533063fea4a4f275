//! Database module for SQLite connectivity
//!
//! One bounded pool is created at startup and shared by every request.

pub mod connection;

pub use connection::{init_pool, memory_pool, DbPool};
