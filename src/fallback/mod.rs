//! Template and safe fallbacks
//!
//! Deterministic SQL used when the model candidate is absent, invalid or
//! unrepairable, and a fixed statement for when even the template cannot run.

pub mod safe;
pub mod templates;

pub use safe::{safe_fallback, SAFE_FALLBACK_SQL};
pub use templates::TemplateFallback;
