//! Last-resort statement.

use crate::candidate::SqlCandidate;

/// Bounded listing of the table most likely to hold rows. Parameter free and
/// limited to columns present since the first schema version.
pub const SAFE_FALLBACK_SQL: &str =
    "SELECT t.date, t.item_id, t.total_sales, t.total_units_ordered FROM total_sales t LIMIT 10";

pub fn safe_fallback() -> SqlCandidate {
    SqlCandidate::safe_fallback(SAFE_FALLBACK_SQL)
}
