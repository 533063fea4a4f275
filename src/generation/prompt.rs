//! Prompt construction for SQL generation. Output is deterministic for a given
//! (question, intent) pair.

use crate::intent::{Aggregation, Intent, Metric};
use crate::schema::SchemaDescriptor;

pub const METRIC_FORMULAS: &[(&str, &str)] = &[
    ("ROI", "(total_sales - ad_spend) / ad_spend"),
    ("ROAS", "ad_sales / ad_spend"),
    ("CPC", "ad_spend / clicks"),
    ("CTR", "clicks / impressions"),
];

const FORMATTING_RULES: &[&str] = &[
    "Return exactly one SQLite SELECT statement and nothing else.",
    "Only use the tables and columns listed above. Never invent tables such as sales_data, product or user.",
    "Alias tables as ad_sales a, total_sales t, eligibility e and qualify every column with its alias.",
    "Round numeric results to 2 decimals with ROUND(..., 2) and give every computed column an explicit alias.",
    "Guard divisions with NULLIF(divisor, 0).",
    "Order clauses as SELECT, FROM, WHERE, GROUP BY, ORDER BY, LIMIT.",
];

pub fn build_prompt(question: &str, intent: &Intent, schema: &SchemaDescriptor) -> String {
    let mut parts = Vec::new();

    parts.push("DATABASE SCHEMA:".to_string());
    parts.push(schema.render_for_prompt());

    parts.push("METRIC FORMULAS:".to_string());
    for (name, formula) in METRIC_FORMULAS {
        parts.push(format!("- {} = {}", name, formula));
    }

    parts.push("\nRULES:".to_string());
    for rule in FORMATTING_RULES {
        parts.push(format!("- {}", rule));
    }

    if let Some(hint) = intent_hint(intent) {
        parts.push(format!("\nEXPECTED RESULT: {}", hint));
    }

    parts.push(format!("\nQUESTION: {}", question.trim()));
    parts.push("SQL:".to_string());
    parts.join("\n")
}

fn intent_hint(intent: &Intent) -> Option<String> {
    let metric = match intent.metric {
        Metric::Generic => intent.column.clone(),
        other => Some(other.to_string()),
    };
    let shape = match intent.aggregation {
        Aggregation::TopN => Some(format!(
            "the top {} rows ordered {}, ending with LIMIT {}",
            intent.limit.unwrap_or_default(),
            intent.direction.sql(),
            intent.limit.unwrap_or_default()
        )),
        Aggregation::Total => Some("a single aggregated value with no LIMIT clause".to_string()),
        Aggregation::Grouped => Some("one row per group using GROUP BY".to_string()),
        Aggregation::Row => None,
    };
    match (metric, shape) {
        (Some(m), Some(s)) => Some(format!("{} as {}", m, s)),
        (Some(m), None) => Some(format!("{} per row", m)),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_is_deterministic_and_complete() {
        let schema = SchemaDescriptor::global();
        let intent = Intent::top_n(Metric::Cpc, 3);
        let a = build_prompt("top 3 products by CPC", &intent, schema);
        let b = build_prompt("top 3 products by CPC", &intent, schema);
        assert_eq!(a, b);
        assert!(a.contains("CPC = ad_spend / clicks"));
        assert!(a.contains("ROI = (total_sales - ad_spend) / ad_spend"));
        assert!(a.contains("ad_sales"));
        assert!(a.contains("LIMIT 3"));
        assert!(a.ends_with("QUESTION: top 3 products by CPC\nSQL:"));
    }

    #[test]
    fn test_generic_row_has_no_hint() {
        let prompt = build_prompt("anything", &Intent::generic(), SchemaDescriptor::global());
        assert!(!prompt.contains("EXPECTED RESULT"));
    }

    #[test]
    fn test_generic_hint_names_the_column() {
        let intent = Intent::new(Metric::Generic, Aggregation::Total).about_column("clicks");
        let prompt = build_prompt("total clicks", &intent, SchemaDescriptor::global());
        assert!(prompt.contains("EXPECTED RESULT: clicks as a single aggregated value with no LIMIT clause"));
    }
}
