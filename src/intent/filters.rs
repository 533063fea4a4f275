//! Filter extraction
//!
//! Pattern matching on comparison phrases ("below $5", "at least 1,000
//! impressions", "after 2025-06-01", "in 2025") mapped onto schema columns.

use crate::intent::Metric;
use crate::schema::SchemaDescriptor;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

lazy_static! {
    static ref NUMERIC_COMPARISON: Regex = Regex::new(
        r"(?x)
        \b(?P<cmp>
            at\s+least | at\s+most | no\s+more\s+than | no\s+less\s+than
            | more\s+than | greater\s+than | higher\s+than
            | less\s+than | lower\s+than | fewer\s+than
            | below | under | above | over | exceeding | exceeds
        )
        \s+(?P<cur>\$)?\s*(?P<num>\d[\d,]*(?:\.\d+)?)
        (?P<unit>(?:\s+[a-z_]+){0,2})"
    )
    .expect("numeric comparison pattern");

    static ref DATE_COMPARISON: Regex = Regex::new(
        r"\b(?P<cmp>on|after|before|since|from|until)\s+(?P<date>\d{4}-\d{2}-\d{2})\b"
    )
    .expect("date comparison pattern");

    static ref YEAR_RANGE: Regex = Regex::new(r"\b(?:in|during)\s+(?P<year>(?:19|20)\d{2})\b")
        .expect("year pattern");
}

/// Words that may sit between a column phrase and the comparator.
const FILLER_WORDS: &[&str] = &["with", "is", "are", "of", "where", "that", "have", "has", "had", "and"];

/// Metric keywords; a comparison on these targets a derived value, not a column.
const METRIC_WORDS: &[&str] = &["cpc", "roas", "roi", "ctr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

impl Comparison {
    pub fn sql(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "=",
        }
    }

    fn from_phrase(phrase: &str) -> Option<Self> {
        let phrase = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
        let cmp = match phrase.as_str() {
            "at least" | "no less than" => Comparison::Ge,
            "at most" | "no more than" => Comparison::Le,
            "more than" | "greater than" | "higher than" | "above" | "over" | "exceeding"
            | "exceeds" | "after" => Comparison::Gt,
            "less than" | "lower than" | "fewer than" | "below" | "under" | "before" => {
                Comparison::Lt
            }
            "since" | "from" => Comparison::Ge,
            "until" => Comparison::Le,
            "on" => Comparison::Eq,
            _ => return None,
        };
        Some(cmp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Number(f64),
    Date(NaiveDate),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Number(n) => write!(f, "{}", n),
            FilterValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: Comparison,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: &str, op: Comparison, value: FilterValue) -> Self {
        Self {
            column: column.to_string(),
            op,
            value,
        }
    }
}

/// Extract numeric and temporal filters in the order they appear.
pub fn extract_filters(question: &str, metric: Metric, schema: &SchemaDescriptor) -> Vec<Filter> {
    let text = question.to_lowercase();
    let mut found: Vec<(usize, Filter)> = Vec::new();

    for caps in NUMERIC_COMPARISON.captures_iter(&text) {
        let (Some(whole), Some(cmp), Some(num)) = (caps.get(0), caps.name("cmp"), caps.name("num")) else {
            continue;
        };
        let Some(op) = Comparison::from_phrase(cmp.as_str()) else {
            continue;
        };
        let Ok(value) = num.as_str().replace(',', "").parse::<f64>() else {
            continue;
        };
        let unit = caps.name("unit").map(|m| m.as_str()).unwrap_or("");
        let preceding = &text[..whole.start()];
        let is_currency = caps.name("cur").is_some();

        match resolve_column(unit, preceding, is_currency, metric, schema) {
            Some(column) => found.push((whole.start(), Filter::new(column, op, FilterValue::Number(value)))),
            None => debug!("Dropping comparison '{}' with no resolvable column", whole.as_str().trim()),
        }
    }

    for caps in DATE_COMPARISON.captures_iter(&text) {
        let (Some(whole), Some(cmp), Some(date)) = (caps.get(0), caps.name("cmp"), caps.name("date")) else {
            continue;
        };
        let (Some(op), Ok(date)) = (
            Comparison::from_phrase(cmp.as_str()),
            NaiveDate::parse_from_str(date.as_str(), "%Y-%m-%d"),
        ) else {
            continue;
        };
        found.push((whole.start(), Filter::new("date", op, FilterValue::Date(date))));
    }

    for caps in YEAR_RANGE.captures_iter(&text) {
        let (Some(whole), Some(year)) = (caps.get(0), caps.name("year")) else {
            continue;
        };
        let Ok(year) = year.as_str().parse::<i32>() else {
            continue;
        };
        let (Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year + 1, 1, 1),
        ) else {
            continue;
        };
        found.push((whole.start(), Filter::new("date", Comparison::Ge, FilterValue::Date(start))));
        found.push((whole.start(), Filter::new("date", Comparison::Lt, FilterValue::Date(end))));
    }

    found.sort_by_key(|(pos, _)| *pos);
    found.into_iter().map(|(_, filter)| filter).collect()
}

fn resolve_column(
    unit: &str,
    preceding: &str,
    is_currency: bool,
    metric: Metric,
    schema: &SchemaDescriptor,
) -> Option<&'static str> {
    // "at least 1000 impressions"
    let unit_words: Vec<&str> = unit.split_whitespace().collect();
    // "under $2 cpc"
    if unit_words.first().is_some_and(|w| METRIC_WORDS.contains(w)) {
        return None;
    }
    for n in (1..=unit_words.len()).rev() {
        if let Some(column) = schema.column_for_phrase(&unit_words[..n].join(" ")) {
            return Some(column);
        }
    }

    // "spend below $5"
    let before: Vec<&str> = preceding
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty() && !FILLER_WORDS.contains(w))
        .collect();
    if let Some(last) = before.last() {
        if METRIC_WORDS.contains(last) {
            return None;
        }
    }
    let tail = &before[before.len().saturating_sub(2)..];
    for start in 0..tail.len() {
        if let Some(column) = schema.column_for_phrase(&tail[start..].join(" ")) {
            return Some(column);
        }
    }

    // "below $5" with nothing else: the money column of the metric
    if is_currency {
        return match metric {
            Metric::Revenue => Some("total_sales"),
            Metric::Units => None,
            _ => Some("ad_spend"),
        };
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(question: &str, metric: Metric) -> Vec<Filter> {
        extract_filters(question, metric, SchemaDescriptor::global())
    }

    #[test]
    fn test_unit_after_number() {
        let f = filters("products with at least 1,000 impressions", Metric::Generic);
        assert_eq!(f, vec![Filter::new("impressions", Comparison::Ge, FilterValue::Number(1000.0))]);
    }

    #[test]
    fn test_column_before_comparator() {
        let f = filters("items where ad spend is below $5.50", Metric::Roas);
        assert_eq!(f, vec![Filter::new("ad_spend", Comparison::Lt, FilterValue::Number(5.5))]);
    }

    #[test]
    fn test_bare_currency_defaults_to_metric_money_column() {
        let f = filters("which days had revenue under $200", Metric::Revenue);
        assert_eq!(f[0].column, "total_sales");
        let f = filters("anything below $3", Metric::Generic);
        assert_eq!(f[0].column, "ad_spend");
    }

    #[test]
    fn test_comparison_on_derived_metric_is_dropped() {
        assert!(filters("products with cpc below $1", Metric::Cpc).is_empty());
        assert!(filters("products under $2 cpc", Metric::Cpc).is_empty());
        assert!(filters("items above 3 roas", Metric::Roas).is_empty());
    }

    #[test]
    fn test_dates_and_years() {
        let f = filters("sales after 2025-06-01", Metric::Revenue);
        assert_eq!(f[0].column, "date");
        assert_eq!(f[0].op, Comparison::Gt);

        let f = filters("total revenue in 2025", Metric::Revenue);
        assert_eq!(f.len(), 2);
        assert_eq!(f[0].op, Comparison::Ge);
        assert_eq!(f[1].value.to_string(), "2026-01-01");
    }

    #[test]
    fn test_invalid_date_is_ignored() {
        assert!(filters("sales on 2025-13-45", Metric::Revenue).is_empty());
    }

    #[test]
    fn test_no_filters() {
        assert!(filters("top 3 products by CPC", Metric::Cpc).is_empty());
    }
}
