//! Intent Classifier
//!
//! Token and phrase matching against a fixed vocabulary. Questions that match
//! nothing fall back to GENERIC/ROW with no filters.

use crate::intent::filters::extract_filters;
use crate::intent::{Aggregation, Dimension, Intent, Metric, SortDirection, DEFAULT_TOP_N, MAX_TOP_N};
use crate::schema::{SchemaDescriptor, Table};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref RANKING: Regex = Regex::new(
        r"\b(?P<word>top|highest|best|largest|biggest|lowest|bottom|worst|cheapest|smallest)\b(?:\s+(?P<after>\d+)\b)?"
    )
    .expect("ranking pattern");

    static ref COUNT_BEFORE_RANKING: Regex = Regex::new(
        r"\b(?P<n>\d+)\s+(?:highest|best|largest|biggest|lowest|worst|cheapest|smallest|top)\b"
    )
    .expect("count pattern");

    static ref GROUPING: Regex = Regex::new(
        r"\b(?:by|per|each|every|for\s+each)\s+(?P<dim>product|products|item|items|item_id|sku|skus|date|dates|day|days|month|months)\b"
    )
    .expect("grouping pattern");
}

const ASCENDING_WORDS: &[&str] = &["lowest", "bottom", "worst", "cheapest", "smallest"];
const RATIO_WORDS: &[&str] = &["ratio", "return", "vs", "versus", "relative", "compared", "efficiency"];

/// Classify a question. Pure function of the question and the schema.
pub fn classify(question: &str, schema: &SchemaDescriptor) -> Intent {
    let text = normalize(question);
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let metric = classify_metric(&text, &tokens);
    let (aggregation, limit, direction) = classify_aggregation(&text, &tokens);
    let dimension = classify_dimension(&text);
    let filters = extract_filters(question, metric, schema);
    let subject = classify_subject(&tokens);
    let column = match metric {
        Metric::Generic => schema
            .measures_mentioned(&text)
            .into_iter()
            .find(|c| !filters.iter().any(|f| f.column == *c))
            .map(str::to_string),
        _ => None,
    };

    let intent = Intent {
        metric,
        aggregation,
        limit,
        filters,
        dimension,
        direction,
        subject,
        column,
    };
    debug!(
        "Classified '{}' as {} / {:?} (limit {:?}, {} filters)",
        question,
        intent.metric,
        intent.aggregation,
        intent.limit,
        intent.filters.len()
    );
    intent
}

/// Lowercase, split hyphens and punctuation, and pad with spaces so phrases
/// can be matched with `contains(" phrase ")`.
fn normalize(question: &str) -> String {
    let spaced: String = question
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();
    format!(" {} ", spaced.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn has_phrase(text: &str, phrase: &str) -> bool {
    text.contains(&format!(" {} ", phrase))
}

fn has_any(tokens: &[&str], words: &[&str]) -> bool {
    tokens.iter().any(|t| words.contains(t))
}

fn classify_metric(text: &str, tokens: &[&str]) -> Metric {
    if has_phrase(text, "return on ad spend") || has_any(tokens, &["roas"]) {
        return Metric::Roas;
    }
    if has_phrase(text, "cost per click") || has_any(tokens, &["cpc"]) {
        return Metric::Cpc;
    }
    if has_phrase(text, "click through")
        || has_phrase(text, "clickthrough")
        || has_any(tokens, &["ctr"])
    {
        return Metric::Ctr;
    }
    if has_phrase(text, "return on investment") || has_any(tokens, &["roi", "profitability"]) {
        return Metric::Roi;
    }
    let mentions_ad = has_any(tokens, &["ad", "ads", "advertising", "advertisement"]);
    let mentions_revenue = has_any(tokens, &["revenue", "sales", "sale"]);
    if mentions_ad && mentions_revenue && has_any(tokens, RATIO_WORDS) {
        return Metric::Roi;
    }
    if has_any(tokens, &["units", "unit", "quantity", "ordered"]) {
        return Metric::Units;
    }
    if mentions_revenue && !mentions_ad {
        return Metric::Revenue;
    }
    Metric::Generic
}

fn classify_aggregation(text: &str, tokens: &[&str]) -> (Aggregation, Option<u32>, SortDirection) {
    if let Some(caps) = RANKING.captures(text) {
        let word = caps.name("word").map(|m| m.as_str()).unwrap_or("top");
        let direction = if ASCENDING_WORDS.contains(&word) {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        let n = caps
            .name("after")
            .or_else(|| COUNT_BEFORE_RANKING.captures(text).and_then(|c| c.name("n")))
            // digits only, so a parse failure is an overflow
            .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX))
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_TOP_N)
            .min(MAX_TOP_N);
        return (Aggregation::TopN, Some(n), direction);
    }
    if GROUPING.is_match(text) || has_any(tokens, &["daily", "breakdown"]) {
        return (Aggregation::Grouped, None, SortDirection::Desc);
    }
    if has_any(tokens, &["total", "overall", "sum", "aggregate", "altogether"]) {
        return (Aggregation::Total, None, SortDirection::Desc);
    }
    (Aggregation::Row, None, SortDirection::Desc)
}

fn classify_dimension(text: &str) -> Dimension {
    let by_date = GROUPING
        .captures(text)
        .and_then(|c| c.name("dim"))
        .map(|m| m.as_str().starts_with("da") || m.as_str().starts_with("mon"))
        .unwrap_or(false);
    if by_date || has_phrase(text, "daily") {
        Dimension::Date
    } else {
        Dimension::Item
    }
}

fn classify_subject(tokens: &[&str]) -> Option<Table> {
    if has_any(tokens, &["eligible", "eligibility", "ineligible"]) {
        Some(Table::Eligibility)
    } else if has_any(
        tokens,
        &["ad", "ads", "advertising", "impressions", "impression", "clicks", "click", "campaign", "spend"],
    ) {
        Some(Table::AdSales)
    } else if has_any(tokens, &["sales", "orders", "ordered", "units", "revenue"]) {
        Some(Table::TotalSales)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(question: &str) -> Intent {
        classify(question, SchemaDescriptor::global())
    }

    #[test]
    fn test_top_products_by_cpc() {
        let i = intent("top 3 products by CPC");
        assert_eq!(i.metric, Metric::Cpc);
        assert_eq!(i.aggregation, Aggregation::TopN);
        assert_eq!(i.limit, Some(3));
        assert!(i.is_consistent());
    }

    #[test]
    fn test_total_revenue() {
        let i = intent("what is total revenue");
        assert_eq!(i.metric, Metric::Revenue);
        assert_eq!(i.aggregation, Aggregation::Total);
        assert_eq!(i.limit, None);
    }

    #[test]
    fn test_metric_vocabulary() {
        assert_eq!(intent("show return on ad spend for every item").metric, Metric::Roas);
        assert_eq!(intent("what's our ROAS?").metric, Metric::Roas);
        assert_eq!(intent("average cost per click").metric, Metric::Cpc);
        assert_eq!(intent("click-through rate yesterday").metric, Metric::Ctr);
        assert_eq!(intent("ROI of each product").metric, Metric::Roi);
        assert_eq!(intent("ad revenue versus total sales ratio").metric, Metric::Roi);
        assert_eq!(intent("how many units were ordered").metric, Metric::Units);
    }

    #[test]
    fn test_default_top_n() {
        let i = intent("highest ROAS products");
        assert_eq!(i.aggregation, Aggregation::TopN);
        assert_eq!(i.limit, Some(DEFAULT_TOP_N));
        assert_eq!(i.direction, SortDirection::Desc);
    }

    #[test]
    fn test_number_before_ranking_word_and_ascending() {
        let i = intent("which 4 cheapest items by cpc");
        assert_eq!(i.limit, Some(4));
        assert_eq!(i.direction, SortDirection::Asc);
    }

    #[test]
    fn test_grouping_beats_total() {
        let i = intent("total sales by day");
        assert_eq!(i.aggregation, Aggregation::Grouped);
        assert_eq!(i.dimension, Dimension::Date);
    }

    #[test]
    fn test_unmatched_question_is_generic_row() {
        let i = intent("tell me something interesting");
        assert_eq!(i, Intent::generic());
    }

    #[test]
    fn test_generic_subject() {
        assert_eq!(intent("which items are not eligible").subject, Some(Table::Eligibility));
    }

    #[test]
    fn test_generic_question_names_its_column() {
        let i = intent("total clicks");
        assert_eq!((i.metric, i.aggregation), (Metric::Generic, Aggregation::Total));
        assert_eq!(i.column.as_deref(), Some("clicks"));

        assert_eq!(intent("what is total ad spend").column.as_deref(), Some("ad_spend"));
        assert_eq!(intent("total impressions overall").column.as_deref(), Some("impressions"));
        assert_eq!(intent("tell me something interesting").column, None);
    }

    #[test]
    fn test_filter_column_is_not_the_measure() {
        let i = intent("total clicks for items with at least 1000 impressions");
        assert_eq!(i.column.as_deref(), Some("clicks"));
        assert_eq!(i.filters[0].column, "impressions");

        assert_eq!(intent("top products with at least 1000 impressions").column, None);
    }

    #[test]
    fn test_per_day_is_grouping_not_ratio() {
        let i = intent("show ad sales per day");
        assert_eq!(i.metric, Metric::Generic);
        assert_eq!(i.aggregation, Aggregation::Grouped);
        assert_eq!(i.dimension, Dimension::Date);
        assert_eq!(i.column.as_deref(), Some("ad_sales"));
    }

    #[test]
    fn test_large_top_n_is_capped() {
        assert_eq!(intent("top 1000 products by roas").limit, Some(MAX_TOP_N));
        assert_eq!(intent("top 99999999999 products by roas").limit, Some(MAX_TOP_N));
        assert_eq!(intent("top 250 products by cpc").limit, Some(MAX_TOP_N));
    }
}
