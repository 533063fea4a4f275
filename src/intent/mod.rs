//! Intent
//!
//! Structured interpretation of a question: which metric is asked for, how the
//! rows are aggregated, and which filters apply. Produced once per request by
//! the classifier and consumed by generation, validation and the templates.

pub mod classifier;
pub mod filters;

pub use classifier::classify;
pub use filters::{extract_filters, Comparison, Filter, FilterValue};

use crate::schema::Table;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default N for "top"/"best" questions that do not name a number.
pub const DEFAULT_TOP_N: u32 = 5;

/// Upper bound for N in top-N questions.
pub const MAX_TOP_N: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Metric {
    Roi,
    Roas,
    Cpc,
    Ctr,
    Revenue,
    Units,
    Generic,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Roi,
        Metric::Roas,
        Metric::Cpc,
        Metric::Ctr,
        Metric::Revenue,
        Metric::Units,
        Metric::Generic,
    ];
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Metric::Roi => "ROI",
            Metric::Roas => "ROAS",
            Metric::Cpc => "CPC",
            Metric::Ctr => "CTR",
            Metric::Revenue => "REVENUE",
            Metric::Units => "UNITS",
            Metric::Generic => "GENERIC",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregation {
    Row,
    Grouped,
    TopN,
    Total,
}

impl Aggregation {
    pub const ALL: [Aggregation; 4] = [
        Aggregation::Row,
        Aggregation::Grouped,
        Aggregation::TopN,
        Aggregation::Total,
    ];
}

/// Key used for grouping and ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Dimension {
    #[default]
    Item,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SortDirection {
    #[default]
    Desc,
    Asc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Desc => "DESC",
            SortDirection::Asc => "ASC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub metric: Metric,
    pub aggregation: Aggregation,
    /// Always set for TOP_N, optional row cap otherwise
    pub limit: Option<u32>,
    pub filters: Vec<Filter>,
    pub dimension: Dimension,
    pub direction: SortDirection,
    /// Most relevant table for GENERIC questions
    pub subject: Option<Table>,
    /// Measure column a GENERIC question asks about ("total clicks")
    pub column: Option<String>,
}

impl Intent {
    /// The permissive default for questions nothing matched.
    pub fn generic() -> Self {
        Self {
            metric: Metric::Generic,
            aggregation: Aggregation::Row,
            limit: None,
            filters: Vec::new(),
            dimension: Dimension::Item,
            direction: SortDirection::Desc,
            subject: None,
            column: None,
        }
    }

    pub fn new(metric: Metric, aggregation: Aggregation) -> Self {
        let mut intent = Self {
            metric,
            aggregation,
            ..Self::generic()
        };
        if aggregation == Aggregation::TopN {
            intent.limit = Some(DEFAULT_TOP_N);
        }
        intent
    }

    pub fn top_n(metric: Metric, n: u32) -> Self {
        Self {
            limit: Some(n.clamp(1, MAX_TOP_N)),
            ..Self::new(metric, Aggregation::TopN)
        }
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = filters;
        self
    }

    pub fn about_column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    /// TOP_N implies a positive limit.
    pub fn is_consistent(&self) -> bool {
        match self.aggregation {
            Aggregation::TopN => matches!(self.limit, Some(n) if n > 0),
            _ => true,
        }
    }
}
