//! Hand-written SQL per (metric, aggregation).
//!
//! Values from the question reach the database only as bound `?` parameters.
//! The one exception is the TOP_N row count, a typed integer rendered as a
//! literal so that the statement reads `LIMIT N`.

use crate::candidate::{SqlCandidate, SqlParam};
use crate::intent::{Aggregation, Dimension, Filter, FilterValue, Intent, Metric};
use crate::schema::{ColumnDef, SchemaDescriptor, SemanticType, Table};
use std::borrow::Cow;
use tracing::{debug, warn};

/// How one metric is computed and where its columns live.
struct MetricSql {
    /// Output column name
    alias: Cow<'static, str>,
    /// Per-row expression
    row: Cow<'static, str>,
    /// Expression over a group or the whole table
    aggregate: Cow<'static, str>,
    from: Cow<'static, str>,
    /// Tables in FROM order; the first one supplies the grouping key
    tables: &'static [Table],
}

const ROAS: MetricSql = MetricSql {
    alias: Cow::Borrowed("roas"),
    row: Cow::Borrowed("ROUND(a.ad_sales * 1.0 / NULLIF(a.ad_spend, 0), 2)"),
    aggregate: Cow::Borrowed("ROUND(SUM(a.ad_sales) * 1.0 / NULLIF(SUM(a.ad_spend), 0), 2)"),
    from: Cow::Borrowed("ad_sales a"),
    tables: &[Table::AdSales],
};

const CPC: MetricSql = MetricSql {
    alias: Cow::Borrowed("cpc"),
    row: Cow::Borrowed("ROUND(a.ad_spend * 1.0 / NULLIF(a.clicks, 0), 2)"),
    aggregate: Cow::Borrowed("ROUND(SUM(a.ad_spend) * 1.0 / NULLIF(SUM(a.clicks), 0), 2)"),
    from: Cow::Borrowed("ad_sales a"),
    tables: &[Table::AdSales],
};

const CTR: MetricSql = MetricSql {
    alias: Cow::Borrowed("ctr_percent"),
    row: Cow::Borrowed("ROUND(a.clicks * 100.0 / NULLIF(a.impressions, 0), 2)"),
    aggregate: Cow::Borrowed("ROUND(SUM(a.clicks) * 100.0 / NULLIF(SUM(a.impressions), 0), 2)"),
    from: Cow::Borrowed("ad_sales a"),
    tables: &[Table::AdSales],
};

const ROI: MetricSql = MetricSql {
    alias: Cow::Borrowed("roi"),
    row: Cow::Borrowed("ROUND((t.total_sales - a.ad_spend) * 1.0 / NULLIF(a.ad_spend, 0), 2)"),
    aggregate: Cow::Borrowed("ROUND((SUM(t.total_sales) - SUM(a.ad_spend)) * 1.0 / NULLIF(SUM(a.ad_spend), 0), 2)"),
    from: Cow::Borrowed("total_sales t JOIN ad_sales a ON t.item_id = a.item_id AND t.date = a.date"),
    tables: &[Table::TotalSales, Table::AdSales],
};

const REVENUE: MetricSql = MetricSql {
    alias: Cow::Borrowed("revenue"),
    row: Cow::Borrowed("t.total_sales"),
    aggregate: Cow::Borrowed("ROUND(SUM(t.total_sales), 2)"),
    from: Cow::Borrowed("total_sales t"),
    tables: &[Table::TotalSales],
};

const UNITS: MetricSql = MetricSql {
    alias: Cow::Borrowed("units"),
    row: Cow::Borrowed("t.total_units_ordered"),
    aggregate: Cow::Borrowed("SUM(t.total_units_ordered)"),
    from: Cow::Borrowed("total_sales t"),
    tables: &[Table::TotalSales],
};

const ROW_COUNT_AD_SALES: MetricSql = MetricSql {
    alias: Cow::Borrowed("row_count"),
    row: Cow::Borrowed("a.item_id"),
    aggregate: Cow::Borrowed("COUNT(*)"),
    from: Cow::Borrowed("ad_sales a"),
    tables: &[Table::AdSales],
};

const ROW_COUNT_TOTAL_SALES: MetricSql = MetricSql {
    alias: Cow::Borrowed("row_count"),
    row: Cow::Borrowed("t.item_id"),
    aggregate: Cow::Borrowed("COUNT(*)"),
    from: Cow::Borrowed("total_sales t"),
    tables: &[Table::TotalSales],
};

const ROW_COUNT_ELIGIBILITY: MetricSql = MetricSql {
    alias: Cow::Borrowed("row_count"),
    row: Cow::Borrowed("e.eligibility"),
    aggregate: Cow::Borrowed("COUNT(*)"),
    from: Cow::Borrowed("eligibility e"),
    tables: &[Table::Eligibility],
};

/// Sum of one measure column, for GENERIC questions that name it.
fn measure_sql(table: Table, column: &ColumnDef) -> MetricSql {
    let k = table.alias();
    let sum = match column.ty {
        SemanticType::Currency => format!("ROUND(SUM({k}.{}), 2)", column.name),
        _ => format!("SUM({k}.{})", column.name),
    };
    MetricSql {
        alias: Cow::Owned(format!("{}_sum", column.name)),
        row: Cow::Owned(format!("{k}.{}", column.name)),
        aggregate: Cow::Owned(sum),
        from: Cow::Owned(format!("{} {k}", table.name())),
        tables: match table {
            Table::AdSales => &[Table::AdSales],
            Table::TotalSales => &[Table::TotalSales],
            Table::Eligibility => &[Table::Eligibility],
        },
    }
}

fn metric_sql(intent: &Intent, schema: &SchemaDescriptor) -> MetricSql {
    match intent.metric {
        Metric::Roas => ROAS,
        Metric::Cpc => CPC,
        Metric::Ctr => CTR,
        Metric::Roi => ROI,
        Metric::Revenue => REVENUE,
        Metric::Units => UNITS,
        Metric::Generic => {
            if let Some((table, column)) = intent.column.as_deref().and_then(|c| schema.measure(c)) {
                return measure_sql(table, column);
            }
            match intent.subject.unwrap_or(Table::AdSales) {
                Table::AdSales => ROW_COUNT_AD_SALES,
                Table::TotalSales => ROW_COUNT_TOTAL_SALES,
                Table::Eligibility => ROW_COUNT_ELIGIBILITY,
            }
        }
    }
}

pub struct TemplateFallback {
    schema: &'static SchemaDescriptor,
    row_limit: u32,
}

impl TemplateFallback {
    pub fn new(schema: &'static SchemaDescriptor, row_limit: u32) -> Self {
        Self {
            schema,
            row_limit: row_limit.max(1),
        }
    }

    /// Template for `intent`. Every (metric, aggregation) pair has one.
    pub fn template_for(&self, intent: &Intent) -> SqlCandidate {
        let m = metric_sql(intent, self.schema);
        let (where_clause, params) = self.where_clause(&m, &intent.filters);
        let key = key_expr(m.tables[0], intent.dimension);

        let sql = match intent.aggregation {
            Aggregation::Row => format!(
                "SELECT {} FROM {}{} LIMIT {}",
                self.row_columns(intent, &m),
                m.from,
                where_clause,
                intent.limit.unwrap_or(self.row_limit)
            ),
            Aggregation::Grouped => {
                let order = match intent.dimension {
                    Dimension::Item => format!("{} {}", m.alias, intent.direction.sql()),
                    Dimension::Date => key.to_string(),
                };
                format!(
                    "SELECT {}, {} AS {} FROM {}{} GROUP BY {} ORDER BY {} LIMIT {}",
                    key.select,
                    m.aggregate,
                    m.alias,
                    m.from,
                    where_clause,
                    key,
                    order,
                    intent.limit.unwrap_or(self.row_limit)
                )
            }
            Aggregation::TopN => format!(
                "SELECT {}, {} AS {} FROM {}{} GROUP BY {} ORDER BY {} {} LIMIT {}",
                key.select,
                m.aggregate,
                m.alias,
                m.from,
                where_clause,
                key,
                m.alias,
                intent.direction.sql(),
                intent.limit.unwrap_or(crate::intent::DEFAULT_TOP_N)
            ),
            Aggregation::Total => format!(
                "SELECT {} AS {} FROM {}{}",
                m.aggregate, m.alias, m.from, where_clause
            ),
        };

        debug!("Template for {}/{:?}: {}", intent.metric, intent.aggregation, sql);
        SqlCandidate::template(sql, params)
    }

    fn row_columns(&self, intent: &Intent, m: &MetricSql) -> String {
        let table = m.tables[0];
        let k = table.alias();
        let measure = intent.column.as_deref().and_then(|c| self.schema.measure(c));
        match (intent.metric, measure) {
            (Metric::Generic, Some(_)) => format!("{k}.date, {k}.item_id, {}", m.row),
            (Metric::Generic, _) => self
                .schema
                .table(table)
                .columns
                .iter()
                .map(|c| format!("{}.{}", k, c.name))
                .collect::<Vec<_>>()
                .join(", "),
            _ => format!("{k}.date, {k}.item_id, {} AS {}", m.row, m.alias),
        }
    }

    /// `WHERE` predicates with one bound parameter each. Filters on columns the
    /// template's tables lack are dropped.
    fn where_clause(&self, m: &MetricSql, filters: &[Filter]) -> (String, Vec<SqlParam>) {
        let mut predicates = Vec::new();
        let mut params = Vec::new();
        for filter in filters {
            let Some(table) = m
                .tables
                .iter()
                .find(|t| self.schema.table(**t).has_column(&filter.column))
            else {
                warn!(
                    "Dropping filter on {}: not available in {}",
                    filter.column, m.from
                );
                continue;
            };
            predicates.push(format!("{}.{} {} ?", table.alias(), filter.column, filter.op.sql()));
            let counted = self
                .schema
                .table(*table)
                .column(&filter.column)
                .is_some_and(|c| matches!(c.ty, SemanticType::Count | SemanticType::Identifier));
            params.push(match &filter.value {
                // whole-number thresholds on integer columns bind as integers
                FilterValue::Number(n) if counted && n.fract() == 0.0 => SqlParam::Integer(*n as i64),
                FilterValue::Number(n) => SqlParam::Real(*n),
                FilterValue::Date(d) => SqlParam::Text(d.format("%Y-%m-%d").to_string()),
            });
        }
        if predicates.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", predicates.join(" AND ")), params)
        }
    }
}

/// Grouping key: the expression grouped on and how it is projected.
struct KeyExpr {
    group: String,
    select: String,
}

impl std::fmt::Display for KeyExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.group)
    }
}

fn key_expr(table: Table, dimension: Dimension) -> KeyExpr {
    let k = table.alias();
    match (table, dimension) {
        (_, Dimension::Item) => KeyExpr {
            group: format!("{k}.item_id"),
            select: format!("{k}.item_id"),
        },
        (Table::Eligibility, Dimension::Date) => KeyExpr {
            group: "DATE(e.eligibility_datetime_utc)".to_string(),
            select: "DATE(e.eligibility_datetime_utc) AS day".to_string(),
        },
        (_, Dimension::Date) => KeyExpr {
            group: format!("{k}.date"),
            select: format!("{k}.date"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::{Comparison, SortDirection};
    use chrono::NaiveDate;

    fn templates() -> TemplateFallback {
        TemplateFallback::new(SchemaDescriptor::global(), 50)
    }

    #[test]
    fn test_cpc_top_n() {
        let candidate = templates().template_for(&Intent::top_n(Metric::Cpc, 3));
        assert_eq!(
            candidate.sql,
            "SELECT a.item_id, ROUND(SUM(a.ad_spend) * 1.0 / NULLIF(SUM(a.clicks), 0), 2) AS cpc \
             FROM ad_sales a GROUP BY a.item_id ORDER BY cpc DESC LIMIT 3"
        );
        assert!(candidate.valid);
        assert!(candidate.params.is_empty());
    }

    #[test]
    fn test_total_revenue_has_no_limit() {
        let candidate = templates().template_for(&Intent::new(Metric::Revenue, Aggregation::Total));
        assert_eq!(candidate.sql, "SELECT ROUND(SUM(t.total_sales), 2) AS revenue FROM total_sales t");
    }

    #[test]
    fn test_roi_joins_both_tables() {
        let candidate = templates().template_for(&Intent::new(Metric::Roi, Aggregation::Grouped));
        assert!(candidate.sql.contains("FROM total_sales t JOIN ad_sales a"));
        assert!(candidate.sql.contains("GROUP BY t.item_id"));
    }

    #[test]
    fn test_filters_are_bound() {
        let intent = Intent::top_n(Metric::Cpc, 5).with_filters(vec![
            Filter::new("impressions", Comparison::Ge, FilterValue::Number(1000.0)),
            Filter::new(
                "date",
                Comparison::Ge,
                FilterValue::Date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()),
            ),
        ]);
        let candidate = templates().template_for(&intent);
        assert!(candidate
            .sql
            .contains("WHERE a.impressions >= ? AND a.date >= ? GROUP BY"));
        assert_eq!(
            candidate.params,
            vec![SqlParam::Integer(1000), SqlParam::Text("2025-01-01".to_string())]
        );
    }

    #[test]
    fn test_money_and_fractional_thresholds_bind_as_real() {
        let intent = Intent::new(Metric::Roas, Aggregation::Row).with_filters(vec![
            Filter::new("ad_spend", Comparison::Lt, FilterValue::Number(5.0)),
            Filter::new("clicks", Comparison::Gt, FilterValue::Number(2.5)),
        ]);
        assert_eq!(
            templates().template_for(&intent).params,
            vec![SqlParam::Real(5.0), SqlParam::Real(2.5)]
        );
    }

    #[test]
    fn test_filter_on_missing_column_is_dropped() {
        let intent = Intent::new(Metric::Revenue, Aggregation::Total).with_filters(vec![Filter::new(
            "clicks",
            Comparison::Gt,
            FilterValue::Number(10.0),
        )]);
        let candidate = templates().template_for(&intent);
        assert!(!candidate.sql.contains("WHERE"));
        assert!(candidate.params.is_empty());
    }

    #[test]
    fn test_ascending_ranking() {
        let mut intent = Intent::top_n(Metric::Roas, 2);
        intent.direction = SortDirection::Asc;
        let candidate = templates().template_for(&intent);
        assert!(candidate.sql.ends_with("ORDER BY roas ASC LIMIT 2"));
    }

    #[test]
    fn test_generic_subjects() {
        let mut intent = Intent::generic();
        intent.subject = Some(Table::Eligibility);
        let rows = templates().template_for(&intent);
        assert_eq!(
            rows.sql,
            "SELECT e.eligibility_datetime_utc, e.item_id, e.eligibility, e.message FROM eligibility e LIMIT 50"
        );

        intent.aggregation = Aggregation::Grouped;
        intent.dimension = Dimension::Date;
        let grouped = templates().template_for(&intent);
        assert!(grouped.sql.contains("GROUP BY DATE(e.eligibility_datetime_utc)"));
    }

    #[test]
    fn test_generic_total_sums_the_named_column() {
        let clicks = Intent::new(Metric::Generic, Aggregation::Total).about_column("clicks");
        assert_eq!(
            templates().template_for(&clicks).sql,
            "SELECT SUM(a.clicks) AS clicks_sum FROM ad_sales a"
        );

        let spend = Intent::new(Metric::Generic, Aggregation::Total).about_column("ad_spend");
        assert_eq!(
            templates().template_for(&spend).sql,
            "SELECT ROUND(SUM(a.ad_spend), 2) AS ad_spend_sum FROM ad_sales a"
        );
    }

    #[test]
    fn test_generic_ranking_and_listing_use_the_named_column() {
        let top = Intent::top_n(Metric::Generic, 3).about_column("total_units_ordered");
        assert_eq!(
            templates().template_for(&top).sql,
            "SELECT t.item_id, SUM(t.total_units_ordered) AS total_units_ordered_sum FROM total_sales t \
             GROUP BY t.item_id ORDER BY total_units_ordered_sum DESC LIMIT 3"
        );

        let rows = Intent::generic().about_column("impressions");
        assert_eq!(
            templates().template_for(&rows).sql,
            "SELECT a.date, a.item_id, a.impressions FROM ad_sales a LIMIT 50"
        );
    }

    #[test]
    fn test_generic_without_column_counts_rows() {
        let total = templates().template_for(&Intent::new(Metric::Generic, Aggregation::Total));
        assert_eq!(total.sql, "SELECT COUNT(*) AS row_count FROM ad_sales a");

        // not a measure, so nothing to sum
        let keyed = Intent::new(Metric::Generic, Aggregation::Total).about_column("item_id");
        assert_eq!(templates().template_for(&keyed).sql, total.sql);
    }
}
