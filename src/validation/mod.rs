//! SQL Validator
//!
//! Checks a candidate against structural rules (SELECT only, authorized
//! tables and columns, no denylisted identifiers) and, when those pass,
//! semantic rules derived from the classified intent. Any structural
//! violation is authoritative.

pub mod inspect;
pub mod rules;

pub use rules::{ValidationReport, Violation, DENYLISTED_IDENTIFIERS, FORBIDDEN_KEYWORDS};

use crate::candidate::SqlCandidate;
use crate::intent::{Aggregation, Intent, Metric};
use crate::schema::{SchemaDescriptor, Table};
use inspect::{
    has_group_by, has_ratio, parse, projection_aliases, qualifier_map, references_column, sources,
    sources_with_subqueries,
};
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::{visit_expressions, visit_relations, Expr, Query, Statement, Value};
use std::ops::ControlFlow;
use tracing::debug;

lazy_static! {
    static ref TABLE_POSITION: Regex =
        Regex::new(r#"(?i)\b(?:from|join)\s+("[^"]+"|`[^`]+`|\[[^\]]+\]|[a-z_][a-z0-9_.]*)"#)
            .expect("table position pattern");
    static ref WORD: Regex = Regex::new(r"[A-Za-z_]+").expect("word pattern");
}

/// Remove leading whitespace, `--` line comments and `/* */` block comments.
pub fn strip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map(|(_, r)| r).unwrap_or("").trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map(|(_, r)| r).unwrap_or("").trim_start();
        } else {
            return rest;
        }
    }
}

/// True when the statement begins with the SELECT keyword.
pub fn starts_with_select(sql: &str) -> bool {
    let head = strip_leading_comments(sql);
    match head.get(..6) {
        Some(keyword) if keyword.eq_ignore_ascii_case("select") => head[6..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || c == '_')),
        _ => false,
    }
}

fn is_denylisted(name: &str) -> bool {
    let bare = name.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']')).to_lowercase();
    DENYLISTED_IDENTIFIERS.contains(&bare.as_str())
}

pub struct SqlValidator {
    schema: &'static SchemaDescriptor,
}

impl SqlValidator {
    pub fn new(schema: &'static SchemaDescriptor) -> Self {
        Self { schema }
    }

    pub fn validate(&self, candidate: &SqlCandidate, intent: &Intent) -> ValidationReport {
        let sql = candidate.sql.as_str();
        let mut violations = Vec::new();

        if !starts_with_select(sql) {
            violations.push(Violation::NotSelect);
        }

        let statements = match parse(sql) {
            Ok(statements) => statements,
            Err(e) => {
                violations.extend(self.scan_tokens(sql));
                if !violations.iter().any(Violation::is_structural) {
                    violations.push(Violation::Unparseable(e.to_string()));
                }
                return self.finish(candidate, violations);
            }
        };

        if statements.len() != 1 {
            violations.push(Violation::MultipleStatements);
        }
        for statement in &statements {
            violations.extend(self.structural(statement));
        }

        if violations.is_empty() {
            if let Some(statement) = statements.first() {
                violations.extend(self.semantic(statement, intent));
            }
        }
        self.finish(candidate, violations)
    }

    fn finish(&self, candidate: &SqlCandidate, violations: Vec<Violation>) -> ValidationReport {
        let report = ValidationReport::from_violations(violations);
        if !report.violations.is_empty() {
            debug!(
                "{} candidate rejected: {}",
                candidate.provenance,
                report
                    .violations
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join("; ")
            );
        }
        report
    }

    fn structural(&self, statement: &Statement) -> Vec<Violation> {
        let mut violations = Vec::new();
        let query = match statement {
            Statement::Query(query) => query,
            _ => return vec![Violation::NotSelect],
        };

        let _ = visit_relations(statement, |name| {
            let raw = name.to_string();
            if Table::from_identifier(&raw).is_none() {
                violations.push(Violation::UnauthorizedTable {
                    suggestion: self.suggest_table(&raw),
                    name: raw.clone(),
                });
            }
            if is_denylisted(&raw) {
                violations.push(Violation::DeniedIdentifier(raw.to_lowercase()));
            }
            ControlFlow::<()>::Continue(())
        });

        let sources = sources(query);
        for source in &sources {
            if let Some(alias) = &source.alias {
                if is_denylisted(alias) {
                    violations.push(Violation::DeniedIdentifier(alias.clone()));
                }
            }
        }

        violations.extend(self.unknown_columns(statement, query));
        violations
    }

    fn unknown_columns(&self, statement: &Statement, query: &Query) -> Vec<Violation> {
        let sources = sources_with_subqueries(statement, query);
        let qualifiers = qualifier_map(&sources);
        let aliases = projection_aliases(query);
        let derived: Vec<String> = sources
            .iter()
            .filter(|s| s.table.is_none())
            .filter_map(|s| s.alias.clone())
            .collect();

        let mut violations = Vec::new();
        let _ = visit_expressions(statement, |expr| {
            match expr {
                Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
                    let qualifier = idents[idents.len() - 2].value.to_lowercase();
                    let column = idents[idents.len() - 1].value.to_lowercase();
                    match qualifiers.get(&qualifier) {
                        Some(table) if self.schema.table(*table).has_column(&column) => {}
                        None if derived.contains(&qualifier) => {}
                        _ => violations.push(Violation::UnknownColumn(format!("{}.{}", qualifier, column))),
                    }
                }
                Expr::Identifier(ident) if ident.quote_style.is_none() => {
                    let name = ident.value.to_lowercase();
                    if !self.schema.is_known_column(&name) && !aliases.contains(&name) && derived.is_empty() {
                        violations.push(Violation::UnknownColumn(name));
                    }
                }
                _ => {}
            }
            ControlFlow::<()>::Continue(())
        });
        violations
    }

    fn semantic(&self, statement: &Statement, intent: &Intent) -> Vec<Violation> {
        let mut violations = Vec::new();
        let Statement::Query(query) = statement else {
            return violations;
        };

        let metric_ok = match intent.metric {
            Metric::Roi => has_ratio(statement, &["total_sales"], "ad_spend"),
            Metric::Roas => has_ratio(statement, &["ad_sales"], "ad_spend"),
            Metric::Cpc => has_ratio(statement, &["ad_spend"], "clicks"),
            Metric::Ctr => has_ratio(statement, &["clicks"], "impressions"),
            Metric::Revenue | Metric::Units | Metric::Generic => true,
        };
        if !metric_ok {
            violations.push(Violation::MetricMismatch(intent.metric));
        }
        if let (Metric::Generic, Some(column)) = (intent.metric, &intent.column) {
            if !references_column(statement, column) {
                violations.push(Violation::ColumnMissing(column.clone()));
            }
        }

        match intent.aggregation {
            Aggregation::TopN => {
                let expected = intent.limit.unwrap_or_default();
                match &query.limit {
                    None => violations.push(Violation::LimitMissing { expected }),
                    Some(Expr::Value(Value::Number(n, _))) if n.parse::<u32>().ok() == Some(expected) => {}
                    Some(other) => violations.push(Violation::LimitMismatch {
                        expected,
                        found: other.to_string(),
                    }),
                }
            }
            Aggregation::Total => {
                if query.limit.is_some() {
                    violations.push(Violation::UnexpectedLimit);
                }
            }
            Aggregation::Grouped => {
                if !has_group_by(query) {
                    violations.push(Violation::GroupingMissing);
                }
            }
            Aggregation::Row => {}
        }
        violations
    }

    /// Fallback scan for statements sqlparser cannot read.
    fn scan_tokens(&self, sql: &str) -> Vec<Violation> {
        let mut violations = Vec::new();
        for caps in TABLE_POSITION.captures_iter(sql) {
            let Some(raw) = caps.get(1).map(|m| m.as_str()) else {
                continue;
            };
            if !self.schema.is_allowed_table(raw) {
                violations.push(Violation::UnauthorizedTable {
                    name: raw.to_string(),
                    suggestion: self.suggest_table(raw),
                });
            }
            if is_denylisted(raw) {
                violations.push(Violation::DeniedIdentifier(raw.to_lowercase()));
            }
        }
        for word in WORD.find_iter(sql) {
            let lower = word.as_str().to_lowercase();
            if FORBIDDEN_KEYWORDS.contains(&lower.as_str()) {
                violations.push(Violation::ForbiddenKeyword(lower));
            }
        }
        violations
    }

    fn suggest_table(&self, raw: &str) -> Option<&'static str> {
        let lower = raw.to_lowercase();
        self.schema
            .allowed_table_names()
            .map(|name| (name, strsim::jaro_winkler(&lower, name)))
            .filter(|(_, score)| *score >= 0.8)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(name, _)| name)
    }
}
