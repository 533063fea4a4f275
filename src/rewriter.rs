//! SQL Rewriter
//!
//! Best-effort repair of a structurally valid candidate: markdown fences,
//! duplicated clause keywords, canonical table aliases (`a`, `t`, `e`) and
//! qualification of bare column names. The output is the parser's canonical
//! rendering, so repairing twice yields the same text.

use crate::candidate::SqlCandidate;
use crate::error::{PipelineError, Result};
use crate::schema::{SchemaDescriptor, Table};
use crate::validation::inspect::{self, has_subquery_expr, projection_aliases, Source};
use lazy_static::lazy_static;
use regex::Regex;
use sqlparser::ast::{
    visit_expressions_mut, Expr, Ident, ObjectName, SetExpr, Statement, TableAlias, TableFactor,
};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;
use tracing::{debug, info};

lazy_static! {
    static ref DUPLICATE_KEYWORDS: Vec<(Regex, &'static str)> = vec![
        (Regex::new(r"(?i)\bselect(?:\s+select\b)+").expect("select"), "SELECT"),
        (Regex::new(r"(?i)\bfrom(?:\s+from\b)+").expect("from"), "FROM"),
        (Regex::new(r"(?i)\bwhere(?:\s+where\b)+").expect("where"), "WHERE"),
        (Regex::new(r"(?i)\bgroup\s+by(?:\s+group\s+by\b)+").expect("group by"), "GROUP BY"),
        (Regex::new(r"(?i)\border\s+by(?:\s+order\s+by\b)+").expect("order by"), "ORDER BY"),
        (Regex::new(r"(?i)\blimit(?:\s+limit\b)+").expect("limit"), "LIMIT"),
    ];
}

pub struct SqlRewriter {
    schema: &'static SchemaDescriptor,
}

impl SqlRewriter {
    pub fn new(schema: &'static SchemaDescriptor) -> Self {
        Self { schema }
    }

    /// Repair `candidate`, keeping its provenance. Fails when the text cannot be
    /// read as exactly one query.
    pub fn repair(&self, candidate: &SqlCandidate) -> Result<SqlCandidate> {
        let text = normalize_text(&candidate.sql);

        let mut statements = inspect::parse(&text)
            .map_err(|e| PipelineError::RepairFailed(format!("parse error: {}", e)))?;
        if statements.len() != 1 {
            return Err(PipelineError::RepairFailed(format!(
                "expected one statement, found {}",
                statements.len()
            )));
        }
        let mut statement = statements.remove(0);
        if !matches!(statement, Statement::Query(_)) {
            return Err(PipelineError::RepairFailed("statement is not a query".to_string()));
        }

        if self.canonicalize_aliases(&mut statement) {
            debug!("Canonicalized table aliases");
        } else {
            debug!("Formatting-only repair");
        }

        let repaired = statement.to_string();
        if repaired != candidate.sql {
            info!("Rewrote SQL: {}", repaired);
        }
        Ok(candidate.with_sql(repaired))
    }

    /// Returns false when the statement shape makes alias rewriting unsafe.
    fn canonicalize_aliases(&self, statement: &mut Statement) -> bool {
        if has_subquery_expr(statement) {
            return false;
        }
        let Statement::Query(query) = &mut *statement else {
            return false;
        };
        if !matches!(query.body.as_ref(), SetExpr::Select(_)) {
            return false;
        }

        let sources = inspect::sources(query);
        if !is_simple(&sources) {
            return false;
        }
        let output_aliases = projection_aliases(query);

        let mut qualifiers: HashMap<String, Table> = HashMap::new();
        for source in &sources {
            if let Some(table) = source.table {
                qualifiers.insert(source.qualifier(), table);
                qualifiers.insert(table.name().to_string(), table);
            }
        }
        let order: Vec<Table> = sources.iter().filter_map(|s| s.table).collect();

        if let SetExpr::Select(select) = query.body.as_mut() {
            for twj in select.from.iter_mut() {
                rename_factor(&mut twj.relation);
                for join in twj.joins.iter_mut() {
                    rename_factor(&mut join.relation);
                }
            }
        }

        let schema = self.schema;
        let _ = visit_expressions_mut(statement, |expr| {
            match expr {
                Expr::CompoundIdentifier(idents) if idents.len() >= 2 => {
                    let qualifier = idents[idents.len() - 2].value.to_lowercase();
                    if let Some(table) = qualifiers.get(&qualifier) {
                        let column = idents[idents.len() - 1].clone();
                        *idents = vec![Ident::new(table.alias()), column];
                    }
                }
                Expr::Identifier(ident) if ident.quote_style.is_none() => {
                    let name = ident.value.to_lowercase();
                    if !output_aliases.contains(&name) {
                        if let Some(table) = order.iter().find(|t| schema.table(**t).has_column(&name)) {
                            *expr = Expr::CompoundIdentifier(vec![Ident::new(table.alias()), ident.clone()]);
                        }
                    }
                }
                _ => {}
            }
            ControlFlow::<()>::Continue(())
        });
        true
    }
}

/// One plain table per source, each table at most once.
fn is_simple(sources: &[Source]) -> bool {
    let mut seen = HashSet::new();
    sources
        .iter()
        .all(|s| matches!(s.table, Some(table) if seen.insert(table)))
}

fn rename_factor(factor: &mut TableFactor) {
    if let TableFactor::Table { name, alias, .. } = factor {
        if let Some(table) = Table::from_identifier(&name.to_string()) {
            *name = ObjectName(vec![Ident::new(table.name())]);
            *alias = Some(TableAlias {
                name: Ident::new(table.alias()),
                columns: vec![],
            });
        }
    }
}

/// Text-level cleanup applied before parsing.
fn normalize_text(sql: &str) -> String {
    let unfenced: Vec<&str> = sql
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect();
    let mut text = unfenced.join("\n");

    for (pattern, keyword) in DUPLICATE_KEYWORDS.iter() {
        text = pattern.replace_all(&text, *keyword).into_owned();
    }

    text.trim().trim_end_matches(';').trim_end().to_string()
}
