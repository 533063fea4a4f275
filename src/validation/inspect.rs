//! Read-only inspection of parsed statements, shared by the validator and the
//! rewriter.

use crate::schema::Table;
use sqlparser::ast::{
    visit_expressions, BinaryOperator, Expr, GroupByExpr, Query, SelectItem, SetExpr, Statement,
    TableFactor, TableWithJoins,
};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::{Parser, ParserError};
use std::collections::{HashMap, HashSet};
use std::ops::ControlFlow;

pub fn parse(sql: &str) -> Result<Vec<Statement>, ParserError> {
    Parser::parse_sql(&SQLiteDialect {}, sql)
}

/// A table (or derived table) in FROM/JOIN position.
#[derive(Debug, Clone)]
pub struct Source {
    pub table: Option<Table>,
    pub name: String,
    pub alias: Option<String>,
}

impl Source {
    /// Name other clauses use to qualify its columns.
    pub fn qualifier(&self) -> String {
        self.alias.clone().unwrap_or_else(|| self.name.clone())
    }
}

/// Sources of every SELECT in the statement, in FROM order, including derived
/// tables and set operations.
pub fn sources(query: &Query) -> Vec<Source> {
    let mut out = Vec::new();
    collect_set_expr(&query.body, &mut out, &mut Vec::new());
    out
}

/// Like [`sources`], plus the sources of subqueries used as expressions
/// (`IN (SELECT ..)`, `EXISTS`, scalar subqueries) at any depth.
pub fn sources_with_subqueries(statement: &Statement, query: &Query) -> Vec<Source> {
    let mut out = sources(query);
    let _ = visit_expressions(statement, |expr| {
        match expr {
            Expr::Subquery(subquery)
            | Expr::InSubquery { subquery, .. }
            | Expr::Exists { subquery, .. } => out.extend(sources(subquery)),
            _ => {}
        }
        ControlFlow::<()>::Continue(())
    });
    out
}

/// Output aliases (`expr AS alias`) of every SELECT in the statement.
pub fn projection_aliases(query: &Query) -> HashSet<String> {
    let mut aliases = Vec::new();
    collect_set_expr(&query.body, &mut Vec::new(), &mut aliases);
    aliases.into_iter().collect()
}

fn collect_set_expr(body: &SetExpr, sources: &mut Vec<Source>, aliases: &mut Vec<String>) {
    match body {
        SetExpr::Select(select) => {
            for item in &select.projection {
                if let SelectItem::ExprWithAlias { alias, .. } = item {
                    aliases.push(alias.value.to_lowercase());
                }
            }
            for twj in &select.from {
                collect_table_with_joins(twj, sources, aliases);
            }
        }
        SetExpr::Query(query) => collect_set_expr(&query.body, sources, aliases),
        SetExpr::SetOperation { left, right, .. } => {
            collect_set_expr(left, sources, aliases);
            collect_set_expr(right, sources, aliases);
        }
        _ => {}
    }
}

fn collect_table_with_joins(twj: &TableWithJoins, sources: &mut Vec<Source>, aliases: &mut Vec<String>) {
    collect_factor(&twj.relation, sources, aliases);
    for join in &twj.joins {
        collect_factor(&join.relation, sources, aliases);
    }
}

fn collect_factor(factor: &TableFactor, sources: &mut Vec<Source>, aliases: &mut Vec<String>) {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let raw = name.to_string();
            sources.push(Source {
                table: Table::from_identifier(&raw),
                name: raw.to_lowercase(),
                alias: alias.as_ref().map(|a| a.name.value.to_lowercase()),
            });
        }
        TableFactor::Derived { subquery, alias, .. } => {
            sources.push(Source {
                table: None,
                name: String::new(),
                alias: alias.as_ref().map(|a| a.name.value.to_lowercase()),
            });
            collect_set_expr(&subquery.body, sources, aliases);
        }
        TableFactor::NestedJoin { table_with_joins, .. } => {
            collect_table_with_joins(table_with_joins, sources, aliases);
        }
        _ => {}
    }
}

/// Lower-cased qualifier → table, for every aliased or bare table source.
pub fn qualifier_map(sources: &[Source]) -> HashMap<String, Table> {
    let mut map = HashMap::new();
    for source in sources {
        if let Some(table) = source.table {
            map.insert(source.qualifier(), table);
            map.insert(table.name().to_string(), table);
        }
    }
    map
}

/// Column names referenced anywhere inside `expr` (qualifiers dropped).
pub fn referenced_columns(expr: &Expr) -> HashSet<String> {
    let mut columns = HashSet::new();
    let _ = visit_expressions(expr, |e| {
        match e {
            Expr::Identifier(ident) => {
                columns.insert(ident.value.to_lowercase());
            }
            Expr::CompoundIdentifier(idents) => {
                if let Some(last) = idents.last() {
                    columns.insert(last.value.to_lowercase());
                }
            }
            _ => {}
        }
        ControlFlow::<()>::Continue(())
    });
    columns
}

/// Whether some division in the statement has one of `numerators` on its left
/// and `denominator` on its right.
pub fn has_ratio(statement: &Statement, numerators: &[&str], denominator: &str) -> bool {
    let found = visit_expressions(statement, |expr| {
        if let Expr::BinaryOp {
            left,
            op: BinaryOperator::Divide,
            right,
        } = expr
        {
            let left_cols = referenced_columns(left);
            let right_cols = referenced_columns(right);
            if numerators.iter().any(|n| left_cols.contains(*n)) && right_cols.contains(denominator) {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    });
    found.is_break()
}

/// Whether the statement contains a subquery expression.
pub fn has_subquery_expr(statement: &Statement) -> bool {
    visit_expressions(statement, |expr| match expr {
        Expr::Subquery(_) | Expr::InSubquery { .. } | Expr::Exists { .. } => ControlFlow::Break(()),
        _ => ControlFlow::Continue(()),
    })
    .is_break()
}

/// Whether any SELECT in the query body has a GROUP BY clause.
pub fn has_group_by(query: &Query) -> bool {
    fn grouped(body: &SetExpr) -> bool {
        match body {
            SetExpr::Select(select) => match &select.group_by {
                GroupByExpr::All => true,
                GroupByExpr::Expressions(exprs) => !exprs.is_empty(),
            },
            SetExpr::Query(query) => grouped(&query.body),
            SetExpr::SetOperation { left, right, .. } => grouped(left) || grouped(right),
            _ => false,
        }
    }
    grouped(&query.body)
}

/// Whether `column` is referenced anywhere, qualified or bare.
pub fn references_column(statement: &Statement, column: &str) -> bool {
    visit_expressions(statement, |expr| match expr {
        Expr::Identifier(ident) if ident.value.eq_ignore_ascii_case(column) => ControlFlow::Break(()),
        Expr::CompoundIdentifier(idents)
            if idents.last().is_some_and(|i| i.value.eq_ignore_ascii_case(column)) =>
        {
            ControlFlow::Break(())
        }
        _ => ControlFlow::Continue(()),
    })
    .is_break()
}
