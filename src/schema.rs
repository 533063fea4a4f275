//! Schema Registry
//!
//! Static description of the three authorized analytics tables, their columns,
//! the join keys between them, and the phrase vocabulary used to map question
//! text onto columns. Built once per process and never mutated.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

pub const SCHEMA_VERSION: &str = "1";

static SCHEMA: OnceLock<SchemaDescriptor> = OnceLock::new();

/// The only tables any statement may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    AdSales,
    TotalSales,
    Eligibility,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::AdSales, Table::TotalSales, Table::Eligibility];

    pub fn name(&self) -> &'static str {
        match self {
            Table::AdSales => "ad_sales",
            Table::TotalSales => "total_sales",
            Table::Eligibility => "eligibility",
        }
    }

    /// Canonical alias used by templates and the rewriter.
    pub fn alias(&self) -> &'static str {
        match self {
            Table::AdSales => "a",
            Table::TotalSales => "t",
            Table::Eligibility => "e",
        }
    }

    /// Resolve a raw identifier (possibly quoted or `main.`-prefixed) to a table.
    pub fn from_identifier(raw: &str) -> Option<Table> {
        let cleaned: String = raw
            .trim()
            .chars()
            .filter(|c| !matches!(c, '"' | '`' | '[' | ']'))
            .collect::<String>()
            .to_lowercase();
        let name = cleaned.strip_prefix("main.").unwrap_or(&cleaned);
        Table::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Date,
    Timestamp,
    Identifier,
    Currency,
    Count,
    Flag,
    Text,
}

impl SemanticType {
    fn sql_type(&self) -> &'static str {
        match self {
            SemanticType::Date => "DATE",
            SemanticType::Timestamp => "TIMESTAMP",
            SemanticType::Identifier => "INTEGER",
            SemanticType::Currency => "REAL",
            SemanticType::Count => "INTEGER",
            SemanticType::Flag | SemanticType::Text => "TEXT",
        }
    }

    /// Columns that can be summed.
    pub fn is_measure(&self) -> bool {
        matches!(self, SemanticType::Currency | SemanticType::Count)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: SemanticType,
    /// Phrases in a question that refer to this column
    pub synonyms: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct TableDef {
    pub table: Table,
    pub description: &'static str,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JoinKey {
    pub left: Table,
    pub right: Table,
    pub columns: &'static [&'static str],
}

#[derive(Debug, Clone, Serialize)]
pub struct SchemaDescriptor {
    pub version: &'static str,
    tables: Vec<TableDef>,
    join_keys: Vec<JoinKey>,
}

impl SchemaDescriptor {
    /// Process-wide registry.
    pub fn global() -> &'static SchemaDescriptor {
        SCHEMA.get_or_init(SchemaDescriptor::builtin)
    }

    fn builtin() -> Self {
        use SemanticType::*;

        let ad_sales = TableDef {
            table: Table::AdSales,
            description: "Product-level advertising metrics per day",
            columns: vec![
                ColumnDef { name: "date", ty: Date, synonyms: &["date", "day"] },
                ColumnDef { name: "item_id", ty: Identifier, synonyms: &["item", "product"] },
                ColumnDef { name: "ad_sales", ty: Currency, synonyms: &["ad sales", "ad revenue", "attributed sales"] },
                ColumnDef { name: "impressions", ty: Count, synonyms: &["impressions", "impression", "views"] },
                ColumnDef { name: "ad_spend", ty: Currency, synonyms: &["ad spend", "spend", "cost", "budget"] },
                ColumnDef { name: "clicks", ty: Count, synonyms: &["clicks", "click"] },
                ColumnDef { name: "units_sold", ty: Count, synonyms: &["units sold", "ad units"] },
            ],
        };
        let total_sales = TableDef {
            table: Table::TotalSales,
            description: "Product-level total sales per day",
            columns: vec![
                ColumnDef { name: "date", ty: Date, synonyms: &["date", "day"] },
                ColumnDef { name: "item_id", ty: Identifier, synonyms: &["item", "product"] },
                ColumnDef { name: "total_sales", ty: Currency, synonyms: &["total sales", "sales", "revenue"] },
                ColumnDef { name: "total_units_ordered", ty: Count, synonyms: &["units ordered", "units", "orders"] },
            ],
        };
        let eligibility = TableDef {
            table: Table::Eligibility,
            description: "Product advertising eligibility snapshots",
            columns: vec![
                ColumnDef { name: "eligibility_datetime_utc", ty: Timestamp, synonyms: &["checked", "timestamp"] },
                ColumnDef { name: "item_id", ty: Identifier, synonyms: &["item", "product"] },
                ColumnDef { name: "eligibility", ty: Flag, synonyms: &["eligible", "eligibility"] },
                ColumnDef { name: "message", ty: Text, synonyms: &["message", "reason"] },
            ],
        };

        Self {
            version: SCHEMA_VERSION,
            tables: vec![ad_sales, total_sales, eligibility],
            join_keys: vec![
                JoinKey { left: Table::TotalSales, right: Table::AdSales, columns: &["item_id", "date"] },
                JoinKey { left: Table::AdSales, right: Table::Eligibility, columns: &["item_id"] },
                JoinKey { left: Table::TotalSales, right: Table::Eligibility, columns: &["item_id"] },
            ],
        }
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn join_keys(&self) -> &[JoinKey] {
        &self.join_keys
    }

    pub fn table(&self, table: Table) -> &TableDef {
        // builtin() lists tables in declaration order of `Table`
        &self.tables[table as usize]
    }

    pub fn allowed_table_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tables.iter().map(|t| t.table.name())
    }

    pub fn is_allowed_table(&self, raw: &str) -> bool {
        Table::from_identifier(raw).is_some()
    }

    /// Tables that declare `column`, in registry order.
    pub fn tables_with_column(&self, column: &str) -> Vec<Table> {
        self.tables
            .iter()
            .filter(|t| t.has_column(column))
            .map(|t| t.table)
            .collect()
    }

    pub fn is_known_column(&self, column: &str) -> bool {
        self.tables.iter().any(|t| t.has_column(column))
    }

    /// Map a phrase from the question to a column name. Longer synonyms win so
    /// that "ad spend" beats "spend" and "units sold" beats "units".
    pub fn column_for_phrase(&self, phrase: &str) -> Option<&'static str> {
        let phrase = phrase.trim().to_lowercase();
        if phrase.is_empty() {
            return None;
        }
        let mut best: Option<(&'static str, usize)> = None;
        for table in &self.tables {
            for column in &table.columns {
                for synonym in column.synonyms {
                    let hit = phrase == *synonym
                        || phrase.ends_with(&format!(" {}", synonym))
                        || phrase.starts_with(&format!("{} ", synonym));
                    if hit && best.map_or(true, |(_, len)| synonym.len() > len) {
                        best = Some((column.name, synonym.len()));
                    }
                }
            }
        }
        best.map(|(name, _)| name)
    }

    /// The table and definition of a measure column, if `name` is one.
    pub fn measure(&self, name: &str) -> Option<(Table, &ColumnDef)> {
        self.tables.iter().find_map(|t| {
            t.column(name)
                .filter(|c| c.ty.is_measure())
                .map(|c| (t.table, c))
        })
    }

    /// Measure columns named in `text`, in order of first mention. A longer
    /// phrase hides the shorter ones inside it ("ad sales" is not "sales").
    pub fn measures_mentioned(&self, text: &str) -> Vec<&'static str> {
        let padded = format!(" {} ", text.to_lowercase());
        let mut hits: Vec<(usize, usize, &'static str)> = Vec::new();
        for table in &self.tables {
            for column in table.columns.iter().filter(|c| c.ty.is_measure()) {
                for synonym in column.synonyms {
                    let needle = format!(" {} ", synonym);
                    let mut from = 0;
                    while let Some(pos) = padded[from..].find(&needle) {
                        let start = from + pos;
                        hits.push((start, start + needle.len(), column.name));
                        from = start + 1;
                    }
                }
            }
        }
        hits.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

        let mut covered_until = 0;
        let mut found = Vec::new();
        for (start, end, name) in hits {
            // hits share their padding spaces, so a neighbour starts at end - 1
            if start + 1 < covered_until {
                continue;
            }
            covered_until = end;
            if !found.contains(&name) {
                found.push(name);
            }
        }
        found
    }

    /// Schema listing embedded in generation prompts.
    pub fn render_for_prompt(&self) -> String {
        let mut out = String::new();
        for table in &self.tables {
            let columns: Vec<String> = table
                .columns
                .iter()
                .map(|c| format!("{} {}", c.name, c.ty.sql_type()))
                .collect();
            out.push_str(&format!(
                "- {} ({}): {}\n",
                table.table.name(),
                table.description,
                columns.join(", ")
            ));
        }
        out.push_str("Join keys:\n");
        for key in &self.join_keys {
            let on: Vec<String> = key
                .columns
                .iter()
                .map(|c| format!("{}.{} = {}.{}", key.left, c, key.right, c))
                .collect();
            out.push_str(&format!("- {}\n", on.join(" AND ")));
        }
        out
    }
}
