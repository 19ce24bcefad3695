//! Schema descriptor: the live catalog as (table, column, type) triples.
//!
//! The descriptor is recomputed on every request and never cached. Two
//! renderings are produced from it: a flat line-per-column text that is sent
//! to the query generators, and a grouped tree for display.

use serde::{Deserialize, Serialize};

/// Catalog query for all user-table columns in the default visible schema.
///
/// Ordering by table then ordinal position keeps the formatted output
/// reproducible. Identifier domains are cast to `text` so they decode as
/// plain strings.
pub const SCHEMA_QUERY: &str = "
SELECT
    table_name::text,
    column_name::text,
    data_type::text
FROM
    information_schema.columns
WHERE
    table_schema = 'public'
ORDER BY
    table_name, ordinal_position;
";

/// One column of one table, as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
}

impl SchemaColumn {
    pub fn new(
        table_name: impl Into<String>,
        column_name: impl Into<String>,
        data_type: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            column_name: column_name.into(),
            data_type: data_type.into(),
        }
    }

    /// The prompt line for this column.
    pub fn to_prompt_line(&self) -> String {
        format!(
            "Table: {}, Column: {}, Type: {}",
            self.table_name, self.column_name, self.data_type
        )
    }
}

/// A table and its columns, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableColumns<'a> {
    pub name: &'a str,
    pub columns: Vec<&'a SchemaColumn>,
}

/// Ordered sequence of catalog columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDescriptor {
    columns: Vec<SchemaColumn>,
}

impl SchemaDescriptor {
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn table_count(&self) -> usize {
        self.tables().len()
    }

    /// Group columns by table, keeping first-seen table order and catalog
    /// column order within each table.
    pub fn tables(&self) -> Vec<TableColumns<'_>> {
        let mut tables: Vec<TableColumns<'_>> = Vec::new();
        for col in &self.columns {
            match tables.iter_mut().find(|t| t.name == col.table_name) {
                Some(table) => table.columns.push(col),
                None => tables.push(TableColumns {
                    name: &col.table_name,
                    columns: vec![col],
                }),
            }
        }
        tables
    }

    /// Distinct table names in catalog order.
    pub fn table_names(&self) -> Vec<&str> {
        self.tables().into_iter().map(|t| t.name).collect()
    }

    /// Columns of a single table, in ordinal order.
    pub fn columns_of(&self, table: &str) -> Vec<&SchemaColumn> {
        self.columns
            .iter()
            .filter(|c| c.table_name == table)
            .collect()
    }

    /// One `Table: t, Column: c, Type: ty` line per column.
    ///
    /// This is the schema text handed to the query generators.
    pub fn to_prompt_text(&self) -> String {
        self.columns
            .iter()
            .map(SchemaColumn::to_prompt_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Grouped display form: a `TABLE:` header per table followed by one
    /// indented line per column.
    pub fn to_tree(&self) -> String {
        let mut lines = Vec::with_capacity(self.columns.len() * 2);
        for table in self.tables() {
            lines.push(String::new());
            lines.push(format!("📊 TABLE: {}", table.name.to_uppercase()));
            for col in table.columns {
                lines.push(format!("  ├─ {} ({})", col.column_name, col.data_type));
            }
        }
        lines.join("\n")
    }
}

impl From<Vec<SchemaColumn>> for SchemaDescriptor {
    fn from(columns: Vec<SchemaColumn>) -> Self {
        Self::new(columns)
    }
}

impl FromIterator<SchemaColumn> for SchemaDescriptor {
    fn from_iter<I: IntoIterator<Item = SchemaColumn>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// The schema table together with its prompt text.
///
/// Both halves are built from the same rows, so they always agree line for
/// line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaInfo {
    pub descriptor: SchemaDescriptor,
    pub text: String,
}

impl From<SchemaDescriptor> for SchemaInfo {
    fn from(descriptor: SchemaDescriptor) -> Self {
        let text = descriptor.to_prompt_text();
        Self { descriptor, text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shop() -> SchemaDescriptor {
        SchemaDescriptor::from(vec![
            SchemaColumn::new("customers", "id", "integer"),
            SchemaColumn::new("customers", "name", "text"),
            SchemaColumn::new("orders", "id", "integer"),
            SchemaColumn::new("orders", "customer_id", "integer"),
            SchemaColumn::new("orders", "total_revenue", "numeric"),
        ])
    }

    #[test]
    fn test_tree_has_one_header_per_table_and_one_line_per_column() {
        let tree = shop().to_tree();
        let headers = tree.lines().filter(|l| l.starts_with("📊 TABLE: ")).count();
        let columns = tree.lines().filter(|l| l.starts_with("  ├─ ")).count();
        assert_eq!(headers, 2);
        assert_eq!(columns, 5);
    }

    #[test]
    fn test_tree_keeps_columns_under_their_table() {
        let tree = shop().to_tree();
        assert_eq!(
            tree,
            "\n📊 TABLE: CUSTOMERS\n  ├─ id (integer)\n  ├─ name (text)\n\n📊 TABLE: ORDERS\n  ├─ id (integer)\n  ├─ customer_id (integer)\n  ├─ total_revenue (numeric)"
        );
    }

    #[test]
    fn test_tables_preserve_catalog_order() {
        let schema = SchemaDescriptor::from(vec![
            SchemaColumn::new("zeta", "a", "int"),
            SchemaColumn::new("alpha", "b", "int"),
            SchemaColumn::new("zeta", "c", "int"),
        ]);
        let tables = schema.tables();
        assert_eq!(schema.table_names(), vec!["zeta", "alpha"]);
        let zeta: Vec<&str> = tables[0].columns.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(zeta, vec!["a", "c"]);
    }

    #[test]
    fn test_prompt_text_matches_rows_one_to_one() {
        let schema = shop();
        let info = SchemaInfo::from(schema.clone());
        let lines: Vec<&str> = info.text.lines().collect();
        assert_eq!(lines.len(), schema.column_count());
        for (line, col) in lines.iter().zip(schema.columns()) {
            assert_eq!(*line, col.to_prompt_line());
        }
        assert_eq!(lines[4], "Table: orders, Column: total_revenue, Type: numeric");
    }

    #[test]
    fn test_counts_and_lookup() {
        let schema = shop();
        assert_eq!(schema.table_count(), 2);
        assert_eq!(schema.column_count(), 5);
        let orders: Vec<&str> = schema
            .columns_of("orders")
            .iter()
            .map(|c| c.column_name.as_str())
            .collect();
        assert_eq!(orders, vec!["id", "customer_id", "total_revenue"]);
        assert!(schema.columns_of("missing").is_empty());
    }

    #[test]
    fn test_empty_schema() {
        let info = SchemaInfo::from(SchemaDescriptor::default());
        assert!(info.descriptor.is_empty());
        assert_eq!(info.text, "");
        assert_eq!(info.descriptor.to_tree(), "");
        assert_eq!(info.descriptor.table_count(), 0);
    }

    #[test]
    fn test_schema_query_is_ordered_and_scoped() {
        assert!(SCHEMA_QUERY.contains("table_schema = 'public'"));
        assert!(SCHEMA_QUERY.contains("ORDER BY\n    table_name, ordinal_position"));
    }
}
