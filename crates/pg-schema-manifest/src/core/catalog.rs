//! The catalog interface consumed by the introspector and drift detector.
//!
//! Every query result shape has a typed row record here. Drivers decode
//! their raw rows into these records at the query boundary, so nothing
//! downstream reads loosely-shaped rows by column name.

use async_trait::async_trait;

use super::manifest::{Column, ColumnRef, DatabaseInfo, ForeignKey, Parameter};
use crate::config::IntrospectionConfig;
use crate::error::Result;

/// Schemas that are never introspected, whatever the configuration says.
const SYSTEM_SCHEMAS: &[&str] = &["pg_catalog", "information_schema", "pg_toast"];

/// Prefixes of per-session temporary schemas.
const TEMP_SCHEMA_PREFIXES: &[&str] = &["pg_temp_", "pg_toast_temp_"];

/// Check whether a schema is a system or temporary schema.
pub fn is_system_schema(name: &str) -> bool {
    SYSTEM_SCHEMAS.contains(&name)
        || TEMP_SCHEMA_PREFIXES
            .iter()
            .any(|prefix| name.starts_with(prefix))
}

/// One column of a table or view, as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub name: String,
    pub data_type: String,
    pub udt_name: String,
    pub is_nullable: bool,
    pub default: Option<String>,
    pub max_length: Option<i32>,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
    /// 1-based ordinal position.
    pub ordinal_position: i32,
}

impl From<ColumnRow> for Column {
    fn from(row: ColumnRow) -> Self {
        Column {
            name: row.name,
            data_type: row.data_type,
            udt_name: row.udt_name,
            nullable: row.is_nullable,
            default: row.default,
            max_length: row.max_length,
            precision: row.precision,
            scale: row.scale,
        }
    }
}

/// One (index, column) pair. Multi-column indexes yield several rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRow {
    pub index_name: String,
    pub column_name: String,
    pub is_unique: bool,
}

/// A single-column foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRow {
    pub constraint_name: String,
    pub column_name: String,
    pub ref_schema: String,
    pub ref_table: String,
    pub ref_column: String,
}

impl From<ForeignKeyRow> for ForeignKey {
    fn from(row: ForeignKeyRow) -> Self {
        ForeignKey {
            name: row.constraint_name,
            column: row.column_name,
            references: ColumnRef {
                schema: row.ref_schema,
                table: row.ref_table,
                column: row.ref_column,
            },
        }
    }
}

/// The first routine matching a function name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRow {
    /// Catalog-unique routine identifier, used to fetch parameters.
    pub specific_name: String,
    pub return_type: String,
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRow {
    pub name: String,
    pub data_type: String,
    pub mode: String,
    pub ordinal_position: i32,
}

impl From<ParameterRow> for Parameter {
    fn from(row: ParameterRow) -> Self {
        Parameter {
            name: row.name,
            data_type: row.data_type,
            mode: row.mode,
        }
    }
}

/// Read-only access to a relational catalog.
///
/// Name listings need not be sorted or filtered; callers apply ordering
/// and the system-schema filter themselves.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Server version, database name and connected user.
    async fn database_info(&self) -> Result<DatabaseInfo>;

    /// All schema names visible to the connection.
    async fn schema_names(&self) -> Result<Vec<String>>;

    /// Base tables in a schema (views excluded).
    async fn table_names(&self, schema: &str) -> Result<Vec<String>>;

    async fn view_names(&self, schema: &str) -> Result<Vec<String>>;

    /// User-defined function names. Overloads appear once.
    async fn function_names(&self, schema: &str) -> Result<Vec<String>>;

    /// Columns of a table or view, in ordinal order.
    async fn columns(&self, schema: &str, relation: &str) -> Result<Vec<ColumnRow>>;

    /// Primary key column names in key order; empty when there is none.
    async fn primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>>;

    /// Flat index rows, grouped by index name and in key order within an index.
    async fn index_rows(&self, schema: &str, table: &str) -> Result<Vec<IndexRow>>;

    /// Single-column foreign keys.
    async fn foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRow>>;

    /// Defining query of a view, if exposed.
    async fn view_definition(&self, schema: &str, view: &str) -> Result<Option<String>>;

    /// First routine with the given name. Other overloads are ignored.
    async fn function_detail(&self, schema: &str, function: &str) -> Result<Option<FunctionRow>>;

    /// Parameters of a routine, in ordinal order.
    async fn function_parameters(
        &self,
        schema: &str,
        specific_name: &str,
    ) -> Result<Vec<ParameterRow>>;

    /// Release the underlying connection.
    async fn close(&self);
}

/// Live schema names with system schemas and out-of-scope schemas removed,
/// sorted alphabetically.
pub async fn live_schema_names<C: CatalogSource + ?Sized>(
    catalog: &C,
    scope: &IntrospectionConfig,
) -> Result<Vec<String>> {
    let mut names: Vec<String> = catalog
        .schema_names()
        .await?
        .into_iter()
        .filter(|name| !is_system_schema(name) && scope.includes(name))
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

/// Sort a name listing and drop duplicates.
pub(crate) fn sorted_names(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_system_schema() {
        assert!(is_system_schema("pg_catalog"));
        assert!(is_system_schema("information_schema"));
        assert!(is_system_schema("pg_toast"));
        assert!(is_system_schema("pg_temp_3"));
        assert!(is_system_schema("pg_toast_temp_3"));

        assert!(!is_system_schema("public"));
        assert!(!is_system_schema("pg_partman"));
        assert!(!is_system_schema("shop"));
    }

    #[test]
    fn test_column_row_into_column() {
        let row = ColumnRow {
            name: "email".to_string(),
            data_type: "character varying".to_string(),
            udt_name: "varchar".to_string(),
            is_nullable: false,
            default: None,
            max_length: Some(255),
            precision: None,
            scale: None,
            ordinal_position: 2,
        };
        let col: Column = row.into();
        assert_eq!(col.name, "email");
        assert_eq!(col.data_type, "character varying");
        assert!(!col.nullable);
        assert_eq!(col.max_length, Some(255));
    }

    #[test]
    fn test_sorted_names() {
        let names = sorted_names(vec!["b".into(), "a".into(), "b".into()]);
        assert_eq!(names, ["a", "b"]);
    }
}
