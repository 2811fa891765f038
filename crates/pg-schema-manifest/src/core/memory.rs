//! A catalog backed by a manifest snapshot.
//!
//! Answers catalog queries from an in-memory [`Manifest`], which lets the
//! drift detector compare two manifests offline and lets tests exercise the
//! introspector and detector without a database.

use async_trait::async_trait;

use super::catalog::{
    CatalogSource, ColumnRow, ForeignKeyRow, FunctionRow, IndexRow, ParameterRow,
};
use super::manifest::{Column, DatabaseInfo, Function, Manifest, Schema, Table};
use crate::error::Result;

/// Catalog that serves a fixed manifest.
#[derive(Debug, Clone)]
pub struct InMemoryCatalog {
    manifest: Manifest,
    extra_schemas: Vec<String>,
}

impl InMemoryCatalog {
    pub fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            extra_schemas: Vec::new(),
        }
    }

    /// Add schema names that the catalog reports without any content, such
    /// as system schemas a real server always exposes.
    pub fn with_schema_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_schemas.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    fn schema(&self, name: &str) -> Option<&Schema> {
        self.manifest.schema(name)
    }

    fn table(&self, schema: &str, table: &str) -> Option<&Table> {
        self.schema(schema).and_then(|s| s.table(table))
    }

    fn function(&self, schema: &str, name: &str) -> Option<&Function> {
        self.schema(schema)
            .and_then(|s| s.functions.iter().find(|f| f.name == name))
    }
}

fn column_rows(columns: &[Column]) -> Vec<ColumnRow> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, col)| ColumnRow {
            name: col.name.clone(),
            data_type: col.data_type.clone(),
            udt_name: col.udt_name.clone(),
            is_nullable: col.nullable,
            default: col.default.clone(),
            max_length: col.max_length,
            precision: col.precision,
            scale: col.scale,
            ordinal_position: idx as i32 + 1,
        })
        .collect()
}

/// Specific names are synthesized as `{schema}.{function}` since a
/// manifest keeps a single overload per name.
fn specific_name(schema: &str, function: &str) -> String {
    format!("{}.{}", schema, function)
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn database_info(&self) -> Result<DatabaseInfo> {
        Ok(self.manifest.database.clone())
    }

    async fn schema_names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .manifest
            .schemas
            .iter()
            .map(|s| s.name.clone())
            .collect();
        names.extend(self.extra_schemas.iter().cloned());
        Ok(names)
    }

    async fn table_names(&self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .schema(schema)
            .map(|s| s.tables.iter().map(|t| t.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn view_names(&self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .schema(schema)
            .map(|s| s.views.iter().map(|v| v.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn function_names(&self, schema: &str) -> Result<Vec<String>> {
        Ok(self
            .schema(schema)
            .map(|s| s.functions.iter().map(|f| f.name.clone()).collect())
            .unwrap_or_default())
    }

    async fn columns(&self, schema: &str, relation: &str) -> Result<Vec<ColumnRow>> {
        let Some(s) = self.schema(schema) else {
            return Ok(Vec::new());
        };
        if let Some(table) = s.table(relation) {
            return Ok(column_rows(&table.columns));
        }
        Ok(s.view(relation)
            .map(|v| column_rows(&v.columns))
            .unwrap_or_default())
    }

    async fn primary_key(&self, schema: &str, table: &str) -> Result<Vec<String>> {
        Ok(self
            .table(schema, table)
            .map(|t| t.primary_key.clone())
            .unwrap_or_default())
    }

    async fn index_rows(&self, schema: &str, table: &str) -> Result<Vec<IndexRow>> {
        Ok(self
            .table(schema, table)
            .map(|t| {
                t.indexes
                    .iter()
                    .flat_map(|idx| {
                        idx.columns.iter().map(move |col| IndexRow {
                            index_name: idx.name.clone(),
                            column_name: col.clone(),
                            is_unique: idx.unique,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn foreign_keys(&self, schema: &str, table: &str) -> Result<Vec<ForeignKeyRow>> {
        Ok(self
            .table(schema, table)
            .map(|t| {
                t.foreign_keys
                    .iter()
                    .map(|fk| ForeignKeyRow {
                        constraint_name: fk.name.clone(),
                        column_name: fk.column.clone(),
                        ref_schema: fk.references.schema.clone(),
                        ref_table: fk.references.table.clone(),
                        ref_column: fk.references.column.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn view_definition(&self, schema: &str, view: &str) -> Result<Option<String>> {
        Ok(self
            .schema(schema)
            .and_then(|s| s.view(view))
            .and_then(|v| v.definition.clone()))
    }

    async fn function_detail(&self, schema: &str, function: &str) -> Result<Option<FunctionRow>> {
        Ok(self.function(schema, function).map(|f| FunctionRow {
            specific_name: specific_name(schema, &f.name),
            return_type: f.return_type.clone(),
            definition: f.definition.clone(),
        }))
    }

    async fn function_parameters(
        &self,
        schema: &str,
        specific: &str,
    ) -> Result<Vec<ParameterRow>> {
        let Some(s) = self.schema(schema) else {
            return Ok(Vec::new());
        };
        Ok(s.functions
            .iter()
            .find(|f| specific_name(schema, &f.name) == specific)
            .map(|f| {
                f.parameters
                    .iter()
                    .enumerate()
                    .map(|(idx, p)| ParameterRow {
                        name: p.name.clone(),
                        data_type: p.data_type.clone(),
                        mode: p.mode.clone(),
                        ordinal_position: idx as i32 + 1,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn close(&self) {}
}
