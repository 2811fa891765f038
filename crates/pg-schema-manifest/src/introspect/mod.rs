//! Catalog introspection: walk a live catalog into a [`Manifest`].
//!
//! Schemas, tables, views and functions are sorted by name; columns keep
//! the catalog's ordinal order. The walk is strictly sequential and
//! assumes the catalog does not change while it runs.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::IntrospectionConfig;
use crate::core::catalog::{live_schema_names, sorted_names, CatalogSource, ColumnRow, IndexRow};
use crate::core::manifest::{Column, Function, Index, Manifest, Schema, Table, View};
use crate::error::Result;

/// Builds manifests from a catalog.
pub struct Introspector<'a, C: CatalogSource + ?Sized> {
    catalog: &'a C,
    scope: IntrospectionConfig,
}

impl<'a, C: CatalogSource + ?Sized> Introspector<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            scope: IntrospectionConfig::default(),
        }
    }

    /// Restrict the walk to the configured schemas.
    pub fn with_scope(mut self, scope: IntrospectionConfig) -> Self {
        self.scope = scope;
        self
    }

    /// Walk the whole catalog.
    pub async fn run(&self) -> Result<Manifest> {
        let database = self.catalog.database_info().await?;
        info!(
            "Introspecting database '{}' as '{}' ({})",
            database.name, database.user, database.version
        );

        let mut manifest = Manifest::new(database);
        for schema_name in live_schema_names(self.catalog, &self.scope).await? {
            let schema = self.introspect_schema(&schema_name).await?;
            info!(
                "Schema '{}': {} tables, {} views, {} functions",
                schema.name,
                schema.tables.len(),
                schema.views.len(),
                schema.functions.len()
            );
            manifest.schemas.push(schema);
        }

        Ok(manifest)
    }

    async fn introspect_schema(&self, name: &str) -> Result<Schema> {
        let mut schema = Schema::new(name);

        for table in sorted_names(self.catalog.table_names(name).await?) {
            schema.tables.push(self.introspect_table(name, &table).await?);
        }
        for view in sorted_names(self.catalog.view_names(name).await?) {
            schema.views.push(self.introspect_view(name, &view).await?);
        }
        for function in sorted_names(self.catalog.function_names(name).await?) {
            if let Some(f) = self.introspect_function(name, &function).await? {
                schema.functions.push(f);
            }
        }

        Ok(schema)
    }

    async fn introspect_table(&self, schema: &str, name: &str) -> Result<Table> {
        let columns = ordered_columns(self.catalog.columns(schema, name).await?);
        let primary_key = self.catalog.primary_key(schema, name).await?;
        let indexes = group_index_rows(self.catalog.index_rows(schema, name).await?);
        let foreign_keys = self
            .catalog
            .foreign_keys(schema, name)
            .await?
            .into_iter()
            .map(Into::into)
            .collect::<Vec<_>>();

        debug!(
            "Table {}.{}: {} columns, pk {:?}, {} indexes, {} foreign keys",
            schema,
            name,
            columns.len(),
            primary_key,
            indexes.len(),
            foreign_keys.len()
        );

        Ok(Table {
            name: name.to_string(),
            columns,
            primary_key,
            indexes,
            foreign_keys,
        })
    }

    async fn introspect_view(&self, schema: &str, name: &str) -> Result<View> {
        let columns = ordered_columns(self.catalog.columns(schema, name).await?);
        let definition = self.catalog.view_definition(schema, name).await?;
        if definition.is_none() {
            debug!("View {}.{}: definition not exposed by catalog", schema, name);
        }
        Ok(View {
            name: name.to_string(),
            columns,
            definition,
        })
    }

    /// Only the first overload of a function name is captured.
    async fn introspect_function(&self, schema: &str, name: &str) -> Result<Option<Function>> {
        let Some(detail) = self.catalog.function_detail(schema, name).await? else {
            debug!("Function {}.{} vanished during introspection", schema, name);
            return Ok(None);
        };

        let mut params = self
            .catalog
            .function_parameters(schema, &detail.specific_name)
            .await?;
        params.sort_by_key(|p| p.ordinal_position);

        Ok(Some(Function {
            name: name.to_string(),
            return_type: detail.return_type,
            parameters: params.into_iter().map(Into::into).collect(),
            definition: detail.definition,
        }))
    }
}

/// Convert column rows to manifest columns in ordinal order.
fn ordered_columns(mut rows: Vec<ColumnRow>) -> Vec<Column> {
    rows.sort_by_key(|r| r.ordinal_position);
    rows.into_iter().map(Into::into).collect()
}

/// Group flat (index, column) rows into one [`Index`] per index name.
///
/// Groups appear in the order their name was first seen, and columns keep
/// the order their rows arrived in.
pub fn group_index_rows(rows: Vec<IndexRow>) -> Vec<Index> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut indexes: Vec<Index> = Vec::new();

    for row in rows {
        match positions.get(&row.index_name) {
            Some(&pos) => indexes[pos].columns.push(row.column_name),
            None => {
                positions.insert(row.index_name.clone(), indexes.len());
                indexes.push(Index {
                    name: row.index_name,
                    columns: vec![row.column_name],
                    unique: row.is_unique,
                });
            }
        }
    }

    indexes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::fixtures::shop_manifest;
    use crate::core::manifest::{ColumnRef, ForeignKey, Parameter};
    use crate::core::memory::InMemoryCatalog;

    fn index_row(index: &str, column: &str, unique: bool) -> IndexRow {
        IndexRow {
            index_name: index.to_string(),
            column_name: column.to_string(),
            is_unique: unique,
        }
    }

    #[test]
    fn test_group_index_rows_preserves_order() {
        let rows = vec![
            index_row("orders_pkey", "order_id", true),
            index_row("orders_customer_created_idx", "customer_id", false),
            index_row("orders_customer_created_idx", "created_at", false),
            index_row("orders_status_idx", "status", false),
        ];
        let indexes = group_index_rows(rows);
        assert_eq!(indexes.len(), 3);
        assert_eq!(indexes[0].name, "orders_pkey");
        assert!(indexes[0].unique);
        assert_eq!(indexes[1].name, "orders_customer_created_idx");
        assert_eq!(indexes[1].columns, ["customer_id", "created_at"]);
        assert_eq!(indexes[2].columns, ["status"]);
    }

    #[test]
    fn test_group_index_rows_interleaved() {
        let rows = vec![
            index_row("b_idx", "x", false),
            index_row("a_idx", "y", true),
            index_row("b_idx", "z", false),
        ];
        let indexes = group_index_rows(rows);
        assert_eq!(indexes[0].name, "b_idx");
        assert_eq!(indexes[0].columns, ["x", "z"]);
        assert_eq!(indexes[1].name, "a_idx");
    }

    #[test]
    fn test_group_index_rows_empty() {
        assert!(group_index_rows(Vec::new()).is_empty());
    }

    fn catalog_manifest() -> Manifest {
        let mut manifest = shop_manifest();
        let mut sales = Schema::new("sales");
        let mut leads = crate::core::manifest::fixtures::orders_table();
        leads.name = "leads".to_string();
        leads.foreign_keys.push(ForeignKey {
            name: "leads_order_fk".to_string(),
            column: "order_id".to_string(),
            references: ColumnRef {
                schema: "shop".to_string(),
                table: "orders".to_string(),
                column: "order_id".to_string(),
            },
        });
        leads.indexes.push(Index {
            name: "leads_created_idx".to_string(),
            columns: vec!["created_at".to_string(), "total".to_string()],
            unique: false,
        });
        let mut accounts = crate::core::manifest::fixtures::orders_table();
        accounts.name = "accounts".to_string();
        // Deliberately unsorted to check the introspector sorts.
        sales.tables = vec![leads, accounts];
        sales.views.push(View {
            name: "hot_leads".to_string(),
            columns: vec![crate::core::manifest::fixtures::column(
                "order_id", "integer", "int4", true,
            )],
            definition: None,
        });
        sales.functions.push(Function {
            name: "score_lead".to_string(),
            return_type: "integer".to_string(),
            parameters: vec![
                Parameter {
                    name: "lead_id".to_string(),
                    data_type: "integer".to_string(),
                    mode: "IN".to_string(),
                },
                Parameter {
                    name: "score".to_string(),
                    data_type: "integer".to_string(),
                    mode: "OUT".to_string(),
                },
            ],
            definition: Some("BEGIN score := 1; END".to_string()),
        });
        manifest.schemas.insert(0, sales);
        manifest
    }

    #[tokio::test]
    async fn test_introspection_sorts_and_filters() {
        let catalog = InMemoryCatalog::new(catalog_manifest())
            .with_schema_names(["pg_catalog", "information_schema", "pg_temp_1"]);
        let manifest = Introspector::new(&catalog).run().await.unwrap();

        let names: Vec<_> = manifest.schemas.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["sales", "shop"]);

        let sales = manifest.schema("sales").unwrap();
        let tables: Vec<_> = sales.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(tables, ["accounts", "leads"]);

        let leads = sales.table("leads").unwrap();
        assert_eq!(leads.indexes[0].columns, ["created_at", "total"]);
        assert_eq!(leads.foreign_keys[0].references.table, "orders");
        assert_eq!(leads.primary_key, ["order_id"]);

        let function = &sales.functions[0];
        assert_eq!(function.parameters.len(), 2);
        assert_eq!(function.parameters[1].mode, "OUT");
        assert!(sales.views[0].definition.is_none());
    }

    #[tokio::test]
    async fn test_introspection_respects_scope() {
        let catalog = InMemoryCatalog::new(catalog_manifest());
        let scope = IntrospectionConfig {
            include_schemas: vec!["shop".to_string()],
        };
        let manifest = Introspector::new(&catalog)
            .with_scope(scope)
            .run()
            .await
            .unwrap();
        assert_eq!(manifest.schemas.len(), 1);
        assert_eq!(manifest.schemas[0].name, "shop");
    }

    #[tokio::test]
    async fn test_introspection_is_idempotent_apart_from_timestamp() {
        let catalog = InMemoryCatalog::new(catalog_manifest());
        let first = Introspector::new(&catalog).run().await.unwrap();
        let mut second = Introspector::new(&catalog).run().await.unwrap();
        second.generated = first.generated;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_reintrospecting_a_manifest_reproduces_it() {
        let original = shop_manifest();
        let catalog = InMemoryCatalog::new(original.clone());
        let mut manifest = Introspector::new(&catalog).run().await.unwrap();
        manifest.generated = original.generated;
        assert_eq!(manifest, original);
    }
}
