//! Drift detection between a manifest and a live catalog.
//!
//! Schemas missing from the live side are not compared further. Tables are
//! compared down to columns; views and functions by name only. Column
//! types are compared as raw strings, so `varchar` and `character varying`
//! count as a mismatch.

pub mod report;
pub mod types;

pub use report::render_markdown;
pub use types::{
    DriftReport, DriftSummary, NameDrift, SchemaDrift, TableColumnDrift, TableDrift, TypeMismatch,
};

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::config::IntrospectionConfig;
use crate::core::catalog::{live_schema_names, sorted_names, CatalogSource};
use crate::core::manifest::{Column, Manifest, Schema, Table};
use crate::error::Result;

/// Compares manifests against a catalog.
pub struct DriftDetector<'a, C: CatalogSource + ?Sized> {
    catalog: &'a C,
    scope: IntrospectionConfig,
}

impl<'a, C: CatalogSource + ?Sized> DriftDetector<'a, C> {
    pub fn new(catalog: &'a C) -> Self {
        Self {
            catalog,
            scope: IntrospectionConfig::default(),
        }
    }

    /// Restrict both sides to the configured schemas.
    pub fn with_scope(mut self, scope: IntrospectionConfig) -> Self {
        self.scope = scope;
        self
    }

    pub async fn detect(&self, manifest: &Manifest) -> Result<DriftReport> {
        let database = self.catalog.database_info().await?;
        let live = live_schema_names(self.catalog, &self.scope).await?;
        let live_set: HashSet<&str> = live.iter().map(String::as_str).collect();

        info!(
            "Comparing manifest from {} against '{}' ({} live schemas)",
            manifest.generated,
            database.name,
            live.len()
        );

        let mut report = DriftReport::new(database.name, manifest.generated);
        let mut expected: HashSet<&str> = HashSet::new();

        for schema in manifest
            .schemas
            .iter()
            .filter(|s| self.scope.includes(&s.name))
        {
            expected.insert(schema.name.as_str());
            if !live_set.contains(schema.name.as_str()) {
                warn!("Schema '{}' is missing from the database", schema.name);
                report.add_missing_schema(&schema.name);
                continue;
            }
            let drift = self.compare_schema(schema).await?;
            debug!("Schema '{}': {} drifts", schema.name, drift.drift_count);
            report.add_schema(drift);
        }

        for name in live.iter().filter(|n| !expected.contains(n.as_str())) {
            warn!("Schema '{}' is not in the manifest", name);
            report.add_extra_schema(name);
        }

        if report.is_drift_free() {
            info!("No drift detected");
        } else {
            warn!(
                "Detected {} drifts across {} schemas",
                report.summary.total_drifts, report.summary.schemas_with_drift
            );
        }
        Ok(report)
    }

    async fn compare_schema(&self, schema: &Schema) -> Result<SchemaDrift> {
        let name = schema.name.as_str();
        let mut drift = SchemaDrift::new(name);

        let live_tables = sorted_names(self.catalog.table_names(name).await?);
        let tables = name_drift(schema.tables.iter().map(|t| t.name.as_str()), &live_tables);
        for table in &schema.tables {
            if tables.missing.contains(&table.name) {
                continue;
            }
            let columns = self.compare_columns(name, table).await?;
            if columns.has_drift() {
                drift.tables.columns.push(columns);
            }
        }
        drift.tables.missing = tables.missing;
        drift.tables.extra = tables.extra;

        let live_views = sorted_names(self.catalog.view_names(name).await?);
        drift.views = name_drift(schema.views.iter().map(|v| v.name.as_str()), &live_views);

        let live_functions = sorted_names(self.catalog.function_names(name).await?);
        drift.functions = name_drift(
            schema.functions.iter().map(|f| f.name.as_str()),
            &live_functions,
        );

        Ok(drift)
    }

    async fn compare_columns(&self, schema: &str, table: &Table) -> Result<TableColumnDrift> {
        let mut rows = self.catalog.columns(schema, &table.name).await?;
        rows.sort_by_key(|r| r.ordinal_position);
        let live: Vec<Column> = rows.into_iter().map(Into::into).collect();
        Ok(column_drift(table, &live))
    }
}

/// Missing names in manifest order, extra names in live order.
fn name_drift<'n>(manifest: impl Iterator<Item = &'n str>, live: &[String]) -> NameDrift {
    let manifest: Vec<&str> = manifest.collect();
    let manifest_set: HashSet<&str> = manifest.iter().copied().collect();
    let live_set: HashSet<&str> = live.iter().map(String::as_str).collect();

    NameDrift {
        missing: manifest
            .iter()
            .filter(|n| !live_set.contains(*n))
            .map(|n| n.to_string())
            .collect(),
        extra: live
            .iter()
            .filter(|n| !manifest_set.contains(n.as_str()))
            .cloned()
            .collect(),
    }
}

/// Compare a manifest table with the live columns of the same table.
pub fn column_drift(table: &Table, live: &[Column]) -> TableColumnDrift {
    let mut drift = TableColumnDrift::new(&table.name);

    for col in &table.columns {
        match live.iter().find(|l| l.name == col.name) {
            None => drift.missing.push(col.name.clone()),
            Some(l) if l.data_type != col.data_type => drift.type_mismatches.push(TypeMismatch {
                column: col.name.clone(),
                manifest_type: col.data_type.clone(),
                live_type: l.data_type.clone(),
            }),
            Some(_) => {}
        }
    }
    for l in live {
        if !table.columns.iter().any(|c| c.name == l.name) {
            drift.extra.push(l.name.clone());
        }
    }

    drift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::fixtures::{column, orders_table, shop_manifest};
    use crate::core::manifest::{Function, View};
    use crate::core::memory::InMemoryCatalog;
    use crate::introspect::Introspector;

    async fn detect(manifest: &Manifest, live: Manifest) -> DriftReport {
        let catalog = InMemoryCatalog::new(live);
        DriftDetector::new(&catalog).detect(manifest).await.unwrap()
    }

    #[tokio::test]
    async fn test_introspected_manifest_has_no_drift() {
        let mut live = shop_manifest();
        live.schemas[0].views.push(View {
            name: "open_orders".to_string(),
            columns: vec![column("order_id", "integer", "int4", true)],
            definition: None,
        });
        let catalog = InMemoryCatalog::new(live);
        let manifest = Introspector::new(&catalog).run().await.unwrap();
        let report = DriftDetector::new(&catalog).detect(&manifest).await.unwrap();

        assert!(report.is_drift_free());
        assert_eq!(report.summary, DriftSummary::default());
        assert_eq!(report.schemas.len(), 1);
        assert_eq!(report.database, "outreach");
    }

    #[tokio::test]
    async fn test_missing_table() {
        let manifest = shop_manifest();
        let mut live = shop_manifest();
        live.schemas[0].tables.clear();

        let report = detect(&manifest, live).await;
        let shop = report.schema("shop").unwrap();
        assert_eq!(shop.tables.missing, ["orders"]);
        assert!(shop.tables.extra.is_empty());
        assert!(shop.tables.columns.is_empty());
        assert_eq!(report.summary.total_drifts, 1);
    }

    #[tokio::test]
    async fn test_extra_column() {
        let manifest = shop_manifest();
        let mut live = shop_manifest();
        live.schemas[0].tables[0]
            .columns
            .push(column("coupon_code", "text", "text", true));

        let report = detect(&manifest, live).await;
        let columns = &report.schema("shop").unwrap().tables.columns;
        assert_eq!(columns.len(), 1);
        assert_eq!(columns[0].table, "orders");
        assert_eq!(columns[0].extra, ["coupon_code"]);
        assert!(columns[0].missing.is_empty());
        assert_eq!(report.summary.total_drifts, 1);
    }

    #[tokio::test]
    async fn test_extra_schema_and_table() {
        let manifest = shop_manifest();
        let mut live = shop_manifest();
        let mut v2 = orders_table();
        v2.name = "orders_v2".to_string();
        live.schemas[0].tables.push(v2);
        live.schemas.push(Schema::new("archive"));

        let report = detect(&manifest, live).await;
        assert_eq!(report.summary.extra_schemas, ["archive"]);
        assert_eq!(report.schema("shop").unwrap().tables.extra, ["orders_v2"]);
        assert_eq!(report.summary.total_drifts, 2);
        assert_eq!(report.summary.schemas_with_drift, 1);
        assert!(report.schema("archive").is_none());
    }

    #[tokio::test]
    async fn test_missing_schema_is_not_compared() {
        let mut manifest = shop_manifest();
        let mut billing = Schema::new("billing");
        billing.tables.push(orders_table());
        manifest.schemas.push(billing);

        let report = detect(&manifest, shop_manifest()).await;
        assert_eq!(report.summary.missing_schemas, ["billing"]);
        assert_eq!(report.summary.total_drifts, 1);
        assert_eq!(report.summary.schemas_with_drift, 1);
        assert!(report.schema("billing").is_none());
    }

    #[tokio::test]
    async fn test_type_mismatch_is_verbatim() {
        let manifest = shop_manifest();
        let mut live = shop_manifest();
        let notes = &mut live.schemas[0].tables[0].columns[3];
        notes.data_type = "character varying".to_string();

        let report = detect(&manifest, live).await;
        let mismatch = &report.schema("shop").unwrap().tables.columns[0].type_mismatches[0];
        assert_eq!(mismatch.column, "notes");
        assert_eq!(mismatch.manifest_type, "text");
        assert_eq!(mismatch.live_type, "character varying");
        assert_eq!(report.summary.total_drifts, 1);
    }

    #[tokio::test]
    async fn test_views_and_functions_by_name() {
        let mut manifest = shop_manifest();
        manifest.schemas[0].views.push(View {
            name: "open_orders".to_string(),
            columns: Vec::new(),
            definition: None,
        });
        let mut live = shop_manifest();
        live.schemas[0].functions.push(Function {
            name: "order_total".to_string(),
            return_type: "numeric".to_string(),
            parameters: Vec::new(),
            definition: None,
        });

        let report = detect(&manifest, live).await;
        let shop = report.schema("shop").unwrap();
        assert_eq!(shop.views.missing, ["open_orders"]);
        assert_eq!(shop.functions.extra, ["order_total"]);
        assert_eq!(shop.drift_count, 2);
    }

    #[tokio::test]
    async fn test_scope_limits_both_sides() {
        let mut manifest = shop_manifest();
        manifest.schemas.push(Schema::new("billing"));
        let mut live = shop_manifest();
        live.schemas.push(Schema::new("archive"));

        let catalog = InMemoryCatalog::new(live);
        let scope = IntrospectionConfig {
            include_schemas: vec!["shop".to_string()],
        };
        let report = DriftDetector::new(&catalog)
            .with_scope(scope)
            .detect(&manifest)
            .await
            .unwrap();
        assert!(report.is_drift_free());
    }

    #[test]
    fn test_column_drift_missing_and_extra() {
        let table = orders_table();
        let mut live = table.columns.clone();
        live.remove(1);
        live.push(column("status", "text", "text", false));
        let drift = column_drift(&table, &live);
        assert_eq!(drift.missing, ["total"]);
        assert_eq!(drift.extra, ["status"]);
        assert_eq!(drift.drift_count(), 2);
    }
}
