//! Drift result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A column whose recorded type differs from the live one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeMismatch {
    pub column: String,
    pub manifest_type: String,
    pub live_type: String,
}

/// Column-level differences for one table present on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumnDrift {
    pub table: String,
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub type_mismatches: Vec<TypeMismatch>,
}

impl TableColumnDrift {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn drift_count(&self) -> usize {
        self.missing.len() + self.extra.len() + self.type_mismatches.len()
    }

    pub fn has_drift(&self) -> bool {
        self.drift_count() > 0
    }
}

/// Missing and extra relation names, plus column drift for shared tables.
///
/// `columns` only lists tables that actually drifted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDrift {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub columns: Vec<TableColumnDrift>,
}

impl TableDrift {
    pub fn drift_count(&self) -> usize {
        self.missing.len()
            + self.extra.len()
            + self.columns.iter().map(|c| c.drift_count()).sum::<usize>()
    }
}

/// Missing and extra names for objects compared by name only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameDrift {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl NameDrift {
    pub fn drift_count(&self) -> usize {
        self.missing.len() + self.extra.len()
    }
}

/// Drift within one schema present on both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDrift {
    pub schema: String,
    pub has_drift: bool,
    pub drift_count: usize,
    pub tables: TableDrift,
    pub views: NameDrift,
    pub functions: NameDrift,
}

impl SchemaDrift {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Default::default()
        }
    }

    /// Recompute `drift_count` and `has_drift` from the detail lists.
    pub fn finalize(&mut self) {
        self.drift_count =
            self.tables.drift_count() + self.views.drift_count() + self.functions.drift_count();
        self.has_drift = self.drift_count > 0;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub total_drifts: usize,
    pub schemas_with_drift: usize,
    pub missing_schemas: Vec<String>,
    pub extra_schemas: Vec<String>,
}

/// Result of one drift run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    pub generated: DateTime<Utc>,
    pub manifest_generated: DateTime<Utc>,
    pub database: String,
    pub summary: DriftSummary,
    /// Every schema compared, drifted or not, in manifest order.
    pub schemas: Vec<SchemaDrift>,
}

impl DriftReport {
    pub fn new(database: impl Into<String>, manifest_generated: DateTime<Utc>) -> Self {
        Self {
            generated: Utc::now(),
            manifest_generated,
            database: database.into(),
            summary: DriftSummary::default(),
            schemas: Vec::new(),
        }
    }

    /// Add a compared schema and fold it into the summary.
    pub fn add_schema(&mut self, mut schema: SchemaDrift) {
        schema.finalize();
        if schema.has_drift {
            self.summary.total_drifts += schema.drift_count;
            self.summary.schemas_with_drift += 1;
        }
        self.schemas.push(schema);
    }

    /// A manifest schema absent from the live side.
    pub fn add_missing_schema(&mut self, name: impl Into<String>) {
        self.summary.missing_schemas.push(name.into());
        self.summary.total_drifts += 1;
        self.summary.schemas_with_drift += 1;
    }

    /// A live schema absent from the manifest.
    pub fn add_extra_schema(&mut self, name: impl Into<String>) {
        self.summary.extra_schemas.push(name.into());
        self.summary.total_drifts += 1;
    }

    pub fn is_drift_free(&self) -> bool {
        self.summary.total_drifts == 0
    }

    /// Compared schemas that drifted.
    pub fn drifted_schemas(&self) -> impl Iterator<Item = &SchemaDrift> {
        self.schemas.iter().filter(|s| s.has_drift)
    }

    pub fn schema(&self, name: &str) -> Option<&SchemaDrift> {
        self.schemas.iter().find(|s| s.schema == name)
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
