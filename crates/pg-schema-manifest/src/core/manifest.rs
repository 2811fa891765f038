//! The manifest: a persisted snapshot of a database catalog.
//!
//! Produced by the introspector, consumed by the drift detector and both
//! schema transformers. Column order inside tables and views follows the
//! catalog's ordinal position; every downstream output relies on it.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::persist::write_atomic;
use crate::error::{ManifestError, Result};

/// Manifest format version written by this crate.
pub const MANIFEST_VERSION: &str = "1.0";

/// Root of the manifest document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest format version.
    pub version: String,

    /// When the introspection ran.
    pub generated: DateTime<Utc>,

    /// Connection identity at introspection time.
    pub database: DatabaseInfo,

    /// Schemas, sorted by name.
    pub schemas: Vec<Schema>,
}

/// Identity of the database that was introspected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Server version string.
    pub version: String,
    /// Database name.
    pub name: String,
    /// Connected user.
    pub user: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub views: Vec<View>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

/// Base table metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,

    /// Columns in ordinal order.
    pub columns: Vec<Column>,

    /// Primary key column names, in key order.
    #[serde(default)]
    pub primary_key: Vec<String>,

    #[serde(default)]
    pub indexes: Vec<Index>,

    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

/// Column metadata as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,

    /// Catalog type name (e.g. "character varying", "ARRAY").
    #[serde(rename = "type")]
    pub data_type: String,

    /// Underlying type identifier (e.g. "varchar", "_int4").
    pub udt_name: String,

    pub nullable: bool,

    /// Raw default expression.
    #[serde(default)]
    pub default: Option<String>,

    #[serde(default)]
    pub max_length: Option<i32>,

    /// Numeric precision.
    #[serde(default)]
    pub precision: Option<i32>,

    /// Numeric scale.
    #[serde(default)]
    pub scale: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    /// Indexed columns in key order.
    pub columns: Vec<String>,
    pub unique: bool,
}

/// Single-column foreign key. Composite keys are not modeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name.
    pub name: String,
    /// Local column.
    pub column: String,
    pub references: ColumnRef,
}

/// Fully qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRef {
    pub schema: String,
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub columns: Vec<Column>,
    /// Defining query, when the catalog exposes it.
    #[serde(default)]
    pub definition: Option<String>,
}

/// User-defined function. Overloads collapse to one entry per name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub return_type: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    /// IN, OUT or INOUT.
    pub mode: String,
}

impl Manifest {
    /// Create an empty manifest stamped with the current time.
    pub fn new(database: DatabaseInfo) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            generated: Utc::now(),
            database,
            schemas: Vec::new(),
        }
    }

    /// Load a manifest from a YAML file.
    ///
    /// A missing file is reported as [`ManifestError::ManifestNotFound`] and an
    /// unreadable one as [`ManifestError::ManifestInvalid`], so the caller can
    /// point at the introspect step.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ManifestError::manifest_not_found(path));
        }
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::InvalidData => ManifestError::manifest_invalid(path, e),
            _ => ManifestError::Io(e),
        })?;
        Self::from_yaml(&content).map_err(|e| ManifestError::manifest_invalid(path, e))
    }

    /// Parse a manifest from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Save to a file, replacing any previous manifest atomically.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_yaml()?;
        write_atomic(path.as_ref(), content.as_bytes())
    }

    /// Look up a schema by name.
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// Total number of tables across all schemas.
    pub fn table_count(&self) -> usize {
        self.schemas.iter().map(|s| s.tables.len()).sum()
    }

    /// Total number of views across all schemas.
    pub fn view_count(&self) -> usize {
        self.schemas.iter().map(|s| s.views.len()).sum()
    }

    /// Total number of functions across all schemas.
    pub fn function_count(&self) -> usize {
        self.schemas.iter().map(|s| s.functions.len()).sum()
    }
}

impl Schema {
    /// Create an empty schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
            views: Vec::new(),
            functions: Vec::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.views.iter().find(|v| v.name == name)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn rich_manifest() -> Manifest {
        let mut manifest = shop_manifest();
        let schema = &mut manifest.schemas[0];
        schema.tables[0].indexes.push(Index {
            name: "orders_created_idx".to_string(),
            columns: vec!["created_at".to_string(), "order_id".to_string()],
            unique: false,
        });
        schema.tables[0].foreign_keys.push(ForeignKey {
            name: "orders_customer_fk".to_string(),
            column: "customer_id".to_string(),
            references: ColumnRef {
                schema: "crm".to_string(),
                table: "customers".to_string(),
                column: "id".to_string(),
            },
        });
        schema.views.push(View {
            name: "open_orders".to_string(),
            columns: vec![column("order_id", "integer", "int4", true)],
            definition: None,
        });
        schema.functions.push(Function {
            name: "order_total".to_string(),
            return_type: "numeric".to_string(),
            parameters: vec![Parameter {
                name: "p_order_id".to_string(),
                data_type: "integer".to_string(),
                mode: "IN".to_string(),
            }],
            definition: Some("SELECT 1".to_string()),
        });
        manifest
    }

    #[test]
    fn test_yaml_round_trip_preserves_structure() {
        let manifest = rich_manifest();
        let yaml = manifest.to_yaml().unwrap();
        let parsed = Manifest::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, manifest);

        let names: Vec<_> = parsed.schemas[0].tables[0]
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(names, ["order_id", "total", "created_at", "notes"]);
    }

    #[test]
    fn test_yaml_uses_catalog_field_names() {
        let yaml = shop_manifest().to_yaml().unwrap();
        assert!(yaml.contains("type: integer"));
        assert!(yaml.contains("udt_name: int4"));
        assert!(yaml.contains("primary_key:"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("manifest.yaml");
        let manifest = rich_manifest();
        manifest.save(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_save_overwrites_previous_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        rich_manifest().save(&path).unwrap();
        shop_manifest().save(&path).unwrap();
        let loaded = Manifest::load(&path).unwrap();
        assert!(loaded.schemas[0].views.is_empty());
    }

    #[test]
    fn test_load_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ManifestError::ManifestNotFound { .. }));
    }

    #[test]
    fn test_load_malformed_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        std::fs::write(&path, "version: [1").unwrap();
        let err = Manifest::load(&path).unwrap_err();
        assert!(matches!(err, ManifestError::ManifestInvalid { .. }));
        assert!(err.to_string().contains("pg-schema-manifest introspect"));
    }

    #[test]
    fn test_load_non_utf8_manifest_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.yaml");
        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        let err = Manifest::load(&path).unwrap_err();
        assert!(matches!(err, ManifestError::ManifestInvalid { .. }));
        assert!(err.to_string().contains("pg-schema-manifest introspect"));
    }

    #[test]
    fn test_counts_and_lookup() {
        let manifest = rich_manifest();
        assert_eq!(manifest.table_count(), 1);
        assert_eq!(manifest.view_count(), 1);
        assert_eq!(manifest.function_count(), 1);
        let shop = manifest.schema("shop").unwrap();
        assert_eq!(shop.table("orders").unwrap().primary_key, vec!["order_id"]);
        assert!(shop.view("open_orders").is_some());
        assert!(manifest.schema("archive").is_none());
    }
}
