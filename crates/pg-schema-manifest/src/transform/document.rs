//! Manifest to document-collection schema.
//!
//! Each table and view becomes one collection named `{schema}_{relation}`.
//! Downstream consumers key on that name, so it is never re-cased.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::naming::to_field_name;
use crate::core::manifest::{Column, DatabaseInfo, ForeignKey, Index, Manifest, Table, View};
use crate::core::persist::write_atomic;
use crate::error::Result;
use crate::typemap::{is_auto_generated, FieldType, ScalarType, TypeMapper};

/// Document-collection schema format version.
pub const DOCUMENT_SCHEMA_VERSION: &str = "1.0";

const VIEW_CONSTRAINT_NOTE: &str =
    "Views are read-only; constraints are enforced by the underlying tables.";

/// The output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSchema {
    pub version: String,
    pub generated: DateTime<Utc>,
    pub source: DocumentSource,
    pub collections: Vec<Collection>,
}

/// Where the schema came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSource {
    pub database: DatabaseInfo,
    pub manifest_version: String,
    pub manifest_generated: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub description: String,
    pub source: CollectionSource,
    pub read_only: bool,
    pub fields: Vec<Field>,
    pub indexes: Vec<Index>,
    pub constraints: Constraints,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSource {
    pub schema: String,
    pub table: String,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Table,
    View,
}

/// A collection field.
///
/// Arrays use `type: "array"` with the element type in `items`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<String>,
    pub nullable: bool,
    pub metadata: FieldMetadata,
}

/// Source column details carried alongside each field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMetadata {
    pub column: String,
    pub db_type: String,
    pub udt_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<i32>,
    pub primary_key: bool,
    pub auto_generated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Constraints {
    Table {
        primary_key: Vec<String>,
        foreign_keys: Vec<ForeignKey>,
    },
    View {
        note: String,
    },
}

impl DocumentSchema {
    /// Build the document for a manifest.
    pub fn build(manifest: &Manifest, mapper: &TypeMapper, generated: DateTime<Utc>) -> Self {
        Self {
            version: DOCUMENT_SCHEMA_VERSION.to_string(),
            generated,
            source: DocumentSource {
                database: manifest.database.clone(),
                manifest_version: manifest.version.clone(),
                manifest_generated: manifest.generated,
            },
            collections: collections(manifest, mapper),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut content = self.to_json()?;
        content.push('\n');
        write_atomic(path.as_ref(), content.as_bytes())
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }
}

/// Map every table and view in the manifest to a collection.
pub fn collections(manifest: &Manifest, mapper: &TypeMapper) -> Vec<Collection> {
    let mut out = Vec::new();
    for schema in &manifest.schemas {
        for table in &schema.tables {
            out.push(table_collection(&schema.name, table, mapper));
        }
        for view in &schema.views {
            out.push(view_collection(&schema.name, view, mapper));
        }
    }
    out
}

fn table_collection(schema: &str, table: &Table, mapper: &TypeMapper) -> Collection {
    let fields = table
        .columns
        .iter()
        .map(|col| field(col, &table.primary_key, mapper))
        .collect();

    let mut indexes = table.indexes.clone();
    if !table.primary_key.is_empty() {
        indexes.push(Index {
            name: format!("{}_pk", table.name),
            columns: table.primary_key.clone(),
            unique: true,
        });
    }

    Collection {
        name: collection_name(schema, &table.name),
        description: format!(
            "Table {}.{} ({} columns)",
            schema,
            table.name,
            table.columns.len()
        ),
        source: CollectionSource {
            schema: schema.to_string(),
            table: table.name.clone(),
            kind: SourceKind::Table,
        },
        read_only: false,
        fields,
        indexes,
        constraints: Constraints::Table {
            primary_key: table.primary_key.clone(),
            foreign_keys: table.foreign_keys.clone(),
        },
    }
}

fn view_collection(schema: &str, view: &View, mapper: &TypeMapper) -> Collection {
    Collection {
        name: collection_name(schema, &view.name),
        description: format!("Read-only view {}.{}", schema, view.name),
        source: CollectionSource {
            schema: schema.to_string(),
            table: view.name.clone(),
            kind: SourceKind::View,
        },
        read_only: true,
        fields: view
            .columns
            .iter()
            .map(|col| field(col, &[], mapper))
            .collect(),
        indexes: Vec::new(),
        constraints: Constraints::View {
            note: VIEW_CONSTRAINT_NOTE.to_string(),
        },
    }
}

/// `{schema}_{relation}`.
pub fn collection_name(schema: &str, relation: &str) -> String {
    format!("{}_{}", schema, relation)
}

fn field(col: &Column, primary_key: &[String], mapper: &TypeMapper) -> Field {
    let resolved = mapper.resolve_column(col);
    let auto_generated = is_auto_generated(col, primary_key);
    let (field_type, format, items) = document_type(resolved);

    Field {
        name: to_field_name(&col.name),
        field_type,
        format,
        items,
        nullable: col.nullable || auto_generated,
        metadata: FieldMetadata {
            column: col.name.clone(),
            db_type: col.data_type.clone(),
            udt_name: col.udt_name.clone(),
            default: col.default.clone(),
            max_length: col.max_length,
            precision: col.precision,
            scale: col.scale,
            primary_key: primary_key.iter().any(|c| c == &col.name),
            auto_generated,
        },
    }
}

/// Document type name and optional format for a scalar.
pub fn scalar_name(scalar: ScalarType) -> (&'static str, Option<&'static str>) {
    match scalar {
        ScalarType::String => ("string", None),
        ScalarType::Int => ("number", Some("int")),
        ScalarType::Float => ("number", Some("float")),
        ScalarType::Boolean => ("boolean", None),
        ScalarType::DateTime => ("datetime", None),
        ScalarType::Json => ("map", None),
        ScalarType::Id => ("string", Some("uuid")),
    }
}

fn document_type(field_type: FieldType) -> (String, Option<String>, Option<String>) {
    let (name, format) = scalar_name(field_type.scalar);
    let format = format.map(str::to_string);
    if field_type.is_array {
        ("array".to_string(), format, Some(name.to_string()))
    } else {
        (name.to_string(), format, None)
    }
}
