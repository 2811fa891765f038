//! Manifest to typed-graph schema text.
//!
//! Tables become `@model` types with `@key` declarations and relationship
//! fields for their foreign keys. Views become plain `{Name}View` types.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};

use super::naming::{to_field_name, to_type_name};
use crate::core::manifest::{Column, ForeignKey, Index, Manifest, Table, View};
use crate::core::persist::write_atomic;
use crate::error::Result;
use crate::typemap::{is_required, FieldType, ScalarType, TypeMapper};

/// Custom scalars the output relies on.
pub const CUSTOM_SCALARS: [&str; 2] = ["DateTime", "JSON"];

/// One type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphType {
    pub name: String,
    pub comment: Option<String>,
    pub directives: Vec<String>,
    pub fields: Vec<GraphField>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphField {
    pub name: String,
    pub type_expr: String,
    pub directive: Option<String>,
}

impl GraphField {
    fn render(&self) -> String {
        match &self.directive {
            Some(d) => format!("  {}: {} {}", self.name, self.type_expr, d),
            None => format!("  {}: {}", self.name, self.type_expr),
        }
    }
}

impl GraphType {
    pub fn field(&self, name: &str) -> Option<&GraphField> {
        self.fields.iter().find(|f| f.name == name)
    }

    fn render(&self, out: &mut String) {
        if let Some(comment) = &self.comment {
            let _ = writeln!(out, "# {}", comment);
        }
        let _ = write!(out, "type {}", self.name);
        for directive in &self.directives {
            let _ = write!(out, "\n  {}", directive);
        }
        out.push_str(" {\n");
        for field in &self.fields {
            out.push_str(&field.render());
            out.push('\n');
        }
        out.push_str("}\n");
    }
}

/// Graph type name for a scalar.
pub fn scalar_name(scalar: ScalarType) -> &'static str {
    match scalar {
        ScalarType::String => "String",
        ScalarType::Int => "Int",
        ScalarType::Float => "Float",
        ScalarType::Boolean => "Boolean",
        ScalarType::DateTime => "DateTime",
        ScalarType::Json => "JSON",
        ScalarType::Id => "ID",
    }
}

fn type_expr(field_type: FieldType, required: bool) -> String {
    let name = scalar_name(field_type.scalar);
    let base = if field_type.is_array {
        format!("[{}]", name)
    } else {
        name.to_string()
    };
    if required {
        format!("{}!", base)
    } else {
        base
    }
}

/// Whether an index name follows a primary-key naming pattern.
pub fn is_primary_key_index(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with("_pkey") || lower.ends_with("_pk") || lower == "primary"
}

/// Map every table and view in the manifest to a type.
pub fn graph_types(manifest: &Manifest, mapper: &TypeMapper) -> Vec<GraphType> {
    let mut out = Vec::new();
    for schema in &manifest.schemas {
        for table in &schema.tables {
            out.push(table_type(&schema.name, table, mapper));
        }
        for view in &schema.views {
            out.push(view_type(&schema.name, view, mapper));
        }
    }
    out
}

fn table_type(schema: &str, table: &Table, mapper: &TypeMapper) -> GraphType {
    let mut directives = vec![format!(
        "@model(schema: \"{}\", table: \"{}\")",
        schema, table.name
    )];
    if !table.primary_key.is_empty() {
        directives.push(format!("@key(fields: {})", field_list(&table.primary_key)));
    }
    for index in table.indexes.iter().filter(|i| !is_primary_key_index(&i.name)) {
        directives.push(index_directive(index));
    }

    let mut fields: Vec<GraphField> = table
        .columns
        .iter()
        .map(|col| column_field(col, &table.primary_key, mapper))
        .collect();

    for fk in &table.foreign_keys {
        let required = table
            .columns
            .iter()
            .find(|c| c.name == fk.column)
            .map(|c| is_required(c, &table.primary_key))
            .unwrap_or(false);
        let field = relation_field(fk, required, &fields);
        fields.push(field);
    }

    GraphType {
        name: to_type_name(&table.name),
        comment: None,
        directives,
        fields,
    }
}

fn view_type(schema: &str, view: &View, mapper: &TypeMapper) -> GraphType {
    GraphType {
        name: format!("{}View", to_type_name(&view.name)),
        comment: Some(format!("Read-only view {}.{}", schema, view.name)),
        directives: Vec::new(),
        fields: view
            .columns
            .iter()
            .map(|col| column_field(col, &[], mapper))
            .collect(),
    }
}

fn column_field(col: &Column, primary_key: &[String], mapper: &TypeMapper) -> GraphField {
    GraphField {
        name: to_field_name(&col.name),
        type_expr: type_expr(mapper.resolve_column(col), is_required(col, primary_key)),
        directive: None,
    }
}

fn index_directive(index: &Index) -> String {
    format!(
        "@key(name: \"{}\", fields: {}, unique: {})",
        index.name,
        field_list(&index.columns),
        index.unique
    )
}

fn field_list(columns: &[String]) -> String {
    let names: Vec<String> = columns
        .iter()
        .map(|c| format!("\"{}\"", to_field_name(c)))
        .collect();
    format!("[{}]", names.join(", "))
}

/// `customer_id` -> `customer`; a column without the suffix gets `Ref`
/// appended, as does a name that collides with an existing field.
pub fn relation_field_name(column: &str) -> String {
    match column.strip_suffix("_id") {
        Some(stem) if !stem.is_empty() => to_field_name(stem),
        _ => to_field_name(&format!("{}_ref", column)),
    }
}

fn relation_field(fk: &ForeignKey, required: bool, existing: &[GraphField]) -> GraphField {
    let mut name = relation_field_name(&fk.column);
    while existing.iter().any(|f| f.name == name) {
        name.push_str("Ref");
    }
    let target = to_type_name(&fk.references.table);
    GraphField {
        name,
        type_expr: if required { format!("{}!", target) } else { target },
        directive: Some(format!(
            "@relation(field: \"{}\", references: \"{}\")",
            to_field_name(&fk.column),
            to_field_name(&fk.references.column)
        )),
    }
}

/// Render the full document: header, scalar declarations, then types.
pub fn render(manifest: &Manifest, mapper: &TypeMapper, generated: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Generated by pg-schema-manifest");
    let _ = writeln!(out, "# Generated at: {}", generated.to_rfc3339());
    let _ = writeln!(
        out,
        "# Source database: {} ({})",
        manifest.database.name, manifest.database.version
    );
    let _ = writeln!(
        out,
        "# Manifest version: {} (generated {})",
        manifest.version,
        manifest.generated.to_rfc3339()
    );
    out.push('\n');
    for scalar in CUSTOM_SCALARS {
        let _ = writeln!(out, "scalar {}", scalar);
    }

    for ty in graph_types(manifest, mapper) {
        out.push('\n');
        ty.render(&mut out);
    }
    out
}

/// Render and write the document to `path`.
pub fn save<P: AsRef<Path>>(
    manifest: &Manifest,
    mapper: &TypeMapper,
    generated: DateTime<Utc>,
    path: P,
) -> Result<()> {
    write_atomic(path.as_ref(), render(manifest, mapper, generated).as_bytes())
}
