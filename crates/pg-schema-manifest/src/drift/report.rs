//! Markdown rendering of a [`DriftReport`].

use std::fmt::Write as _;
use std::path::Path;

use super::types::{DriftReport, NameDrift, SchemaDrift, TableColumnDrift};
use crate::core::persist::write_atomic;
use crate::error::Result;

pub fn render_markdown(report: &DriftReport) -> String {
    let mut out = String::new();
    let summary = &report.summary;

    let _ = writeln!(out, "# Schema Drift Report\n");
    let _ = writeln!(out, "- Database: `{}`", report.database);
    let _ = writeln!(out, "- Generated: {}", report.generated.to_rfc3339());
    let _ = writeln!(
        out,
        "- Manifest generated: {}\n",
        report.manifest_generated.to_rfc3339()
    );

    out.push_str("## Summary\n\n");
    out.push_str("| Metric | Value |\n");
    out.push_str("|--------|-------|\n");
    let _ = writeln!(out, "| Total drifts | {} |", summary.total_drifts);
    let _ = writeln!(out, "| Schemas with drift | {} |", summary.schemas_with_drift);
    let _ = writeln!(out, "| Missing schemas | {} |", summary.missing_schemas.len());
    let _ = writeln!(out, "| Extra schemas | {} |", summary.extra_schemas.len());
    out.push('\n');

    if report.is_drift_free() {
        out.push_str("## Status\n\n");
        out.push_str("No drift detected. The database is aligned with the manifest.\n");
        return out;
    }

    out.push_str("## Details\n\n");
    if !summary.missing_schemas.is_empty() {
        out.push_str("### Missing schemas\n\n");
        push_list(&mut out, &summary.missing_schemas);
        out.push('\n');
    }
    if !summary.extra_schemas.is_empty() {
        out.push_str("### Extra schemas\n\n");
        push_list(&mut out, &summary.extra_schemas);
        out.push('\n');
    }
    for schema in report.drifted_schemas() {
        render_schema(&mut out, schema);
    }

    out.push_str("## Recommended Actions\n\n");
    for action in recommended_actions(report) {
        let _ = writeln!(out, "- {}", action);
    }
    out
}

fn render_schema(out: &mut String, schema: &SchemaDrift) {
    let _ = writeln!(
        out,
        "### Schema `{}` ({} drifts)\n",
        schema.schema, schema.drift_count
    );

    let tables = &schema.tables;
    if !tables.missing.is_empty() || !tables.extra.is_empty() || !tables.columns.is_empty() {
        out.push_str("#### Tables\n\n");
        push_names(out, "Missing", &tables.missing);
        push_names(out, "Extra", &tables.extra);
        for columns in &tables.columns {
            render_columns(out, columns);
        }
        out.push('\n');
    }
    render_named(out, "Views", &schema.views);
    render_named(out, "Functions", &schema.functions);
}

fn render_columns(out: &mut String, columns: &TableColumnDrift) {
    let _ = writeln!(out, "- Table `{}` columns:", columns.table);
    for name in &columns.missing {
        let _ = writeln!(out, "  - Missing column `{}`", name);
    }
    for name in &columns.extra {
        let _ = writeln!(out, "  - Extra column `{}`", name);
    }
    for m in &columns.type_mismatches {
        let _ = writeln!(
            out,
            "  - Type mismatch on `{}`: manifest `{}`, live `{}`",
            m.column, m.manifest_type, m.live_type
        );
    }
}

fn render_named(out: &mut String, heading: &str, drift: &NameDrift) {
    if drift.drift_count() == 0 {
        return;
    }
    let _ = writeln!(out, "#### {}\n", heading);
    push_names(out, "Missing", &drift.missing);
    push_names(out, "Extra", &drift.extra);
    out.push('\n');
}

fn push_names(out: &mut String, label: &str, names: &[String]) {
    if names.is_empty() {
        return;
    }
    let quoted: Vec<String> = names.iter().map(|n| format!("`{}`", n)).collect();
    let _ = writeln!(out, "- {}: {}", label, quoted.join(", "));
}

fn push_list(out: &mut String, names: &[String]) {
    for name in names {
        let _ = writeln!(out, "- `{}`", name);
    }
}

fn recommended_actions(report: &DriftReport) -> Vec<&'static str> {
    let summary = &report.summary;
    let drifted: Vec<&SchemaDrift> = report.drifted_schemas().collect();

    let any_missing = !summary.missing_schemas.is_empty()
        || drifted.iter().any(|s| {
            !s.tables.missing.is_empty()
                || !s.views.missing.is_empty()
                || !s.functions.missing.is_empty()
                || s.tables.columns.iter().any(|c| !c.missing.is_empty())
        });
    let any_extra = !summary.extra_schemas.is_empty()
        || drifted.iter().any(|s| {
            !s.tables.extra.is_empty()
                || !s.views.extra.is_empty()
                || !s.functions.extra.is_empty()
                || s.tables.columns.iter().any(|c| !c.extra.is_empty())
        });
    let any_mismatch = drifted
        .iter()
        .any(|s| s.tables.columns.iter().any(|c| !c.type_mismatches.is_empty()));

    let mut actions = Vec::new();
    if any_missing {
        actions.push(
            "Missing objects: restore them in the database, or re-run introspection \
             if they were dropped on purpose.",
        );
    }
    if any_extra {
        actions.push(
            "Extra objects: review the changes that created them and re-run \
             introspection once they are approved.",
        );
    }
    if any_mismatch {
        actions.push(
            "Type mismatches: type names are compared verbatim, so check whether \
             the change is real or only an alias such as varchar for character varying.",
        );
    }
    actions.push(
        "Refresh the manifest with `pg-schema-manifest introspect` and commit it \
         alongside the schema change.",
    );
    actions
}

/// Render and write the report to `path`.
pub fn save<P: AsRef<Path>>(report: &DriftReport, path: P) -> Result<()> {
    write_atomic(path.as_ref(), render_markdown(report).as_bytes())
}
