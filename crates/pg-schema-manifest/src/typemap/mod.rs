//! Catalog type to field type mapping, shared by both schema transformers.
//!
//! Resolution is an ordered chain of matchers; the first one that returns a
//! type wins:
//!
//! 1. exact lookup of the catalog type name in the [`TypeTable`]
//! 2. exact lookup of the underlying type identifier (`udt_name`)
//! 3. substring sniffing of the type name
//! 4. fallback to [`ScalarType::String`], logged as a warning
//!
//! Array columns resolve their element type through the same chain and are
//! wrapped afterwards. Both transformers hold the same [`TypeMapper`], so a
//! type can never map differently between the two outputs.

use std::collections::HashMap;

use tracing::warn;

use crate::core::manifest::Column;

/// Target-independent field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    String,
    Int,
    Float,
    Boolean,
    DateTime,
    Json,
    Id,
}

/// A resolved field type: a scalar, or an array of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub scalar: ScalarType,
    pub is_array: bool,
}

impl FieldType {
    pub fn scalar(scalar: ScalarType) -> Self {
        Self {
            scalar,
            is_array: false,
        }
    }

    pub fn array(scalar: ScalarType) -> Self {
        Self {
            scalar,
            is_array: true,
        }
    }
}

/// Which matcher produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStage {
    TypeName,
    UdtName,
    Sniffed,
    Fallback,
}

/// Result of resolving one column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub field_type: FieldType,
    pub stage: MatchStage,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        self.stage == MatchStage::Fallback
    }
}

/// Exact-match lookup table from normalized catalog type names.
#[derive(Debug, Clone)]
pub struct TypeTable {
    entries: HashMap<&'static str, ScalarType>,
}

impl TypeTable {
    /// The standard PostgreSQL table.
    ///
    /// 64-bit integers map to strings: consumers with 53-bit safe integers
    /// would otherwise lose precision.
    pub fn standard() -> Self {
        use ScalarType::*;

        const ENTRIES: &[(&str, ScalarType)] = &[
            // Character
            ("text", String),
            ("character varying", String),
            ("varchar", String),
            ("character", String),
            ("char", String),
            ("bpchar", String),
            ("name", String),
            ("citext", String),
            // Integers
            ("smallint", Int),
            ("integer", Int),
            ("int", Int),
            ("int2", Int),
            ("int4", Int),
            ("smallserial", Int),
            ("serial", Int),
            ("serial2", Int),
            ("serial4", Int),
            ("bigint", String),
            ("int8", String),
            ("bigserial", String),
            ("serial8", String),
            // Decimal and floating point
            ("numeric", Float),
            ("decimal", Float),
            ("real", Float),
            ("float4", Float),
            ("double precision", Float),
            ("float8", Float),
            ("money", Float),
            // Boolean
            ("boolean", Boolean),
            ("bool", Boolean),
            // Date and time
            ("timestamp", DateTime),
            ("timestamp without time zone", DateTime),
            ("timestamp with time zone", DateTime),
            ("timestamptz", DateTime),
            ("date", DateTime),
            ("time", DateTime),
            ("time without time zone", DateTime),
            ("time with time zone", DateTime),
            ("timetz", DateTime),
            // Listed so the "int" sniff does not claim it
            ("interval", String),
            // Documents
            ("json", Json),
            ("jsonb", Json),
            // Identifiers and binary
            ("uuid", Id),
            ("bytea", String),
        ];

        Self {
            entries: ENTRIES.iter().copied().collect(),
        }
    }

    /// Case-insensitive lookup.
    pub fn get(&self, type_name: &str) -> Option<ScalarType> {
        self.entries.get(normalize(type_name).as_str()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every type name in the table.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }
}

impl Default for TypeTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// The slice of a column the matchers look at.
#[derive(Debug, Clone, Copy)]
pub struct TypeRef<'a> {
    pub data_type: &'a str,
    pub udt_name: &'a str,
}

impl<'a> From<&'a Column> for TypeRef<'a> {
    fn from(col: &'a Column) -> Self {
        Self {
            data_type: &col.data_type,
            udt_name: &col.udt_name,
        }
    }
}

/// A single resolution step.
pub type Matcher = fn(&TypeTable, TypeRef<'_>) -> Option<ScalarType>;

/// Step 1: the catalog type name.
pub fn match_type_name(table: &TypeTable, ty: TypeRef<'_>) -> Option<ScalarType> {
    table.get(ty.data_type)
}

/// Step 2: the underlying type identifier.
pub fn match_udt_name(table: &TypeTable, ty: TypeRef<'_>) -> Option<ScalarType> {
    table.get(ty.udt_name)
}

/// Step 3: substring sniffing, in fixed priority order.
pub fn match_sniffed(_table: &TypeTable, ty: TypeRef<'_>) -> Option<ScalarType> {
    let name = normalize(ty.data_type);
    if name.contains("int") {
        Some(ScalarType::Int)
    } else if name.contains("char") || name.contains("text") {
        Some(ScalarType::String)
    } else if name.contains("time") || name.contains("date") {
        Some(ScalarType::DateTime)
    } else if name.contains("json") {
        Some(ScalarType::Json)
    } else if name.contains("bool") {
        Some(ScalarType::Boolean)
    } else if name.contains("uuid") {
        Some(ScalarType::Id)
    } else {
        None
    }
}

const MATCHERS: [(MatchStage, Matcher); 3] = [
    (MatchStage::TypeName, match_type_name),
    (MatchStage::UdtName, match_udt_name),
    (MatchStage::Sniffed, match_sniffed),
];

/// Resolves column types against a [`TypeTable`].
#[derive(Debug, Clone, Default)]
pub struct TypeMapper {
    table: TypeTable,
}

impl TypeMapper {
    pub fn new(table: TypeTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &TypeTable {
        &self.table
    }

    /// Resolve a column's type, logging a warning on fallback.
    pub fn resolve_column(&self, col: &Column) -> FieldType {
        let resolution = self.resolve(TypeRef::from(col));
        if resolution.is_fallback() {
            warn!(
                "Unmapped type '{}' (udt '{}') for column '{}', using string",
                col.data_type, col.udt_name, col.name
            );
        }
        resolution.field_type
    }

    /// Resolve a type through the matcher chain.
    pub fn resolve(&self, ty: TypeRef<'_>) -> Resolution {
        match array_element(ty) {
            Some(element) => {
                let inner = self.resolve_scalar(element);
                Resolution {
                    field_type: FieldType::array(inner.field_type.scalar),
                    stage: inner.stage,
                }
            }
            None => self.resolve_scalar(ty),
        }
    }

    fn resolve_scalar(&self, ty: TypeRef<'_>) -> Resolution {
        MATCHERS
            .iter()
            .find_map(|(stage, matcher)| {
                matcher(&self.table, ty).map(|scalar| Resolution {
                    field_type: FieldType::scalar(scalar),
                    stage: *stage,
                })
            })
            .unwrap_or(Resolution {
                field_type: FieldType::scalar(ScalarType::String),
                stage: MatchStage::Fallback,
            })
    }
}

/// Detect an array type and return its element type.
///
/// Either signal is enough: a `_`-prefixed udt name (`_int4`), or an array
/// marker on the type name (`ARRAY` or a `[]` suffix).
fn array_element(ty: TypeRef<'_>) -> Option<TypeRef<'_>> {
    if let Some(element) = ty.udt_name.strip_prefix('_').filter(|e| !e.is_empty()) {
        return Some(TypeRef {
            data_type: element,
            udt_name: element,
        });
    }
    if let Some(element) = ty.data_type.strip_suffix("[]") {
        return Some(TypeRef {
            data_type: element,
            udt_name: ty.udt_name,
        });
    }
    if ty.data_type.eq_ignore_ascii_case("array") {
        return Some(TypeRef {
            data_type: ty.udt_name,
            udt_name: ty.udt_name,
        });
    }
    None
}

fn normalize(type_name: &str) -> String {
    type_name.trim().to_lowercase()
}

/// Default-expression markers for server-generated values.
const GENERATED_DEFAULT_MARKERS: &[&str] = &[
    "nextval(",
    "gen_random_uuid(",
    "uuid_generate_",
    "now()",
    "current_timestamp",
    "clock_timestamp(",
    "transaction_timestamp(",
    "statement_timestamp(",
];

/// Whether the server fills a column in when the client omits it.
///
/// True for primary-key columns of a serial type, and for any column whose
/// default calls a sequence, UUID generator or current-time function.
pub fn is_auto_generated(col: &Column, primary_key: &[String]) -> bool {
    let in_pk = primary_key.iter().any(|c| c == &col.name);
    let serial_type = normalize(&col.data_type).contains("serial")
        || normalize(&col.udt_name).contains("serial");
    if in_pk && serial_type {
        return true;
    }

    col.default
        .as_deref()
        .map(|default| {
            let default = default.to_lowercase();
            GENERATED_DEFAULT_MARKERS
                .iter()
                .any(|marker| default.contains(marker))
        })
        .unwrap_or(false)
}

/// Whether a client must supply the field: non-nullable and not generated.
pub fn is_required(col: &Column, primary_key: &[String]) -> bool {
    !col.nullable && !is_auto_generated(col, primary_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::fixtures::column;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::Level;
    use tracing_subscriber::fmt::MakeWriter;

    fn resolve(data_type: &str, udt: &str) -> Resolution {
        TypeMapper::default().resolve(TypeRef {
            data_type,
            udt_name: udt,
        })
    }

    #[test]
    fn test_exact_matches() {
        assert_eq!(resolve("text", "text").field_type.scalar, ScalarType::String);
        assert_eq!(resolve("INTEGER", "int4").field_type.scalar, ScalarType::Int);
        assert_eq!(resolve("bigint", "int8").field_type.scalar, ScalarType::String);
        assert_eq!(resolve("numeric", "numeric").field_type.scalar, ScalarType::Float);
        assert_eq!(resolve("boolean", "bool").field_type.scalar, ScalarType::Boolean);
        assert_eq!(
            resolve("timestamp with time zone", "timestamptz").field_type.scalar,
            ScalarType::DateTime
        );
        assert_eq!(resolve("jsonb", "jsonb").field_type.scalar, ScalarType::Json);
        assert_eq!(resolve("uuid", "uuid").field_type.scalar, ScalarType::Id);
        assert_eq!(resolve("bytea", "bytea").field_type.scalar, ScalarType::String);
        assert_eq!(resolve("text", "text").stage, MatchStage::TypeName);
    }

    #[test]
    fn test_udt_fallback() {
        let r = resolve("USER-DEFINED", "citext");
        assert_eq!(r.field_type.scalar, ScalarType::String);
        assert_eq!(r.stage, MatchStage::UdtName);
    }

    #[test]
    fn test_sniff_priority() {
        let sniff = |data_type| {
            match_sniffed(
                &TypeTable::standard(),
                TypeRef {
                    data_type,
                    udt_name: "",
                },
            )
        };
        assert_eq!(sniff("tinyint"), Some(ScalarType::Int));
        // "int" wins over "time" when both appear
        assert_eq!(sniff("pointtime"), Some(ScalarType::Int));
        let r = resolve("nvarchar", "mystery");
        assert_eq!(r.field_type.scalar, ScalarType::String);
        assert_eq!(r.stage, MatchStage::Sniffed);
        assert_eq!(resolve("datetime2", "x").field_type.scalar, ScalarType::DateTime);
        assert_eq!(resolve("geojson", "x").field_type.scalar, ScalarType::Json);
        assert_eq!(resolve("boolish", "x").field_type.scalar, ScalarType::Boolean);
        assert_eq!(resolve("uuid_v7", "x").field_type.scalar, ScalarType::Id);
    }

    #[test]
    fn test_interval_is_not_sniffed_as_int() {
        assert_eq!(resolve("interval", "interval").field_type.scalar, ScalarType::String);
    }

    #[test]
    fn test_unmapped_type_falls_back_to_string() {
        let r = resolve("frobnicate", "frobnicate");
        assert_eq!(r.field_type, FieldType::scalar(ScalarType::String));
        assert!(r.is_fallback());
    }

    #[test]
    fn test_array_types() {
        assert_eq!(resolve("ARRAY", "_int4").field_type, FieldType::array(ScalarType::Int));
        assert_eq!(resolve("ARRAY", "_text").field_type, FieldType::array(ScalarType::String));
        assert_eq!(resolve("integer[]", "_int4").field_type, FieldType::array(ScalarType::Int));
        assert_eq!(resolve("ARRAY", "_uuid").field_type, FieldType::array(ScalarType::Id));
        let unknown = resolve("ARRAY", "_frob");
        assert_eq!(unknown.field_type, FieldType::array(ScalarType::String));
        assert!(unknown.is_fallback());
    }

    #[test]
    fn test_udt_prefix_alone_marks_array() {
        // Without the ARRAY marker the "int" sniff would claim these as scalars
        assert_eq!(resolve("_int4", "_int4").field_type, FieldType::array(ScalarType::Int));
        assert_eq!(resolve("", "_timestamptz").field_type, FieldType::array(ScalarType::DateTime));
        assert_eq!(resolve("text[]", "text").field_type, FieldType::array(ScalarType::String));
        assert_eq!(resolve("_", "_").field_type, FieldType::scalar(ScalarType::String));
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    struct BufferWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> MakeWriter<'a> for SharedBuffer {
        type Writer = BufferWriter;

        fn make_writer(&'a self) -> Self::Writer {
            BufferWriter(Arc::clone(&self.0))
        }
    }

    impl io::Write for BufferWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured_warnings(f: impl FnOnce()) -> String {
        let sink = SharedBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(sink.clone())
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = sink.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_unmapped_column_warns_and_falls_back_to_string() {
        let mapper = TypeMapper::default();
        let col = column("shape", "frobnicate", "frob", true);

        let mut resolved = None;
        let logs = captured_warnings(|| resolved = Some(mapper.resolve_column(&col)));

        assert_eq!(resolved, Some(FieldType::scalar(ScalarType::String)));
        assert!(logs.contains("WARN"));
        assert!(logs.contains("Unmapped type 'frobnicate'"));
        assert!(logs.contains("column 'shape'"));
    }

    #[test]
    fn test_mapped_column_does_not_warn() {
        let mapper = TypeMapper::default();
        let col = column("notes", "text", "text", true);
        let logs = captured_warnings(|| {
            mapper.resolve_column(&col);
        });
        assert!(logs.is_empty());
    }

    #[test]
    fn test_every_table_entry_resolves_by_type_name() {
        let mapper = TypeMapper::default();
        for name in mapper.table().type_names() {
            let r = mapper.resolve(TypeRef { data_type: name, udt_name: "" });
            assert_eq!(r.stage, MatchStage::TypeName, "{}", name);
        }
    }

    #[test]
    fn test_auto_generated_detection() {
        let pk = vec!["id".to_string()];

        let mut id = column("id", "integer", "int4", false);
        id.default = Some("nextval('users_id_seq'::regclass)".to_string());
        assert!(is_auto_generated(&id, &pk));
        assert!(!is_required(&id, &pk));

        let serial = column("id", "bigserial", "int8", false);
        assert!(is_auto_generated(&serial, &pk));
        assert!(!is_auto_generated(&serial, &[]));

        let mut uid = column("uid", "uuid", "uuid", false);
        uid.default = Some("gen_random_uuid()".to_string());
        assert!(is_auto_generated(&uid, &pk));

        let mut created = column("created_at", "timestamp with time zone", "timestamptz", false);
        created.default = Some("CURRENT_TIMESTAMP".to_string());
        assert!(!is_required(&created, &pk));

        let mut status = column("status", "text", "text", false);
        status.default = Some("'new'::text".to_string());
        assert!(is_required(&status, &pk));

        let notes = column("notes", "text", "text", true);
        assert!(!is_required(&notes, &pk));
    }
}
