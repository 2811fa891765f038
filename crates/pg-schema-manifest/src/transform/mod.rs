//! Manifest transformers.
//!
//! - [`document`]: document-collection schema (JSON)
//! - [`graph`]: typed-graph schema (text)
//!
//! Both resolve column types through one [`TypeMapper`](crate::typemap::TypeMapper).

pub mod document;
pub mod graph;
pub mod naming;

pub use document::{Collection, Constraints, DocumentSchema, Field, SourceKind};
pub use graph::{graph_types, GraphField, GraphType};
pub use naming::{to_field_name, to_snake_case, to_type_name};
