//! Core abstractions shared by every pipeline stage.
//!
//! - [`manifest`]: the persisted catalog snapshot and its serialization
//! - [`catalog`]: the catalog interface and its typed row records
//! - [`memory`]: a catalog served from a manifest snapshot
//! - [`persist`]: atomic artifact writes
//!
//! # Architecture
//!
//! Stages never talk to each other directly. The introspector reads a
//! [`CatalogSource`] and writes a [`Manifest`]; the drift detector and the
//! transformers read that manifest back. Database specifics live in the
//! `drivers` module behind the [`CatalogSource`] trait.

pub mod catalog;
pub mod manifest;
pub mod memory;
pub mod persist;

pub use catalog::{
    is_system_schema, live_schema_names, CatalogSource, ColumnRow, ForeignKeyRow, FunctionRow,
    IndexRow, ParameterRow,
};
pub use manifest::{
    Column, ColumnRef, DatabaseInfo, ForeignKey, Function, Index, Manifest, Parameter, Schema,
    Table, View, MANIFEST_VERSION,
};
pub use memory::InMemoryCatalog;
pub use persist::write_atomic;
