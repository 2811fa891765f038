//! PostgreSQL driver.
//!
//! - [`PostgresCatalog`]: catalog reader for introspection and drift checks

mod catalog;

pub use catalog::PostgresCatalog;
