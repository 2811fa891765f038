//! Database driver implementations.
//!
//! Each driver implements [`CatalogSource`](crate::core::CatalogSource) for
//! one database engine:
//!
//! - [`postgres`]: PostgreSQL via `information_schema` and `pg_catalog`
//! - [`common`]: shared utilities (TLS)

pub mod common;
pub mod postgres;

pub use common::SslMode;
pub use postgres::PostgresCatalog;
