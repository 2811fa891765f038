//! # pg-schema-manifest
//!
//! PostgreSQL catalog snapshots, drift detection and schema transforms.
//!
//! This library provides:
//!
//! - **Introspection** of a live catalog into a YAML manifest
//! - **Drift detection** between a manifest and a live (or second) catalog
//! - **Document-collection schema** generation from a manifest
//! - **Typed-graph schema** generation from a manifest
//!
//! Both transformers share one [`TypeMapper`], so a catalog type always maps
//! to the same field type in either output.
//!
//! ## Example
//!
//! ```rust,no_run
//! use pg_schema_manifest::{Config, DriftDetector, Introspector, PostgresCatalog};
//! use pg_schema_manifest::core::CatalogSource;
//!
//! # async fn run() -> pg_schema_manifest::Result<()> {
//! let config = Config::load("config.yaml")?.with_env_overrides();
//! let catalog = PostgresCatalog::connect(&config.database).await?;
//!
//! let manifest = Introspector::new(&catalog).run().await?;
//! manifest.save(&config.output.manifest)?;
//!
//! let report = DriftDetector::new(&catalog).detect(&manifest).await?;
//! assert!(report.is_drift_free());
//! catalog.close().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod drift;
pub mod drivers;
pub mod error;
pub mod introspect;
pub mod transform;
pub mod typemap;

// Re-exports for convenient access
pub use crate::core::{CatalogSource, InMemoryCatalog, Manifest, MANIFEST_VERSION};
pub use config::{Config, DatabaseConfig, IntrospectionConfig, OutputConfig};
pub use drift::{render_markdown, DriftDetector, DriftReport, DriftSummary};
pub use drivers::{PostgresCatalog, SslMode};
pub use error::{ManifestError, Result, EXIT_FAILURE};
pub use introspect::Introspector;
pub use transform::DocumentSchema;
pub use typemap::{ScalarType, TypeMapper, TypeTable};
