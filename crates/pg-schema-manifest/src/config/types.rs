//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
///
/// Every section is optional so the transform commands, which never touch
/// the database, can run from defaults alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog database connection.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Artifact paths.
    #[serde(default)]
    pub output: OutputConfig,

    /// Introspection scope.
    #[serde(default)]
    pub introspection: IntrospectionConfig,
}

/// Database (PostgreSQL) connection configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL or libpq key/value string. Takes precedence over the
    /// discrete fields below. Overridden by `DATABASE_URL`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Database host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    /// Username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    /// Password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// SSL mode (default: "disable").
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,

    /// Connect timeout in seconds, handed to the driver.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_secs: Option<u64>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: None,
            port: default_pg_port(),
            database: None,
            user: None,
            password: None,
            ssl_mode: default_ssl_mode(),
            connect_timeout_secs: None,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "[REDACTED]"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// Where each pipeline artifact is read from and written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Manifest produced by `introspect` and read by every other stage.
    #[serde(default = "default_manifest_path")]
    pub manifest: PathBuf,

    /// Rendered drift report.
    #[serde(default = "default_drift_report_path")]
    pub drift_report: PathBuf,

    /// Document-collection schema (JSON).
    #[serde(default = "default_document_schema_path")]
    pub document_schema: PathBuf,

    /// Typed-graph schema (text).
    #[serde(default = "default_graph_schema_path")]
    pub graph_schema: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            manifest: default_manifest_path(),
            drift_report: default_drift_report_path(),
            document_schema: default_document_schema_path(),
            graph_schema: default_graph_schema_path(),
        }
    }
}

/// Which schemas are walked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntrospectionConfig {
    /// Exact schema names to include. Empty means every non-system schema.
    #[serde(default)]
    pub include_schemas: Vec<String>,
}

impl IntrospectionConfig {
    /// Whether a (non-system) schema is in scope.
    pub fn includes(&self, schema: &str) -> bool {
        self.include_schemas.is_empty() || self.include_schemas.iter().any(|s| s == schema)
    }
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5432
}

fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("schema/manifest.yaml")
}

fn default_drift_report_path() -> PathBuf {
    PathBuf::from("schema/drift-report.md")
}

fn default_document_schema_path() -> PathBuf {
    PathBuf::from("schema/collections.json")
}

fn default_graph_schema_path() -> PathBuf {
    PathBuf::from("schema/schema.graphql")
}
