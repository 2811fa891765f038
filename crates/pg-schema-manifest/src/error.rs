//! Error types for the manifest pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Exit code for any fatal error (and for drift found, see the CLI).
pub const EXIT_FAILURE: u8 = 1;

/// Command that produces the manifest every later stage reads.
const INTROSPECT_STEP: &str = "pg-schema-manifest introspect";

/// Main error type for introspection, drift detection and transforms.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Configuration error (invalid YAML, missing connection settings, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Catalog connection or query error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// The manifest a downstream stage depends on does not exist yet
    #[error("Manifest not found at {path:?}. Run `{upstream}` first to generate it.")]
    ManifestNotFound { path: PathBuf, upstream: String },

    /// The manifest exists but could not be parsed
    #[error("Manifest at {path:?} is malformed: {message}. Re-run `{upstream}` to regenerate it.")]
    ManifestInvalid {
        path: PathBuf,
        message: String,
        upstream: String,
    },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ManifestError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        ManifestError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a ManifestNotFound error pointing at the introspect step.
    pub fn manifest_not_found(path: impl Into<PathBuf>) -> Self {
        ManifestError::ManifestNotFound {
            path: path.into(),
            upstream: INTROSPECT_STEP.to_string(),
        }
    }

    /// Create a ManifestInvalid error pointing at the introspect step.
    pub fn manifest_invalid(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        ManifestError::ManifestInvalid {
            path: path.into(),
            message: message.to_string(),
            upstream: INTROSPECT_STEP.to_string(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Batch callers only distinguish success from failure, so every
    /// fatal error maps to the same code.
    pub fn exit_code(&self) -> u8 {
        EXIT_FAILURE
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for manifest operations.
pub type Result<T> = std::result::Result<T, ManifestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_not_found_names_upstream_step() {
        let err = ManifestError::manifest_not_found("schema/manifest.yaml");
        let msg = err.to_string();
        assert!(msg.contains("schema/manifest.yaml"));
        assert!(msg.contains("pg-schema-manifest introspect"));
    }

    #[test]
    fn test_manifest_invalid_names_upstream_step() {
        let err = ManifestError::manifest_invalid("schema/manifest.yaml", "bad indentation");
        let msg = err.to_string();
        assert!(msg.contains("is malformed: bad indentation"));
        assert!(msg.contains("Re-run `pg-schema-manifest introspect`"));
    }

    #[test]
    fn test_every_error_exits_with_one() {
        assert_eq!(ManifestError::Config("x".into()).exit_code(), 1);
        assert_eq!(ManifestError::pool("refused", "connecting").exit_code(), 1);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(ManifestError::from(io).exit_code(), 1);
    }

    #[test]
    fn test_format_detailed_includes_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ManifestError::from(io);
        let detailed = err.format_detailed();
        assert!(detailed.starts_with("Error: IO error: denied"));
    }
}
