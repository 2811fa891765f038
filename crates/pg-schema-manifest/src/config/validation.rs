//! Configuration validation.

use super::{Config, DatabaseConfig};
use crate::drivers::SslMode;
use crate::error::{ManifestError, Result};

/// Validate the parts of the configuration every stage depends on.
pub fn validate(config: &Config) -> Result<()> {
    SslMode::parse(&config.database.ssl_mode)?;

    if config.database.port == 0 {
        return Err(ManifestError::Config(
            "database.port must be between 1 and 65535".into(),
        ));
    }

    let output = &config.output;
    for (key, path) in [
        ("output.manifest", &output.manifest),
        ("output.drift_report", &output.drift_report),
        ("output.document_schema", &output.document_schema),
        ("output.graph_schema", &output.graph_schema),
    ] {
        if path.as_os_str().is_empty() {
            return Err(ManifestError::Config(format!("{} cannot be empty", key)));
        }
    }

    if config
        .introspection
        .include_schemas
        .iter()
        .any(|s| s.trim().is_empty())
    {
        return Err(ManifestError::Config(
            "introspection.include_schemas cannot contain empty names".into(),
        ));
    }

    Ok(())
}

/// Validate that a connection can be attempted.
pub fn validate_database(database: &DatabaseConfig) -> Result<()> {
    if let Some(url) = &database.url {
        if url.trim().is_empty() {
            return Err(missing_connection_error());
        }
        return Ok(());
    }
    if database.is_configured() {
        return Ok(());
    }

    let missing: Vec<&str> = [
        ("database.host", database.host.is_none()),
        ("database.database", database.database.is_none()),
        ("database.user", database.user.is_none()),
    ]
    .into_iter()
    .filter_map(|(key, absent)| absent.then_some(key))
    .collect();

    match missing.len() {
        3 => Err(missing_connection_error()),
        _ => Err(ManifestError::Config(format!(
            "incomplete database settings, missing {}",
            missing.join(", ")
        ))),
    }
}

pub(super) fn missing_connection_error() -> ManifestError {
    ManifestError::Config(
        "no database connection configured: set database.url in the config file \
         or export DATABASE_URL"
            .into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.database = DatabaseConfig {
            host: Some("localhost".to_string()),
            database: Some("outreach".to_string()),
            user: Some("postgres".to_string()),
            password: Some("password".to_string()),
            ..DatabaseConfig::default()
        };
        config
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
        assert!(validate_database(&config.database).is_ok());
    }

    #[test]
    fn test_unknown_ssl_mode() {
        let mut config = valid_config();
        config.database.ssl_mode = "sometimes".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("verify-full"));
    }

    #[test]
    fn test_ssl_mode_matches_driver_parsing() {
        let mut config = valid_config();
        for mode in ["", "DISABLE", "require", "verify-ca", "Verify-Full"] {
            config.database.ssl_mode = mode.to_string();
            assert!(validate(&config).is_ok(), "ssl_mode {:?}", mode);
            assert!(SslMode::parse(mode).is_ok());
        }
    }

    #[test]
    fn test_zero_port() {
        let mut config = valid_config();
        config.database.port = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_connection_names_remedy() {
        let err = validate_database(&DatabaseConfig::default()).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn test_partial_settings_list_missing_keys() {
        let mut config = valid_config();
        config.database.user = None;
        let err = validate_database(&config.database).unwrap_err();
        assert!(err.to_string().contains("database.user"));
        assert!(!err.to_string().contains("database.host"));
    }

    #[test]
    fn test_url_is_enough() {
        let db = DatabaseConfig {
            url: Some("postgres://localhost/outreach".to_string()),
            ..DatabaseConfig::default()
        };
        assert!(validate_database(&db).is_ok());
    }

    #[test]
    fn test_database_config_debug_redacts_password() {
        let mut config = valid_config();
        config.database.password = Some("super_secret_password_123".to_string());
        let debug_output = format!("{:?}", config.database);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
