//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::Path;
use std::time::Duration;

use tokio_postgres::Config as PgConfig;

use crate::error::{ManifestError, Result};

/// Environment variable that overrides `database.url`.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ManifestError::Config(format!(
                "config file not found: {:?}",
                path
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    ///
    /// An empty document yields the default configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(yaml)
            .map_err(|e| ManifestError::Config(format!("invalid config file: {}", e)))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Apply `DATABASE_URL` from the process environment, if set.
    pub fn with_env_overrides(self) -> Self {
        let url = std::env::var(DATABASE_URL_ENV).ok();
        self.with_database_url(url)
    }

    /// Override the database URL when one is given.
    pub fn with_database_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.database.url = Some(url);
        }
        self
    }

    /// Validate the configuration for stages that do not touch the database.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Validate the configuration for stages that need a database connection.
    pub fn validate_for_database(&self) -> Result<()> {
        validation::validate(self)?;
        validation::validate_database(&self.database)
    }
}

impl DatabaseConfig {
    /// Whether enough is configured to attempt a connection.
    pub fn is_configured(&self) -> bool {
        self.url.is_some()
            || (self.host.is_some() && self.database.is_some() && self.user.is_some())
    }

    /// Build a tokio-postgres config from the URL or the discrete fields.
    pub fn pg_config(&self) -> Result<PgConfig> {
        let mut pg_config = match &self.url {
            Some(url) => url.parse::<PgConfig>().map_err(|e| {
                ManifestError::Config(format!("invalid database.url: {}", e))
            })?,
            None => {
                let (Some(host), Some(database), Some(user)) =
                    (&self.host, &self.database, &self.user)
                else {
                    return Err(validation::missing_connection_error());
                };
                let mut pg_config = PgConfig::new();
                pg_config.host(host);
                pg_config.port(self.port);
                pg_config.dbname(database);
                pg_config.user(user);
                if let Some(password) = &self.password {
                    pg_config.password(password);
                }
                pg_config
            }
        };

        if let Some(secs) = self.connect_timeout_secs {
            pg_config.connect_timeout(Duration::from_secs(secs));
        }
        pg_config.application_name("pg-schema-manifest");

        Ok(pg_config)
    }

    /// Human-readable target for log lines. Never includes credentials.
    pub fn display_target(&self) -> String {
        match (&self.host, &self.database) {
            (Some(host), Some(db)) if self.url.is_none() => {
                format!("{}:{}/{}", host, self.port, db)
            }
            _ => "database from connection URL".to_string(),
        }
    }
}
