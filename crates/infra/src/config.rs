//! Runtime configuration.
//!
//! Sources, later ones winning:
//! 1. Defaults in code
//! 2. `stockflow.toml` in the working directory (optional)
//! 3. Environment variables, e.g. `STOCKFLOW__BACKEND=postgres`,
//!    `STOCKFLOW__DATABASE__URL=postgres://...`

use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;

use stockflow_observability::tracing::LogFormat;

/// Which ledger store to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockflowConfig {
    pub backend: Backend,
    pub database: DatabaseConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. Required for the postgres backend.
    pub url: Option<String>,

    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` overrides it.
    pub filter: String,

    pub json: bool,
}

impl LogConfig {
    pub fn format(&self) -> LogFormat {
        if self.json { LogFormat::Json } else { LogFormat::Pretty }
    }
}

impl StockflowConfig {
    /// Load configuration from `stockflow.toml` and `STOCKFLOW__*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config = defaults()?
            .add_source(File::with_name("stockflow").required(false))
            .add_source(
                Environment::with_prefix("STOCKFLOW")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::finish(config)
    }

    /// Load configuration from a TOML document layered over the defaults.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let config = defaults()?
            .add_source(File::from_str(source, FileFormat::Toml))
            .build()?;

        Self::finish(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backend == Backend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::Message(
                "database.url is required for the postgres backend".into(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for StockflowConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            database: DatabaseConfig {
                url: None,
                max_connections: 5,
            },
            log: LogConfig {
                filter: "info".to_string(),
                json: true,
            },
        }
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("backend", "memory")?
        .set_default("database.max_connections", 5)?
        .set_default("log.filter", "info")?
        .set_default("log.json", true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = StockflowConfig::from_toml("").unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.database.url, None);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.log.format(), LogFormat::Json);
    }

    #[test]
    fn postgres_backend_from_toml() {
        let config = StockflowConfig::from_toml(
            r#"
            backend = "postgres"

            [database]
            url = "postgres://stockflow@localhost/stockflow"
            max_connections = 12

            [log]
            filter = "stockflow_infra=debug"
            json = false
            "#,
        )
        .unwrap();

        assert_eq!(config.backend, Backend::Postgres);
        assert_eq!(
            config.database.url.as_deref(),
            Some("postgres://stockflow@localhost/stockflow")
        );
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.log.format(), LogFormat::Pretty);
    }

    #[test]
    fn postgres_without_url_is_rejected() {
        let err = StockflowConfig::from_toml(r#"backend = "postgres""#).unwrap_err();
        assert!(err.to_string().contains("database.url"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(StockflowConfig::from_toml(r#"backend = "sqlite""#).is_err());
    }

    #[test]
    fn default_matches_empty_document() {
        let loaded = StockflowConfig::from_toml("").unwrap();
        let default = StockflowConfig::default();
        assert_eq!(loaded.backend, default.backend);
        assert_eq!(loaded.database.max_connections, default.database.max_connections);
        assert_eq!(loaded.log.filter, default.log.filter);
    }
}
