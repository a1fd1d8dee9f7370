//! Wiring from configuration to a ready ledger backend.

use ::config::ConfigError;
use thiserror::Error;
use tracing::info;

use crate::config::{Backend, StockflowConfig};
use crate::error::LedgerError;
use crate::service::StockService;
use crate::store::{InMemoryLedgerStore, PostgresLedgerStore};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// The ledger the process runs against.
#[derive(Debug)]
pub enum LedgerBackend {
    InMemory(StockService<InMemoryLedgerStore>),
    Postgres(PostgresLedgerStore),
}

impl LedgerBackend {
    pub fn backend(&self) -> Backend {
        match self {
            Self::InMemory(_) => Backend::Memory,
            Self::Postgres(_) => Backend::Postgres,
        }
    }
}

/// A fresh, empty in-memory ledger.
pub fn in_memory() -> StockService<InMemoryLedgerStore> {
    StockService::new(InMemoryLedgerStore::new())
}

/// Install the global subscriber as configured.
pub fn init_observability(config: &StockflowConfig) {
    stockflow_observability::tracing::init_with(&config.log.filter, config.log.format());
}

/// Build the configured backend. For Postgres this connects and creates the
/// schema if it is missing.
pub async fn build(config: &StockflowConfig) -> Result<LedgerBackend, BootstrapError> {
    config.validate()?;

    match config.backend {
        Backend::Memory => {
            info!("using in-memory ledger");
            Ok(LedgerBackend::InMemory(in_memory()))
        }
        Backend::Postgres => {
            let url = config.database.url.as_deref().ok_or_else(|| {
                ConfigError::Message("database.url is required for the postgres backend".into())
            })?;
            let store = PostgresLedgerStore::connect(url, config.database.max_connections).await?;
            store.ensure_schema().await?;
            info!(max_connections = config.database.max_connections, "using postgres ledger");
            Ok(LedgerBackend::Postgres(store))
        }
    }
}
