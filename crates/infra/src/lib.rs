//! Infrastructure layer: ledger stores, the stock service, configuration and
//! process bootstrap.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod service;
pub mod store;

mod integration_tests;

pub use bootstrap::{BootstrapError, LedgerBackend};
pub use config::{Backend, StockflowConfig};
pub use error::{LedgerError, LedgerResult};
pub use service::StockService;
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerView, PostgresLedgerStore, UnitOfWork};
