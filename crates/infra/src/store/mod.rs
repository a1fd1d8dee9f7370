//! Ledger storage boundary.
//!
//! Products, locations and the movement ledger live behind [`LedgerStore`].
//! The in-memory store implements it directly; the Postgres store exposes the
//! same operations as async methods and gets its isolation from the database.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryLedgerStore;
pub use postgres::PostgresLedgerStore;
pub use r#trait::{LedgerStore, LedgerView, UnitOfWork};
