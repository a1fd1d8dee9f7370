//! Stock ledger domain module.
//!
//! Business rules for movements between locations, implemented purely as
//! deterministic domain logic (no IO, no storage). Balances are derived from the
//! movement ledger; the validator decides whether a movement may be accepted.

pub mod balance;
pub mod catalog;
pub mod movement;
pub mod validator;

pub use balance::{balance, BalanceSheet, Balances, StockLine};
pub use catalog::{Location, Product};
pub use movement::{Movement, MovementDraft, MovementKind, Quantity};
pub use validator::{MovementValidator, Withdrawal};
