//! Errors crossing the store/service boundary.

use thiserror::Error;
use tracing::{error, warn};

use stockflow_core::DomainError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger operation error.
///
/// - **Domain**: deterministic rejections (validation, unknown ids, stock
///   shortfall, id conflicts). Retrying the same request fails the same way.
/// - **Storage**: the backend failed (connection lost, lock poisoned, corrupt
///   row). Propagated unchanged; nothing is retried here.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            Self::Domain(e) => Some(e),
            Self::Storage(_) => None,
        }
    }

    /// `(available, requested)` when the error is a stock rejection.
    pub fn shortfall(&self) -> Option<(i64, i64)> {
        self.as_domain().and_then(DomainError::shortfall)
    }
}

/// Log a failed movement write once, at a level matching its cause.
///
/// Stock rejections are routine and go out at WARN with the shortfall; other
/// domain rejections at WARN with the message; storage failures at ERROR.
pub(crate) fn log_write_failure(err: &LedgerError) {
    match err {
        LedgerError::Domain(DomainError::InsufficientStock {
            product,
            location,
            available,
            requested,
        }) => {
            warn!(%product, %location, available, requested, "movement rejected: insufficient stock");
        }
        LedgerError::Domain(e) => warn!(error = %e, "movement rejected"),
        LedgerError::Storage(msg) => error!(error = %msg, "movement write failed"),
    }
}
