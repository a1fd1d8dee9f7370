//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// references, stock invariants). Storage failures belong to the infra layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation (empty id, non-positive quantity, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier did not resolve to a stored record.
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// A movement referenced a product or location that is not registered.
    #[error("unknown reference: {0}")]
    Referential(String),

    /// Accepting the movement would drive a balance below zero.
    ///
    /// `available` is the balance before the movement; `requested` is how much
    /// the movement would take out of it.
    #[error(
        "insufficient stock of '{product}' at '{location}': {available} available, {requested} requested"
    )]
    InsufficientStock {
        product: String,
        location: String,
        available: i64,
        requested: i64,
    },

    /// An identifier is already taken.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn referential(msg: impl Into<String>) -> Self {
        Self::Referential(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(
        product: impl Into<String>,
        location: impl Into<String>,
        available: i64,
        requested: i64,
    ) -> Self {
        Self::InsufficientStock {
            product: product.into(),
            location: location.into(),
            available,
            requested,
        }
    }

    /// `(available, requested)` for stock rejections.
    pub fn shortfall(&self) -> Option<(i64, i64)> {
        match self {
            Self::InsufficientStock {
                available,
                requested,
                ..
            } => Some((*available, *requested)),
            _ => None,
        }
    }
}
