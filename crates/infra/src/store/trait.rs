use std::sync::Arc;

use stockflow_core::{DomainError, DomainResult, LocationId, MovementId, ProductId};
use stockflow_ledger::{Balances, Movement, MovementDraft, StockLine};

use crate::error::LedgerResult;

/// Read access to a consistent state of the ledger.
///
/// Implementations hand this out for the duration of one read or one unit of
/// work; everything observed through it belongs to the same snapshot.
pub trait LedgerView: Balances {
    /// Registered products, ascending.
    fn products(&self) -> Vec<ProductId>;

    /// Registered locations, ascending.
    fn locations(&self) -> Vec<LocationId>;

    fn contains_product(&self, id: &ProductId) -> bool;

    fn contains_location(&self, id: &LocationId) -> bool;

    fn movement(&self, id: MovementId) -> DomainResult<Movement>;

    /// Every movement, newest first (timestamp desc, then id desc).
    fn movements(&self) -> Vec<Movement>;

    /// Positive balances over products × locations, product-major.
    fn stock_report(&self) -> Vec<StockLine>;

    /// Fail with `Referential` unless the draft only names registered records.
    fn check_references(&self, draft: &MovementDraft) -> DomainResult<()> {
        if !self.contains_product(&draft.product_id) {
            return Err(DomainError::referential(format!(
                "product '{}' is not registered",
                draft.product_id
            )));
        }
        for location in draft.from_location.iter().chain(draft.to_location.iter()) {
            if !self.contains_location(location) {
                return Err(DomainError::referential(format!(
                    "location '{location}' is not registered"
                )));
            }
        }
        Ok(())
    }
}

/// Explicit unit of work: the only way to change the ledger.
///
/// Everything done through one unit of work (reading balances, validating,
/// writing) is isolated from other writers. If the closure passed to
/// [`LedgerStore::transaction`] returns an error, all of its writes are
/// discarded.
pub trait UnitOfWork: LedgerView {
    /// `Conflict` if the id is taken.
    fn register_product(&mut self, id: ProductId) -> LedgerResult<()>;

    /// Rename, cascading to every movement that references `id`.
    ///
    /// `NotFound` for an unknown `id`, `Conflict` if `new_id` is taken.
    fn rename_product(&mut self, id: &ProductId, new_id: ProductId) -> LedgerResult<()>;

    fn register_location(&mut self, id: LocationId) -> LedgerResult<()>;

    fn rename_location(&mut self, id: &LocationId, new_id: LocationId) -> LedgerResult<()>;

    /// Store a new movement under a fresh id, stamped with the commit time
    /// unless the draft carries its own.
    ///
    /// `Referential` if the draft names unknown records. No stock check happens
    /// here; that is the caller's decision.
    fn append(&mut self, draft: MovementDraft) -> LedgerResult<Movement>;

    /// Replace product, locations and quantity of an existing movement. Id and
    /// timestamp are kept.
    fn update(&mut self, id: MovementId, draft: MovementDraft) -> LedgerResult<Movement>;
}

/// Storage for products, locations and the movement ledger.
///
/// ## Read semantics
///
/// `read()` runs a query against a consistent snapshot. Reads may run
/// concurrently with each other and always start fresh (no cursor state).
///
/// ## Write semantics
///
/// `transaction()` hands out a [`UnitOfWork`]. Implementations must:
/// - serialize units of work that could touch the same balances, so that a
///   balance read inside one is still true when its write commits
/// - apply all writes of a unit of work or none of them
/// - assign movement ids monotonically, never reusing one
pub trait LedgerStore: Send + Sync {
    fn read<R>(&self, query: impl FnOnce(&dyn LedgerView) -> R) -> LedgerResult<R>;

    fn transaction<R>(
        &self,
        work: impl FnOnce(&mut dyn UnitOfWork) -> LedgerResult<R>,
    ) -> LedgerResult<R>;
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn read<R>(&self, query: impl FnOnce(&dyn LedgerView) -> R) -> LedgerResult<R> {
        (**self).read(query)
    }

    fn transaction<R>(
        &self,
        work: impl FnOnce(&mut dyn UnitOfWork) -> LedgerResult<R>,
    ) -> LedgerResult<R> {
        (**self).transaction(work)
    }
}
