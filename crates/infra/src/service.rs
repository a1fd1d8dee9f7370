//! Stock service: the API the presentation layer calls.
//!
//! Every write is one unit of work on the store:
//!
//! ```text
//! request
//!   ↓
//! 1. Shape checks (draft.validate)
//!   ↓
//! 2. Reference checks (product/locations registered)
//!   ↓
//! 3. Stock check (MovementValidator against current balances)
//!   ↓
//! 4. Append / update
//! ```
//!
//! Steps 2–4 run under the same unit of work, so the balance the validator saw
//! is still the balance when the write lands. Any failure leaves the ledger
//! untouched.

use tracing::{info, instrument};

use stockflow_core::{LocationId, MovementId, ProductId};
use stockflow_ledger::{Location, Movement, MovementDraft, MovementValidator, Product, StockLine};

use crate::error::{LedgerResult, log_write_failure};
use crate::store::LedgerStore;

#[derive(Debug)]
pub struct StockService<S> {
    store: S,
}

impl<S> StockService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> StockService<S>
where
    S: LedgerStore,
{
    #[instrument(skip_all, fields(product = %id), err)]
    pub fn register_product(&self, id: ProductId) -> LedgerResult<Product> {
        self.store
            .transaction(|uow| uow.register_product(id.clone()))?;
        info!("product registered");
        Ok(Product::new(id))
    }

    /// Rename a product; history and balances follow the new id.
    #[instrument(skip_all, fields(product = %id, new_id = %new_id), err)]
    pub fn rename_product(&self, id: &ProductId, new_id: ProductId) -> LedgerResult<Product> {
        self.store
            .transaction(|uow| uow.rename_product(id, new_id.clone()))?;
        info!("product renamed");
        Ok(Product::new(new_id))
    }

    #[instrument(skip_all, fields(location = %id), err)]
    pub fn register_location(&self, id: LocationId) -> LedgerResult<Location> {
        self.store
            .transaction(|uow| uow.register_location(id.clone()))?;
        info!("location registered");
        Ok(Location::new(id))
    }

    #[instrument(skip_all, fields(location = %id, new_id = %new_id), err)]
    pub fn rename_location(&self, id: &LocationId, new_id: LocationId) -> LedgerResult<Location> {
        self.store
            .transaction(|uow| uow.rename_location(id, new_id.clone()))?;
        info!("location renamed");
        Ok(Location::new(new_id))
    }

    pub fn products(&self) -> LedgerResult<Vec<ProductId>> {
        self.store.read(|view| view.products())
    }

    pub fn locations(&self) -> LedgerResult<Vec<LocationId>> {
        self.store.read(|view| view.locations())
    }

    /// Record a movement if the source location can cover it.
    ///
    /// Fails with `Validation`, `Referential` or `InsufficientStock`; on failure
    /// the ledger is unchanged.
    #[instrument(
        skip_all,
        fields(
            product = %draft.product_id,
            from = ?draft.from_location,
            to = ?draft.to_location,
            qty = draft.qty.get()
        )
    )]
    pub fn record_movement(&self, draft: MovementDraft) -> LedgerResult<Movement> {
        let movement = self
            .store
            .transaction(|uow| {
                draft.validate()?;
                uow.check_references(&draft)?;
                MovementValidator::check_record(&*uow, &draft)?;
                uow.append(draft)
            })
            .inspect_err(log_write_failure)?;

        info!(movement_id = %movement.movement_id, "movement recorded");
        Ok(movement)
    }

    /// Replace product, locations and quantity of an existing movement.
    ///
    /// The amended ledger is checked as a whole: every balance the change lowers
    /// must still cover it. Fails with `NotFound`, `Validation`, `Referential`
    /// or `InsufficientStock`; on failure the movement is unchanged.
    #[instrument(
        skip_all,
        fields(movement_id = %id, product = %draft.product_id, qty = draft.qty.get())
    )]
    pub fn amend_movement(&self, id: MovementId, draft: MovementDraft) -> LedgerResult<Movement> {
        let movement = self
            .store
            .transaction(|uow| {
                let current = uow.movement(id)?;
                draft.validate()?;
                uow.check_references(&draft)?;
                MovementValidator::check_amend(&*uow, &current, &draft)?;
                uow.update(id, draft)
            })
            .inspect_err(log_write_failure)?;

        info!("movement amended");
        Ok(movement)
    }

    pub fn movement(&self, id: MovementId) -> LedgerResult<Movement> {
        Ok(self.store.read(|view| view.movement(id))??)
    }

    /// Every movement, newest first.
    pub fn movement_history(&self) -> LedgerResult<Vec<Movement>> {
        self.store.read(|view| view.movements())
    }

    pub fn balance(&self, product: &ProductId, location: &LocationId) -> LedgerResult<i64> {
        self.store.read(|view| view.balance_of(product, location))
    }

    /// Positive balances, grouped by product then location.
    pub fn stock_report(&self) -> LedgerResult<Vec<StockLine>> {
        self.store.read(|view| view.stock_report())
    }
}
