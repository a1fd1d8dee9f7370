use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use chrono::Utc;

use stockflow_core::{DomainError, DomainResult, LocationId, MovementId, ProductId};
use stockflow_ledger::{BalanceSheet, Balances, Movement, MovementDraft, StockLine};

use super::r#trait::{LedgerStore, LedgerView, UnitOfWork};
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Default)]
struct LedgerState {
    products: BTreeSet<ProductId>,
    locations: BTreeSet<LocationId>,
    movements: BTreeMap<MovementId, Movement>,
    last_id: u64,
    /// Kept in step with `movements` on every write.
    sheet: BalanceSheet,
}

impl LedgerState {
    fn rename_product_in_place(&mut self, id: &ProductId, new_id: &ProductId) {
        self.products.remove(id);
        self.products.insert(new_id.clone());
        for m in self.movements.values_mut() {
            if &m.product_id == id {
                m.product_id = new_id.clone();
            }
        }
        self.sheet.rename_product(id, new_id);
    }

    fn rename_location_in_place(&mut self, id: &LocationId, new_id: &LocationId) {
        self.locations.remove(id);
        self.locations.insert(new_id.clone());
        for m in self.movements.values_mut() {
            for side in [&mut m.from_location, &mut m.to_location] {
                if matches!(&*side, Some(l) if l == id) {
                    *side = Some(new_id.clone());
                }
            }
        }
        self.sheet.rename_location(id, new_id);
    }

    /// Swap in `movement` for the record with the same id, keeping the sheet in step.
    fn replace_movement(&mut self, movement: Movement) -> Option<Movement> {
        let previous = self.movements.insert(movement.movement_id, movement.clone());
        if let Some(prev) = &previous {
            self.sheet.revert(prev);
        }
        self.sheet.apply(&movement);
        previous
    }
}

impl Balances for LedgerState {
    fn balance_of(&self, product: &ProductId, location: &LocationId) -> i64 {
        self.sheet.balance(product, location)
    }
}

impl LedgerView for LedgerState {
    fn products(&self) -> Vec<ProductId> {
        self.products.iter().cloned().collect()
    }

    fn locations(&self) -> Vec<LocationId> {
        self.locations.iter().cloned().collect()
    }

    fn contains_product(&self, id: &ProductId) -> bool {
        self.products.contains(id)
    }

    fn contains_location(&self, id: &LocationId) -> bool {
        self.locations.contains(id)
    }

    fn movement(&self, id: MovementId) -> DomainResult<Movement> {
        self.movements
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("movement", id.to_string()))
    }

    fn movements(&self) -> Vec<Movement> {
        let mut all: Vec<Movement> = self.movements.values().cloned().collect();
        all.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then(b.movement_id.cmp(&a.movement_id))
        });
        all
    }

    fn stock_report(&self) -> Vec<StockLine> {
        let locations = self.locations();
        self.sheet.positive_lines(&self.products, &locations)
    }
}

/// Inverse of one write, replayed newest-first on rollback.
#[derive(Debug)]
enum Undo {
    RegisterProduct(ProductId),
    RenameProduct { from: ProductId, to: ProductId },
    RegisterLocation(LocationId),
    RenameLocation { from: LocationId, to: LocationId },
    Append(MovementId),
    Update(Movement),
}

struct InMemoryUnitOfWork<'a> {
    state: &'a mut LedgerState,
    journal: Vec<Undo>,
}

impl InMemoryUnitOfWork<'_> {
    fn rollback(self) {
        let Self { state, journal } = self;
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::RegisterProduct(id) => {
                    state.products.remove(&id);
                }
                Undo::RenameProduct { from, to } => state.rename_product_in_place(&to, &from),
                Undo::RegisterLocation(id) => {
                    state.locations.remove(&id);
                }
                Undo::RenameLocation { from, to } => state.rename_location_in_place(&to, &from),
                Undo::Append(id) => {
                    if let Some(m) = state.movements.remove(&id) {
                        state.sheet.revert(&m);
                    }
                }
                Undo::Update(previous) => {
                    state.replace_movement(previous);
                }
            }
        }
    }
}

impl Balances for InMemoryUnitOfWork<'_> {
    fn balance_of(&self, product: &ProductId, location: &LocationId) -> i64 {
        self.state.balance_of(product, location)
    }
}

impl LedgerView for InMemoryUnitOfWork<'_> {
    fn products(&self) -> Vec<ProductId> {
        self.state.products()
    }

    fn locations(&self) -> Vec<LocationId> {
        self.state.locations()
    }

    fn contains_product(&self, id: &ProductId) -> bool {
        self.state.contains_product(id)
    }

    fn contains_location(&self, id: &LocationId) -> bool {
        self.state.contains_location(id)
    }

    fn movement(&self, id: MovementId) -> DomainResult<Movement> {
        self.state.movement(id)
    }

    fn movements(&self) -> Vec<Movement> {
        self.state.movements()
    }

    fn stock_report(&self) -> Vec<StockLine> {
        self.state.stock_report()
    }
}

impl UnitOfWork for InMemoryUnitOfWork<'_> {
    fn register_product(&mut self, id: ProductId) -> LedgerResult<()> {
        if self.state.products.contains(&id) {
            return Err(DomainError::conflict(format!("product '{id}' already exists")).into());
        }
        self.state.products.insert(id.clone());
        self.journal.push(Undo::RegisterProduct(id));
        Ok(())
    }

    fn rename_product(&mut self, id: &ProductId, new_id: ProductId) -> LedgerResult<()> {
        if !self.state.products.contains(id) {
            return Err(DomainError::not_found("product", id.as_str()).into());
        }
        if id == &new_id {
            return Ok(());
        }
        if self.state.products.contains(&new_id) {
            return Err(DomainError::conflict(format!("product '{new_id}' already exists")).into());
        }
        self.state.rename_product_in_place(id, &new_id);
        self.journal.push(Undo::RenameProduct {
            from: id.clone(),
            to: new_id,
        });
        Ok(())
    }

    fn register_location(&mut self, id: LocationId) -> LedgerResult<()> {
        if self.state.locations.contains(&id) {
            return Err(DomainError::conflict(format!("location '{id}' already exists")).into());
        }
        self.state.locations.insert(id.clone());
        self.journal.push(Undo::RegisterLocation(id));
        Ok(())
    }

    fn rename_location(&mut self, id: &LocationId, new_id: LocationId) -> LedgerResult<()> {
        if !self.state.locations.contains(id) {
            return Err(DomainError::not_found("location", id.as_str()).into());
        }
        if id == &new_id {
            return Ok(());
        }
        if self.state.locations.contains(&new_id) {
            return Err(DomainError::conflict(format!("location '{new_id}' already exists")).into());
        }
        self.state.rename_location_in_place(id, &new_id);
        self.journal.push(Undo::RenameLocation {
            from: id.clone(),
            to: new_id,
        });
        Ok(())
    }

    fn append(&mut self, draft: MovementDraft) -> LedgerResult<Movement> {
        draft.validate()?;
        self.check_references(&draft)?;

        let id = MovementId::new(self.state.last_id).next();
        self.state.last_id = id.get();

        let movement = Movement::from_draft(id, draft, Utc::now());
        self.state.replace_movement(movement.clone());
        self.journal.push(Undo::Append(id));
        Ok(movement)
    }

    fn update(&mut self, id: MovementId, draft: MovementDraft) -> LedgerResult<Movement> {
        let current = self.state.movement(id)?;
        draft.validate()?;
        self.check_references(&draft)?;

        let amended = current.amended(draft);
        if let Some(previous) = self.state.replace_movement(amended.clone()) {
            self.journal.push(Undo::Update(previous));
        }
        Ok(amended)
    }
}

/// In-memory ledger store.
///
/// The write lock is held for a whole unit of work, which makes "read balance,
/// validate, write" atomic. Reads share the lock and see a consistent state.
/// Balances come from a [`BalanceSheet`] maintained on every write, so reports
/// never rescan the ledger.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn read<R>(&self, query: impl FnOnce(&dyn LedgerView) -> R) -> LedgerResult<R> {
        let state = self
            .state
            .read()
            .map_err(|_| LedgerError::storage("ledger lock poisoned"))?;
        Ok(query(&*state))
    }

    fn transaction<R>(
        &self,
        work: impl FnOnce(&mut dyn UnitOfWork) -> LedgerResult<R>,
    ) -> LedgerResult<R> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerError::storage("ledger lock poisoned"))?;

        let mut uow = InMemoryUnitOfWork {
            state: &mut *state,
            journal: Vec::new(),
        };
        match work(&mut uow) {
            Ok(value) => Ok(value),
            Err(err) => {
                uow.rollback();
                Err(err)
            }
        }
    }
}
