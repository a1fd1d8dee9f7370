//! Stock balances derived from the movement ledger.
//!
//! `balance(p, l)` is incoming minus outgoing quantity of `p` at `l`. The
//! [`BalanceSheet`] holds every non-zero balance keyed by `(product, location)`,
//! built in a single pass and kept current with [`BalanceSheet::apply`] /
//! [`BalanceSheet::revert`] as the ledger changes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stockflow_core::{LocationId, ProductId};

use crate::movement::Movement;

/// Net stock of `product` at `location` over the given movements.
///
/// Recomputes from scratch; an empty ledger yields 0.
pub fn balance<'a>(
    movements: impl IntoIterator<Item = &'a Movement>,
    product: &ProductId,
    location: &LocationId,
) -> i64 {
    movements
        .into_iter()
        .map(|m| m.effect_on(product, location))
        .sum()
}

/// Source of current balances (an index or the raw ledger).
pub trait Balances {
    fn balance_of(&self, product: &ProductId, location: &LocationId) -> i64;
}

impl Balances for Vec<Movement> {
    fn balance_of(&self, product: &ProductId, location: &LocationId) -> i64 {
        balance(self, product, location)
    }
}

/// One row of the stock report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub balance: i64,
}

/// Running balance per `(product, location)`.
///
/// Zero balances are not stored, so two sheets describing the same stock
/// compare equal regardless of how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSheet {
    totals: HashMap<(ProductId, LocationId), i64>,
}

impl BalanceSheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sheet in one pass over the ledger.
    pub fn from_movements<'a>(movements: impl IntoIterator<Item = &'a Movement>) -> Self {
        let mut sheet = Self::new();
        for m in movements {
            sheet.apply(m);
        }
        sheet
    }

    /// Account for a movement that was added to the ledger.
    pub fn apply(&mut self, movement: &Movement) {
        for (location, delta) in movement.effects() {
            self.adjust(&movement.product_id, location, delta);
        }
    }

    /// Remove a movement's contribution (it was amended or is being replaced).
    pub fn revert(&mut self, movement: &Movement) {
        for (location, delta) in movement.effects() {
            self.adjust(&movement.product_id, location, -delta);
        }
    }

    pub fn balance(&self, product: &ProductId, location: &LocationId) -> i64 {
        self.totals
            .get(&(product.clone(), location.clone()))
            .copied()
            .unwrap_or(0)
    }

    /// Number of non-zero `(product, location)` balances.
    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Move every balance of `from` onto `to`.
    pub fn rename_product(&mut self, from: &ProductId, to: &ProductId) {
        let moved: Vec<_> = self
            .totals
            .keys()
            .filter(|(p, _)| p == from)
            .cloned()
            .collect();
        for key in moved {
            if let Some(qty) = self.totals.remove(&key) {
                self.adjust(to, &key.1, qty);
            }
        }
    }

    /// Move every balance held at `from` onto `to`.
    pub fn rename_location(&mut self, from: &LocationId, to: &LocationId) {
        let moved: Vec<_> = self
            .totals
            .keys()
            .filter(|(_, l)| l == from)
            .cloned()
            .collect();
        for key in moved {
            if let Some(qty) = self.totals.remove(&key) {
                self.adjust(&key.0, to, qty);
            }
        }
    }

    /// Positive balances over `products × locations`, products outer and
    /// locations inner, each in the order given.
    pub fn positive_lines<'a>(
        &self,
        products: impl IntoIterator<Item = &'a ProductId>,
        locations: &[LocationId],
    ) -> Vec<StockLine> {
        let mut lines = Vec::new();
        for product in products {
            for location in locations {
                let qty = self.balance(product, location);
                if qty > 0 {
                    lines.push(StockLine {
                        product_id: product.clone(),
                        location_id: location.clone(),
                        balance: qty,
                    });
                }
            }
        }
        lines
    }

    fn adjust(&mut self, product: &ProductId, location: &LocationId, delta: i64) {
        if delta == 0 {
            return;
        }
        let key = (product.clone(), location.clone());
        let total = self.totals.get(&key).copied().unwrap_or(0) + delta;
        if total == 0 {
            self.totals.remove(&key);
        } else {
            self.totals.insert(key, total);
        }
    }
}

impl Balances for BalanceSheet {
    fn balance_of(&self, product: &ProductId, location: &LocationId) -> i64 {
        self.balance(product, location)
    }
}
