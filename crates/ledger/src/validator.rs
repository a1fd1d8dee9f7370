//! Non-negative stock check for recorded and amended movements.
//!
//! Both cases are handled as "revert the movement being replaced (if any), apply
//! the proposed one". Every `(product, location)` balance that this lowers
//! becomes a [`Withdrawal`], which must be covered by the balance currently on
//! hand. Balances that rise or stay flat are never checked, so an external
//! receipt always passes.
//!
//! The validator keeps no state. Callers run it inside the same unit of work
//! that writes the movement; otherwise two writers can both pass and overdraw.

use stockflow_core::{DomainError, DomainResult, LocationId, ProductId};

use crate::balance::Balances;
use crate::movement::{Movement, MovementDraft};

/// A balance the proposed change would lower by `quantity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub product_id: ProductId,
    pub location_id: LocationId,
    pub quantity: i64,
}

impl Withdrawal {
    /// Fail unless `available` (the balance before the change) covers it.
    pub fn check(&self, available: i64) -> DomainResult<()> {
        if available < self.quantity {
            return Err(DomainError::insufficient_stock(
                self.product_id.as_str(),
                self.location_id.as_str(),
                available,
                self.quantity,
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Copy, Clone, Default)]
pub struct MovementValidator;

impl MovementValidator {
    /// Balances lowered by replacing `current` with `proposed`.
    ///
    /// For a new movement pass `current = None`. The proposed source side comes
    /// first, so a plain transfer reports its source location.
    pub fn withdrawals(current: Option<&Movement>, proposed: &MovementDraft) -> Vec<Withdrawal> {
        let mut net: Vec<((ProductId, LocationId), i64)> = Vec::with_capacity(4);
        let mut add = |product: &ProductId, location: &LocationId, delta: i64| {
            match net
                .iter_mut()
                .find(|((p, l), _)| p == product && l == location)
            {
                Some((_, total)) => *total += delta,
                None => net.push(((product.clone(), location.clone()), delta)),
            }
        };

        let qty = proposed.qty.get();
        if let Some(from) = &proposed.from_location {
            add(&proposed.product_id, from, -qty);
        }
        if let Some(to) = &proposed.to_location {
            add(&proposed.product_id, to, qty);
        }
        if let Some(old) = current {
            for (location, delta) in old.effects() {
                add(&old.product_id, location, -delta);
            }
        }

        net.into_iter()
            .filter(|(_, delta)| *delta < 0)
            .map(|((product_id, location_id), delta)| Withdrawal {
                product_id,
                location_id,
                quantity: -delta,
            })
            .collect()
    }

    /// Check a new movement against current balances.
    pub fn check_record<B>(balances: &B, draft: &MovementDraft) -> DomainResult<()>
    where
        B: Balances + ?Sized,
    {
        draft.validate()?;
        Self::check_withdrawals(balances, &Self::withdrawals(None, draft))
    }

    /// Check replacing `current` with `draft`.
    ///
    /// `balances` must still include `current`'s contribution.
    pub fn check_amend<B>(balances: &B, current: &Movement, draft: &MovementDraft) -> DomainResult<()>
    where
        B: Balances + ?Sized,
    {
        draft.validate()?;
        Self::check_withdrawals(balances, &Self::withdrawals(Some(current), draft))
    }

    fn check_withdrawals<B>(balances: &B, withdrawals: &[Withdrawal]) -> DomainResult<()>
    where
        B: Balances + ?Sized,
    {
        for w in withdrawals {
            w.check(balances.balance_of(&w.product_id, &w.location_id))?;
        }
        Ok(())
    }
}
