//! Movements: ledger entries moving a quantity of one product between locations.
//!
//! A missing source is stock entering the system (a receipt); a missing
//! destination is stock leaving it (an issue).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, Entity, LocationId, MovementId, ProductId, ValueObject};

/// Number of units moved. Always positive.
///
/// Bounded by `i32::MAX` so ledger sums stay exact in `i64` and quantities fit an
/// SQL `INTEGER` column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Quantity(i64);

impl Quantity {
    pub const MAX: i64 = i32::MAX as i64;

    pub fn new(raw: i64) -> DomainResult<Self> {
        if raw <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be at least 1 (got {raw})"
            )));
        }
        if raw > Self::MAX {
            return Err(DomainError::validation(format!(
                "quantity must be at most {} (got {raw})",
                Self::MAX
            )));
        }
        Ok(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl ValueObject for Quantity {}

impl TryFrom<i64> for Quantity {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for i64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What a movement means for the tracked system boundary.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Stock enters from outside (purchase, production).
    Receipt,
    /// Stock leaves the system (sale, consumption).
    Issue,
    /// Stock moves between two tracked locations.
    Transfer,
}

/// A movement as requested by a caller, before the ledger assigns identity.
///
/// Used both for recording a new movement and for amending an existing one.
/// When amending, `occurred_at` is ignored: a movement keeps its original
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementDraft {
    pub product_id: ProductId,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub qty: Quantity,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl MovementDraft {
    pub fn new(
        product_id: ProductId,
        from_location: Option<LocationId>,
        to_location: Option<LocationId>,
        qty: Quantity,
    ) -> Self {
        Self {
            product_id,
            from_location,
            to_location,
            qty,
            occurred_at: None,
        }
    }

    /// Build a draft from raw form input.
    ///
    /// Blank location strings mean "outside the system", the way a form with an
    /// empty select option submits them.
    pub fn parse(
        product_id: &str,
        from_location: Option<&str>,
        to_location: Option<&str>,
        qty: i64,
    ) -> DomainResult<Self> {
        let draft = Self::new(
            ProductId::parse(product_id)?,
            optional_location(from_location)?,
            optional_location(to_location)?,
            Quantity::new(qty)?,
        );
        draft.validate()?;
        Ok(draft)
    }

    /// Pin the movement to an explicit point in time.
    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = Some(occurred_at);
        self
    }

    /// Shape checks that do not need the ledger.
    pub fn validate(&self) -> DomainResult<()> {
        match (&self.from_location, &self.to_location) {
            (None, None) => Err(DomainError::validation(
                "a movement needs a source or a destination location",
            )),
            (Some(from), Some(to)) if from == to => Err(DomainError::validation(format!(
                "source and destination are both '{from}'"
            ))),
            _ => Ok(()),
        }
    }

    pub fn kind(&self) -> MovementKind {
        kind_of(&self.from_location, &self.to_location)
    }
}

fn optional_location(raw: Option<&str>) -> DomainResult<Option<LocationId>> {
    match raw {
        Some(s) if !s.trim().is_empty() => LocationId::parse(s).map(Some),
        _ => Ok(None),
    }
}

fn kind_of(from: &Option<LocationId>, to: &Option<LocationId>) -> MovementKind {
    match (from, to) {
        (None, _) => MovementKind::Receipt,
        (Some(_), None) => MovementKind::Issue,
        (Some(_), Some(_)) => MovementKind::Transfer,
    }
}

/// A ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub movement_id: MovementId,
    pub timestamp: DateTime<Utc>,
    pub product_id: ProductId,
    pub from_location: Option<LocationId>,
    pub to_location: Option<LocationId>,
    pub qty: Quantity,
}

impl Movement {
    /// Materialize a draft; `now` is used when the draft carries no timestamp.
    pub fn from_draft(movement_id: MovementId, draft: MovementDraft, now: DateTime<Utc>) -> Self {
        Self {
            movement_id,
            timestamp: draft.occurred_at.unwrap_or(now),
            product_id: draft.product_id,
            from_location: draft.from_location,
            to_location: draft.to_location,
            qty: draft.qty,
        }
    }

    /// Same movement (id and timestamp) carrying the draft's mutable fields.
    pub fn amended(&self, draft: MovementDraft) -> Self {
        Self {
            movement_id: self.movement_id,
            timestamp: self.timestamp,
            product_id: draft.product_id,
            from_location: draft.from_location,
            to_location: draft.to_location,
            qty: draft.qty,
        }
    }

    /// Draft with this movement's mutable fields.
    pub fn to_draft(&self) -> MovementDraft {
        MovementDraft {
            product_id: self.product_id.clone(),
            from_location: self.from_location.clone(),
            to_location: self.to_location.clone(),
            qty: self.qty,
            occurred_at: Some(self.timestamp),
        }
    }

    pub fn kind(&self) -> MovementKind {
        kind_of(&self.from_location, &self.to_location)
    }

    /// Signed change this movement makes to `(product, location)`.
    pub fn effect_on(&self, product: &ProductId, location: &LocationId) -> i64 {
        if &self.product_id != product {
            return 0;
        }
        let mut net = 0;
        if self.to_location.as_ref() == Some(location) {
            net += self.qty.get();
        }
        if self.from_location.as_ref() == Some(location) {
            net -= self.qty.get();
        }
        net
    }

    /// Every `(location, delta)` this movement contributes, source first.
    pub fn effects(&self) -> impl Iterator<Item = (&LocationId, i64)> {
        let qty = self.qty.get();
        self.from_location
            .iter()
            .map(move |l| (l, -qty))
            .chain(self.to_location.iter().map(move |l| (l, qty)))
    }
}

impl Entity for Movement {
    type Id = MovementId;

    fn id(&self) -> &Self::Id {
        &self.movement_id
    }
}
