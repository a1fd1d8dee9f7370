//! Products and locations: identity only, no other attributes.

use serde::{Deserialize, Serialize};

use stockflow_core::{Entity, LocationId, ProductId};

/// A registered product.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
}

impl Product {
    pub fn new(id: ProductId) -> Self {
        Self { id }
    }

    pub fn into_id(self) -> ProductId {
        self.id
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A registered stock location (warehouse, shelf, store...).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    id: LocationId,
}

impl Location {
    pub fn new(id: LocationId) -> Self {
        Self { id }
    }

    pub fn into_id(self) -> LocationId {
        self.id
    }
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
