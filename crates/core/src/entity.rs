//! Entity trait: records that keep their identity while their fields change.

/// Products, locations and movements are entities: a movement amended from 4 to
/// 20 units is still the same movement.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
