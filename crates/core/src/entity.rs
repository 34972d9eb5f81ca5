//! Entities: values with identity that live inside an aggregate.

/// Something an aggregate owns and addresses by id.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}

/// Position of the entity with `id` in an aggregate's collection.
pub fn position_of<E: Entity>(items: &[E], id: E::Id) -> Option<usize> {
    items.iter().position(|e| e.id() == id)
}
