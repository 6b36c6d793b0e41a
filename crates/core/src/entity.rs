//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Entities that are not aggregate roots (the cart, for instance, which is
/// mutated in place rather than event-sourced) still expose a typed identity.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
