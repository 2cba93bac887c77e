//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Resources, custody records and users are entities: two values with the same
/// id are the same thing at different points in time.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
