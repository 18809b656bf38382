//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value** - they have no
/// identity of their own. [`crate::Money`] is the canonical example here: two
/// amounts of `2.50` are the same value wherever they appear. To "modify" a
/// value object, create a new one.
///
/// The trait requires `Clone + PartialEq + Debug` so values can be copied
/// around, compared in invariant checks, and show up usefully in logs and
/// test failures.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
