//! Value object marker trait.

/// Marker for immutable value objects compared by value, not identity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
