//! Value object trait: equality by value, not identity.

/// Marker trait for immutable domain values compared by their attributes.
///
/// Examples in this codebase: a product's stock buckets, the bucket deltas
/// of an adjustment. Two values with the same attributes are the same value;
/// "modifying" one means constructing a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
