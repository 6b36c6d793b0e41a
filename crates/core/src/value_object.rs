//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two cart lines
/// with the same product, price, and quantity are the same line. To "modify"
/// one, build a new one. Entities, by contrast, are the same object whenever
/// their IDs match, regardless of attribute drift.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq, Eq)]
/// struct OrderLine {
///     product_name: String,
///     quantity: u32,
///     unit_price_cents: u64,
/// }
///
/// impl ValueObject for OrderLine {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
