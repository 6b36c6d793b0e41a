use chrono::{DateTime, Utc};

/// A fact recorded on an aggregate stream.
///
/// Every state change in the shop is one of these: a stock movement, a
/// price change, a captured payment. Events never change once appended;
/// a new payload shape gets a new schema `version` and the old shape
/// keeps replaying.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable dotted name, `<context>.<aggregate>.<what happened>`
    /// (e.g. `"inventory.stock.movement_recorded"`,
    /// `"orders.claim.captured"`). Audit filters and projection routing
    /// match on this string, so it never changes for a shipped event.
    fn event_type(&self) -> &'static str;

    /// Schema version of the serialized payload, starting at 1.
    fn version(&self) -> u32;

    /// Business time: when it happened, not when it was stored.
    fn occurred_at(&self) -> DateTime<Utc>;
}
