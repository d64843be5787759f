use chrono::{DateTime, Utc};

/// A committed domain fact.
///
/// Stock movements, product registrations and distribution transitions
/// all implement this. Events are immutable once appended, carry a
/// schema version for evolution, and record business time separately
/// from commit order.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable name used for routing and storage
    /// (e.g. "catalog.product.stock_adjusted", "distribution.cancelled").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time, not commit time).
    fn occurred_at(&self) -> DateTime<Utc>;
}
