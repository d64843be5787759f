//! Projection implementations (read model builders).
//!
//! Projections consume domain events and build query-optimized read models.
//! All projections are:
//! - **Rebuildable**: Can be reconstructed from the event stream
//! - **Idempotent**: Safe for at-least-once delivery

pub mod distributions;
pub mod product_stock;
pub mod stock_history;

pub use distributions::{DistributionView, DistributionsProjection, DistributionsProjectionError};
pub use product_stock::{ProductStockProjection, ProductStockProjectionError, ProductView};
pub use stock_history::{AdjustmentRecord, StockHistoryProjection, StockHistoryProjectionError};
