//! Catalog domain module (event-sourced).
//!
//! This crate contains the product catalog and its stock ledger, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage). The
//! transition table lives in [`adjustment`] as pure functions.

pub mod adjustment;
pub mod product;

pub use adjustment::{
    bucket_deltas, condition_allowed, legal_route, AdjustmentType, BucketDeltas, StockCondition,
    StockLocation,
};
pub use product::{
    DistributionReversed, Product, ProductCommand, ProductEvent, ProductId, ProductRegistered,
    RecordAdjustment, RegisterProduct, ReverseDistribution, StockAdjusted, StockBuckets,
};
