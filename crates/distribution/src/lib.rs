//! Distribution workflow module (event-sourced).
//!
//! This crate contains the storage-to-cashier hand-off workflow, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod distribution;

pub use distribution::{
    AdvanceDistribution, CancelDistribution, CreateDistribution, DistributionAdvanced,
    DistributionCancelled, DistributionCommand, DistributionCreated, DistributionEvent,
    DistributionId, DistributionStatus, ProductDistribution,
};
