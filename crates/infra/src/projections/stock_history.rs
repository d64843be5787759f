use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use tokopos_catalog::{AdjustmentType, ProductEvent, ProductId, StockCondition, StockLocation};
use tokopos_core::{AggregateId, UserId};
use tokopos_events::EventEnvelope;

use crate::read_model::ReadStore;

/// One row in the adjustment ledger.
///
/// Cancellation reversals appear here too, flagged with `reversal: true`, so
/// the ledger always explains how the buckets reached their current values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustmentRecord {
    pub adjustment_id: Uuid,
    pub product_id: ProductId,
    pub adjustment_type: AdjustmentType,
    pub quantity: i64,
    pub condition: StockCondition,
    pub source_location: StockLocation,
    pub target_location: StockLocation,
    pub notes: Option<String>,
    pub performed_by: UserId,
    pub reversal: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum StockHistoryProjectionError {
    #[error("failed to deserialize product event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Stock adjustment history projection (the append-only ledger view).
#[derive(Debug)]
pub struct StockHistoryProjection<S>
where
    S: ReadStore<Uuid, AdjustmentRecord>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> StockHistoryProjection<S>
where
    S: ReadStore<Uuid, AdjustmentRecord>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// List adjustments newest first, optionally narrowed to one product
    /// and/or one adjustment type.
    pub fn list(
        &self,
        product_id: Option<ProductId>,
        adjustment_type: Option<AdjustmentType>,
    ) -> Vec<AdjustmentRecord> {
        let mut records: Vec<AdjustmentRecord> = self
            .store
            .list()
            .into_iter()
            .filter(|r| product_id.is_none_or(|id| r.product_id == id))
            .filter(|r| adjustment_type.is_none_or(|ty| r.adjustment_type == ty))
            .collect();

        records.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.adjustment_id.cmp(&a.adjustment_id))
        });
        records
    }

    pub fn list_for_product(
        &self,
        product_id: ProductId,
        adjustment_type: Option<AdjustmentType>,
    ) -> Vec<AdjustmentRecord> {
        self.list(Some(product_id), adjustment_type)
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces monotonic sequence per aggregate stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockHistoryProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(StockHistoryProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(StockHistoryProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| StockHistoryProjectionError::Deserialize(e.to_string()))?;

            let product_id = match &event {
                ProductEvent::ProductRegistered(e) => e.product_id,
                ProductEvent::StockAdjusted(e) => e.product_id,
                ProductEvent::DistributionReversed(e) => e.product_id,
            };
            if product_id.0 != aggregate_id {
                return Err(StockHistoryProjectionError::StreamMismatch(
                    "event product_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match event {
                ProductEvent::ProductRegistered(_) => {}
                ProductEvent::StockAdjusted(e) => {
                    self.store.upsert(
                        e.adjustment_id,
                        AdjustmentRecord {
                            adjustment_id: e.adjustment_id,
                            product_id: e.product_id,
                            adjustment_type: e.adjustment_type,
                            quantity: e.quantity,
                            condition: e.condition,
                            source_location: e.source_location,
                            target_location: e.target_location,
                            notes: e.notes,
                            performed_by: e.performed_by,
                            reversal: false,
                            occurred_at: e.occurred_at,
                        },
                    );
                }
                ProductEvent::DistributionReversed(e) => {
                    // The ledger entry for a cancellation: distribution stock
                    // moving back into storage.
                    self.store.upsert(
                        envelope.event_id(),
                        AdjustmentRecord {
                            adjustment_id: envelope.event_id(),
                            product_id: e.product_id,
                            adjustment_type: AdjustmentType::Distribution,
                            quantity: e.quantity,
                            condition: StockCondition::Good,
                            source_location: StockLocation::Cashier,
                            target_location: StockLocation::Storage,
                            notes: None,
                            performed_by: e.performed_by,
                            reversal: true,
                            occurred_at: e.occurred_at,
                        },
                    );
                }
            }

            // Advance cursor after successful apply.
            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Rebuild the ledger view from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), StockHistoryProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
