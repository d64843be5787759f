use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use tokopos_catalog::ProductId;
use tokopos_core::{AggregateId, UserId};
use tokopos_distribution::{DistributionEvent, DistributionId, DistributionStatus};
use tokopos_events::EventEnvelope;

use crate::read_model::ReadStore;

/// Queryable distribution read model: one row per hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionView {
    pub distribution_id: DistributionId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub cashier_id: UserId,
    pub distributed_by: UserId,
    pub status: DistributionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum DistributionsProjectionError {
    #[error("failed to deserialize distribution event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Distribution workflow projection.
#[derive(Debug)]
pub struct DistributionsProjection<S>
where
    S: ReadStore<DistributionId, DistributionView>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> DistributionsProjection<S>
where
    S: ReadStore<DistributionId, DistributionView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Query the read model for one distribution.
    pub fn get(&self, distribution_id: &DistributionId) -> Option<DistributionView> {
        self.store.get(distribution_id)
    }

    /// List distributions, newest first, optionally filtered by status.
    pub fn list(&self, status: Option<DistributionStatus>) -> Vec<DistributionView> {
        let mut views: Vec<DistributionView> = self
            .store
            .list()
            .into_iter()
            .filter(|v| status.is_none_or(|s| v.status == s))
            .collect();

        views.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.distribution_id.0.as_uuid().cmp(a.distribution_id.0.as_uuid()))
        });
        views
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces monotonic sequence per aggregate stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), DistributionsProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(DistributionsProjectionError::NonMonotonicSequence {
                    last,
                    found: seq,
                });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(DistributionsProjectionError::NonMonotonicSequence {
                    last,
                    found: seq,
                });
            }

            let event: DistributionEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| DistributionsProjectionError::Deserialize(e.to_string()))?;

            let distribution_id = match &event {
                DistributionEvent::DistributionCreated(e) => e.distribution_id,
                DistributionEvent::DistributionAdvanced(e) => e.distribution_id,
                DistributionEvent::DistributionCancelled(e) => e.distribution_id,
            };
            if distribution_id.0 != aggregate_id {
                return Err(DistributionsProjectionError::StreamMismatch(
                    "event distribution_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match event {
                DistributionEvent::DistributionCreated(e) => {
                    self.store.upsert(
                        e.distribution_id,
                        DistributionView {
                            distribution_id: e.distribution_id,
                            product_id: e.product_id,
                            quantity: e.quantity,
                            cashier_id: e.cashier_id,
                            distributed_by: e.distributed_by,
                            status: DistributionStatus::Pending,
                            notes: e.notes,
                            created_at: e.occurred_at,
                            updated_at: e.occurred_at,
                        },
                    );
                }
                DistributionEvent::DistributionAdvanced(e) => {
                    if let Some(mut view) = self.store.get(&e.distribution_id) {
                        view.status = e.to;
                        view.updated_at = e.occurred_at;
                        self.store.upsert(e.distribution_id, view);
                    }
                }
                DistributionEvent::DistributionCancelled(e) => {
                    if let Some(mut view) = self.store.get(&e.distribution_id) {
                        view.status = DistributionStatus::Cancelled;
                        view.updated_at = e.occurred_at;
                        self.store.upsert(e.distribution_id, view);
                    }
                }
            }

            // Advance cursor after successful apply.
            cursors.insert(aggregate_id, seq);
        }

        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), DistributionsProjectionError> {
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
