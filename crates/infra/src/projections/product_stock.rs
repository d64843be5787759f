use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;
use thiserror::Error;

use tokopos_catalog::{bucket_deltas, ProductEvent, ProductId, StockBuckets};
use tokopos_core::AggregateId;
use tokopos_events::EventEnvelope;

use crate::read_model::ReadStore;

/// Queryable catalog read model: one row per product with its current
/// bucket counters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductView {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub price_cents: i64,
    pub buckets: StockBuckets,
}

#[derive(Debug, Error)]
pub enum ProductStockProjectionError {
    #[error("failed to deserialize product event: {0}")]
    Deserialize(String),

    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Product stock projection.
///
/// Consumes published envelopes (JSON payloads) and maintains the product
/// view with its four bucket counters. Read models are disposable and
/// rebuildable from the event stream.
#[derive(Debug)]
pub struct ProductStockProjection<S>
where
    S: ReadStore<ProductId, ProductView>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> ProductStockProjection<S>
where
    S: ReadStore<ProductId, ProductView>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    /// Query the read model for one product.
    pub fn get(&self, product_id: &ProductId) -> Option<ProductView> {
        self.store.get(product_id)
    }

    /// Look up a product by SKU. SKUs are unique across the catalog, so
    /// the first match is the only match.
    pub fn find_by_sku(&self, sku: &str) -> Option<ProductView> {
        self.store.list().into_iter().find(|v| v.sku == sku)
    }

    /// List all products, ordered by SKU.
    pub fn list(&self) -> Vec<ProductView> {
        let mut views = self.store.list();
        views.sort_by(|a, b| a.sku.cmp(&b.sku));
        views
    }

    /// Apply a published envelope into the projection.
    ///
    /// - Enforces monotonic sequence per aggregate stream
    /// - Idempotent for at-least-once delivery (replays <= cursor are ignored)
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProductStockProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        if let Ok(mut cursors) = self.cursors.write() {
            let last = *cursors.get(&aggregate_id).unwrap_or(&0);

            if seq == 0 {
                return Err(ProductStockProjectionError::NonMonotonicSequence { last, found: seq });
            }

            if seq <= last {
                // Duplicate or replay; safe to ignore.
                return Ok(());
            }

            if seq != last + 1 && last != 0 {
                return Err(ProductStockProjectionError::NonMonotonicSequence { last, found: seq });
            }

            let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProductStockProjectionError::Deserialize(e.to_string()))?;

            let product_id = match &event {
                ProductEvent::ProductRegistered(e) => e.product_id,
                ProductEvent::StockAdjusted(e) => e.product_id,
                ProductEvent::DistributionReversed(e) => e.product_id,
            };
            if product_id.0 != aggregate_id {
                return Err(ProductStockProjectionError::StreamMismatch(
                    "event product_id does not match envelope aggregate_id".to_string(),
                ));
            }

            match event {
                ProductEvent::ProductRegistered(e) => {
                    self.store.upsert(
                        e.product_id,
                        ProductView {
                            product_id: e.product_id,
                            sku: e.sku,
                            name: e.name,
                            category: e.category,
                            price_cents: e.price_cents,
                            buckets: StockBuckets::default(),
                        },
                    );
                }
                ProductEvent::StockAdjusted(e) => {
                    if let Some(mut view) = self.store.get(&e.product_id) {
                        let deltas = bucket_deltas(e.adjustment_type, e.quantity);
                        view.buckets.storage += deltas.storage;
                        view.buckets.distribution += deltas.distribution;
                        view.buckets.returned += deltas.returned;
                        view.buckets.rejected += deltas.rejected;
                        self.store.upsert(e.product_id, view);
                    }
                }
                ProductEvent::DistributionReversed(e) => {
                    if let Some(mut view) = self.store.get(&e.product_id) {
                        view.buckets.storage += e.quantity;
                        view.buckets.distribution -= e.quantity;
                        self.store.upsert(e.product_id, view);
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
    ) -> Result<(), ProductStockProjectionError> {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
        self.store.clear();

        // Deterministic replay order: aggregate, then sequence.
        let mut envs: Vec<_> = envelopes.into_iter().collect();
        envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

        for env in &envs {
            self.apply_envelope(env)?;
        }

        Ok(())
    }
}
