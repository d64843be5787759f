use serde::Deserialize;
use serde_json::json;

use tokopos_catalog::{AdjustmentType, StockCondition, StockLocation};
use tokopos_distribution::DistributionStatus;
use tokopos_infra::projections::{AdjustmentRecord, DistributionView, ProductView};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
}

#[derive(Debug, Deserialize)]
pub struct RecordAdjustmentRequest {
    pub adjustment_type: AdjustmentType,
    pub quantity: i64,
    pub condition: StockCondition,
    pub source_location: StockLocation,
    pub target_location: StockLocation,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateDistributionRequest {
    pub product_id: String,
    pub quantity: i64,
    pub cashier_id: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceDistributionRequest {
    pub to: DistributionStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdjustmentsQuery {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(rename = "type")]
    pub adjustment_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DistributionsQuery {
    pub status: Option<String>,
}

// -------------------------
// Response JSON mapping
// -------------------------

pub fn product_to_json(view: ProductView) -> serde_json::Value {
    json!({
        "id": view.product_id.to_string(),
        "sku": view.sku,
        "name": view.name,
        "category": view.category,
        "price_cents": view.price_cents,
        "stock": buckets_to_json(&view.buckets),
    })
}

pub fn buckets_to_json(buckets: &tokopos_catalog::StockBuckets) -> serde_json::Value {
    json!({
        "storage": buckets.storage,
        "distribution": buckets.distribution,
        "returned": buckets.returned,
        "rejected": buckets.rejected,
        "total": buckets.total(),
    })
}

pub fn adjustment_to_json(record: AdjustmentRecord) -> serde_json::Value {
    json!({
        "adjustment_id": record.adjustment_id.to_string(),
        "product_id": record.product_id.to_string(),
        "type": record.adjustment_type.as_str(),
        "quantity": record.quantity,
        "condition": record.condition.as_str(),
        "source_location": record.source_location.as_str(),
        "target_location": record.target_location.as_str(),
        "notes": record.notes,
        "performed_by": record.performed_by.to_string(),
        "reversal": record.reversal,
        "occurred_at": record.occurred_at.to_rfc3339(),
    })
}

pub fn distribution_to_json(view: DistributionView) -> serde_json::Value {
    json!({
        "id": view.distribution_id.to_string(),
        "product_id": view.product_id.to_string(),
        "quantity": view.quantity,
        "cashier_id": view.cashier_id.to_string(),
        "distributed_by": view.distributed_by.to_string(),
        "status": view.status.as_str(),
        "notes": view.notes,
        "created_at": view.created_at.to_rfc3339(),
        "updated_at": view.updated_at.to_rfc3339(),
    })
}
