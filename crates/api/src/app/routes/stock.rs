use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;

use tokopos_auth::Permission;
use tokopos_catalog::{AdjustmentType, Product, ProductCommand, ProductId, RecordAdjustment};

use crate::app::routes::common::parse_aggregate_id;
use crate::app::services::{AppServices, PRODUCT_AGGREGATE};
use crate::app::{dto, errors};

pub async fn record_adjustment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordAdjustmentRequest>,
) -> axum::response::Response {
    let required = Permission::new(format!(
        "catalog.adjust.{}",
        body.adjustment_type.as_str()
    ));
    if let Err(e) = crate::authz::require(&principal, &required) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let agg = match parse_aggregate_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::RecordAdjustment(RecordAdjustment {
        product_id,
        adjustment_id: Uuid::now_v7(),
        adjustment_type: body.adjustment_type,
        quantity: body.quantity,
        condition: body.condition,
        source_location: body.source_location,
        target_location: body.target_location,
        notes: body.notes,
        performed_by: principal.user_id(),
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<Product>(agg, PRODUCT_AGGREGATE, cmd, |id| {
        Product::empty(ProductId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
            "stream_version": committed.last().map(|e| e.sequence_number).unwrap_or(0),
        })),
    )
        .into_response()
}

pub async fn list_adjustments(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::AdjustmentsQuery>,
) -> axum::response::Response {
    let product_id = match query.product_id.as_deref() {
        None => None,
        Some(raw) => match parse_aggregate_id(raw, "product") {
            Ok(agg) => Some(ProductId::new(agg)),
            Err(resp) => return resp,
        },
    };

    let adjustment_type = match query.adjustment_type.as_deref() {
        None => None,
        Some(raw) => match AdjustmentType::parse(raw) {
            Some(t) => Some(t),
            None => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_adjustment_type",
                    "type must be one of: production, distribution, return, reject, disposal",
                )
            }
        },
    };

    let items = services
        .adjustments_list(product_id, adjustment_type)
        .into_iter()
        .map(dto::adjustment_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
