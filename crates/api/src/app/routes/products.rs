use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use tokopos_auth::Permission;
use tokopos_catalog::{Product, ProductCommand, ProductId, RegisterProduct};
use tokopos_core::AggregateId;

use crate::app::routes::common::parse_aggregate_id;
use crate::app::services::{AppServices, PRODUCT_AGGREGATE};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/stock", get(get_stock))
        .route("/:id/adjustments", post(super::stock::record_adjustment))
}

pub async fn register_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::RegisterProductRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("catalog.products.create")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    // SKUs are catalog-wide unique. The read model is the authority a
    // register can consult; a second product with the same SKU is refused.
    if services.product_find_by_sku(&body.sku).is_some() {
        return errors::json_error(
            StatusCode::CONFLICT,
            "sku_taken",
            format!("a product with sku '{}' already exists", body.sku),
        );
    }

    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::RegisterProduct(RegisterProduct {
        product_id,
        sku: body.sku,
        name: body.name,
        category: body.category,
        price_cents: body.price_cents,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<Product>(agg, PRODUCT_AGGREGATE, cmd, |id| {
        Product::empty(ProductId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match parse_aggregate_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let product_id = ProductId::new(agg);

    match services.product_get(&product_id) {
        Some(view) => (StatusCode::OK, Json(dto::product_to_json(view))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let items = services
        .product_list()
        .into_iter()
        .map(dto::product_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Just the bucket counters for a product. Convenience view for till
/// displays that poll frequently.
pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match parse_aggregate_id(&id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let product_id = ProductId::new(agg);

    match services.product_get(&product_id) {
        Some(view) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "product_id": view.product_id.to_string(),
                "stock": dto::buckets_to_json(&view.buckets),
            })),
        )
            .into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}
