use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use tokopos_auth::Permission;
use tokopos_catalog::ProductId;
use tokopos_core::{AggregateId, UserId};
use tokopos_distribution::{
    AdvanceDistribution, CreateDistribution, DistributionCommand, DistributionId,
    DistributionStatus, ProductDistribution,
};

use crate::app::routes::common::parse_aggregate_id;
use crate::app::services::{self, AppServices, DISTRIBUTION_AGGREGATE};
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_distribution).get(list_distributions))
        .route("/:id", get(get_distribution))
        .route("/:id/advance", post(advance_distribution))
        .route("/:id/cancel", post(cancel_distribution))
}

pub async fn create_distribution(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateDistributionRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("distribution.create")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let product_agg = match parse_aggregate_id(&body.product_id, "product") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cashier_id: UserId = match body.cashier_id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid cashier id")
        }
    };

    let now = Utc::now();
    let product_id = ProductId::new(product_agg);
    let distributed_by = principal.user_id();

    let adjustment =
        services::distribution_adjustment(product_id, body.quantity, distributed_by, now);

    let agg = AggregateId::new();
    let create = CreateDistribution {
        distribution_id: DistributionId::new(agg),
        product_id,
        quantity: body.quantity,
        cashier_id,
        distributed_by,
        notes: body.notes,
        occurred_at: now,
    };

    let committed = match services.create_distribution(adjustment, create) {
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

pub async fn advance_distribution(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AdvanceDistributionRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("distribution.advance")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let agg = match parse_aggregate_id(&id, "distribution") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let distribution_id = DistributionId::new(agg);

    let cmd = DistributionCommand::AdvanceDistribution(AdvanceDistribution {
        distribution_id,
        to: body.to,
        advanced_by: principal.user_id(),
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<ProductDistribution>(
        agg,
        DISTRIBUTION_AGGREGATE,
        cmd,
        |id| ProductDistribution::empty(DistributionId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn cancel_distribution(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&principal, &Permission::new("distribution.cancel")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let agg = match parse_aggregate_id(&id, "distribution") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let distribution_id = DistributionId::new(agg);

    let committed =
        match services.cancel_distribution(distribution_id, principal.user_id(), Utc::now()) {
            Ok(c) => c,
            Err(e) => return errors::dispatch_error_to_response(e),
        };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn get_distribution(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match parse_aggregate_id(&id, "distribution") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let distribution_id = DistributionId::new(agg);

    match services.distribution_get(&distribution_id) {
        Some(view) => (StatusCode::OK, Json(dto::distribution_to_json(view))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "distribution not found"),
    }
}

pub async fn list_distributions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Query(query): Query<dto::DistributionsQuery>,
) -> axum::response::Response {
    let status = match query.status.as_deref() {
        None => None,
        Some(raw) => match DistributionStatus::parse(raw) {
            Some(s) => Some(s),
            None => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_status",
                    "status must be one of: pending, distributed, completed, cancelled",
                )
            }
        },
    };

    // Non-admin principals only see distributions addressed to them.
    let scope = if principal.is_admin() {
        None
    } else {
        Some(principal.user_id())
    };

    let items = services
        .distribution_list(status)
        .into_iter()
        .filter(|v| scope.is_none_or(|cashier| v.cashier_id == cashier))
        .map(dto::distribution_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
