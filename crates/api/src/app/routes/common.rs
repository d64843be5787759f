use axum::http::StatusCode;

use tokopos_core::AggregateId;

use crate::app::errors;

/// Parse a path segment as an aggregate id, with a consistent 400 response.
pub fn parse_aggregate_id(
    raw: &str,
    what: &'static str,
) -> Result<AggregateId, axum::response::Response> {
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "invalid_id",
            format!("invalid {what} id"),
        )
    })
}
