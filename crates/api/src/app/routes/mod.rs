use axum::{
    routing::get,
    Router,
};

pub mod common;
pub mod distributions;
pub mod products;
pub mod stock;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/adjustments", get(stock::list_adjustments))
        .nest("/products", products::router())
        .nest("/distributions", distributions::router())
}
