pub mod cart;
pub mod checkout;
pub mod events;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod sales;
pub mod system;

use axum::{http::StatusCode, routing::get, Router};

use shopforge_core::AggregateId;

use crate::app::errors;

/// Protected routes; the auth middleware is layered on by `build_app`.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/products", products::router())
        .nest("/inventory", inventory::router())
        .nest("/cart", cart::router())
        .nest("/checkout", checkout::router())
        .nest("/orders", orders::router())
        .nest("/sales", sales::router())
        .nest("/events", events::router())
}

/// Parse a path segment as an aggregate id, or produce the 400 to send.
pub(crate) fn parse_aggregate_id(
    id: &str,
    message: &'static str,
) -> Result<AggregateId, axum::response::Response> {
    id.parse::<AggregateId>()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", message))
}
