use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use shopforge_auth::perms;
use shopforge_infra::services::NewOrderLine;
use shopforge_orders::{CustomerId, OrderId};

use crate::app::routes::parse_aggregate_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order).delete(cancel_order))
        .route("/:id/status", put(update_status))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateOrderRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::ORDERS_WRITE) {
        return res;
    }

    // Multi-line body, or the legacy single-item form.
    let lines: Vec<NewOrderLine> = if !body.lines.is_empty() {
        body.lines
            .into_iter()
            .map(|l| NewOrderLine {
                sku: l.sku,
                quantity: l.quantity,
            })
            .collect()
    } else if let (Some(sku), Some(quantity)) = (body.sku, body.quantity) {
        vec![NewOrderLine { sku, quantity }]
    } else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "order must have lines or a sku/quantity pair",
        );
    };

    let customer_id = CustomerId::for_subject(&body.customer);
    match services.order_create_direct(customer_id, &lines, principal.subject()) {
        Ok(order_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": order_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::ORDERS_READ) {
        return res;
    }
    // Customers only see their own orders.
    let items = if principal.is_admin() {
        services.orders_list()
    } else {
        services.orders_list_for_customer(&principal.customer_id())
    };
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::ORDERS_READ) {
        return res;
    }
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.orders_get(&order_id) {
        // Another customer's order is indistinguishable from a missing one.
        Some(order) if principal.is_admin() || order.customer_id == principal.customer_id() => {
            (StatusCode::OK, Json(order)).into_response()
        }
        _ => errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found"),
    }
}

pub async fn update_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateOrderStatusRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::ORDERS_WRITE) {
        return res;
    }
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.order_update_status(order_id, body.status) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn cancel_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::ORDERS_WRITE) {
        return res;
    }
    let order_id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.order_cancel(order_id, "cancelled by operator", principal.subject()) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

fn parse_order_id(id: &str) -> Result<OrderId, axum::response::Response> {
    parse_aggregate_id(id, "invalid order id").map(OrderId::new)
}
