use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};

use shopforge_auth::perms;
use shopforge_catalog::ProductId;

use crate::app::routes::parse_aggregate_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item))
        .route("/items/:product_id", delete(remove_item).put(set_quantity))
}

pub async fn get_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CART_MANAGE) {
        return res;
    }
    let cart = services.cart_get(principal.customer_id());
    (StatusCode::OK, Json(dto::cart_to_json(&cart))).into_response()
}

pub async fn add_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::AddCartItemRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CART_MANAGE) {
        return res;
    }
    match services.cart_add_item(principal.customer_id(), &body.sku, body.quantity) {
        Ok(cart) => (StatusCode::OK, Json(dto::cart_to_json(&cart))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn set_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
    Json(body): Json<dto::SetCartQuantityRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CART_MANAGE) {
        return res;
    }
    let product_id = match parse_aggregate_id(&product_id, "invalid product id") {
        Ok(v) => ProductId::new(v),
        Err(res) => return res,
    };
    match services.cart_set_quantity(principal.customer_id(), product_id, body.quantity) {
        Ok(cart) => (StatusCode::OK, Json(dto::cart_to_json(&cart))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn remove_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CART_MANAGE) {
        return res;
    }
    let product_id = match parse_aggregate_id(&product_id, "invalid product id") {
        Ok(v) => ProductId::new(v),
        Err(res) => return res,
    };
    match services.cart_remove_item(principal.customer_id(), product_id) {
        Ok(cart) => (StatusCode::OK, Json(dto::cart_to_json(&cart))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn clear_cart(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CART_MANAGE) {
        return res;
    }
    let cart = services.cart_clear(principal.customer_id());
    (StatusCode::OK, Json(dto::cart_to_json(&cart))).into_response()
}
