use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use shopforge_auth::perms;
use shopforge_infra::projections::StockLevelRow;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stock))
        .route("/:sku", get(get_stock))
        .route("/:sku/movements", post(record_movement))
        .route("/:sku/threshold", put(set_threshold))
}

fn level_to_json(row: &StockLevelRow) -> serde_json::Value {
    serde_json::json!({
        "sku": row.sku,
        "stock": row.stock,
        "threshold": row.threshold,
        "below_threshold": row.below_threshold(),
        "updated_at": row.updated_at,
    })
}

pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::INVENTORY_READ) {
        return res;
    }
    let items = services
        .stock_list()
        .iter()
        .map(level_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(sku): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::INVENTORY_READ) {
        return res;
    }
    match services.stock_get(&sku) {
        Some(row) => {
            let mut body = level_to_json(&row);
            body["movements"] = serde_json::json!(row.movements);
            (StatusCode::OK, Json(body)).into_response()
        }
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "stock record not found"),
    }
}

pub async fn record_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(sku): Path<String>,
    Json(body): Json<dto::RecordMovementRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::INVENTORY_WRITE) {
        return res;
    }
    match services.inventory_record_movement(
        &sku,
        body.movement_type,
        body.quantity,
        body.reason,
        principal.subject().to_string(),
    ) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn set_threshold(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(sku): Path<String>,
    Json(body): Json<dto::SetThresholdRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::INVENTORY_WRITE) {
        return res;
    }
    match services.inventory_set_threshold(&sku, body.threshold) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
