use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use shopforge_auth::perms;
use shopforge_infra::services::ManualSaleLine;
use shopforge_orders::OrderId;
use shopforge_sales::SaleId;

use crate::app::routes::parse_aggregate_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_sale).get(list_sales))
        .route("/:id", get(get_sale))
}

pub async fn record_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::RecordSaleRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::SALES_WRITE) {
        return res;
    }

    let result = if let Some(order_id) = body.order_id {
        let order_id = match parse_aggregate_id(&order_id, "invalid order id") {
            Ok(v) => OrderId::new(v),
            Err(res) => return res,
        };
        services.sale_record_for_order(order_id, principal.subject())
    } else if !body.lines.is_empty() {
        let lines: Vec<ManualSaleLine> = body
            .lines
            .into_iter()
            .map(|l| ManualSaleLine {
                sku: l.sku,
                quantity: l.quantity,
            })
            .collect();
        services.sale_record_manual(&lines, principal.subject())
    } else {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "sale must reference an order or carry lines",
        );
    };

    match result {
        Ok(sale_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": sale_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::SALES_READ) {
        return res;
    }
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "items": services.sales_list(),
            "totals": services.sales_totals(),
        })),
    )
        .into_response()
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::SALES_READ) {
        return res;
    }
    let sale_id = match parse_aggregate_id(&id, "invalid sale id") {
        Ok(v) => SaleId::new(v),
        Err(res) => return res,
    };
    match services.sales_get(&sale_id) {
        Some(sale) => (StatusCode::OK, Json(sale)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "sale not found"),
    }
}
