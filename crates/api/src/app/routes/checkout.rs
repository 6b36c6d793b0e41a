use std::sync::Arc;

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};

use shopforge_auth::perms;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/intent", post(create_intent))
        .route("/confirm", post(confirm))
}

pub async fn create_intent(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CHECKOUT) {
        return res;
    }
    match services.checkout_create_intent(principal.customer_id()) {
        Ok(intent) => (StatusCode::CREATED, Json(intent)).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn confirm(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ConfirmCheckoutRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CHECKOUT) {
        return res;
    }
    match services.checkout_confirm(
        principal.customer_id(),
        &body.payment_reference,
        principal.subject(),
    ) {
        Ok(order_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "order_id": order_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
