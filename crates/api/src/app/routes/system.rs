use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use shopforge_auth::perms;

use crate::app::services;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

pub async fn whoami(
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "sub": principal.subject(),
            "role": principal.principal().role,
            "customer_id": principal.customer_id(),
        })),
    )
        .into_response()
}

pub async fn stream(
    Extension(svc): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(res) = crate::authz::require(&principal, &perms::STREAM_READ) {
        return res;
    }
    services::sse_stream(svc).into_response()
}
