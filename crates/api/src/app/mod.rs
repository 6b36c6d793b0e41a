pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{middleware::from_fn_with_state, routing::get, Extension, Router};
use tower::ServiceBuilder;

use shopforge_auth::Hs256Validator;

use crate::middleware::{auth_middleware, AuthState};
use self::services::build_services;

/// Assemble the full application router.
///
/// `/health` is public; everything else sits behind the bearer-token
/// middleware.
pub async fn build_app(jwt_secret: String) -> Router {
    let auth_state = AuthState {
        jwt: Arc::new(Hs256Validator::new(jwt_secret.as_bytes())),
    };

    let services = Arc::new(build_services().await);

    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(from_fn_with_state(auth_state, auth_middleware))
            .layer(Extension(services)),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
