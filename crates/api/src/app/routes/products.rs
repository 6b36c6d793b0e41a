use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use shopforge_auth::perms;
use shopforge_catalog::ProductId;
use shopforge_infra::projections::{CatalogQuery, CatalogSort};
use shopforge_infra::services::NewProduct;

use crate::app::routes::parse_aggregate_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::require;
use crate::context::PrincipalContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product).put(update_product))
        .route("/:id/price", put(change_price))
        .route("/:id/activate", post(activate_product))
        .route("/:id/deactivate", post(deactivate_product))
}

#[derive(Debug, Deserialize)]
pub struct ProductListQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price_cents: Option<u64>,
    pub max_price_cents: Option<u64>,
    pub min_rating: Option<f64>,
    pub in_stock: Option<bool>,
    pub featured: Option<bool>,
    #[serde(default)]
    pub include_inactive: bool,
    pub sort: Option<CatalogSort>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ProductListQuery {
    fn into_catalog_query(self) -> CatalogQuery {
        CatalogQuery {
            search: self.search,
            category: self.category,
            min_price_cents: self.min_price_cents,
            max_price_cents: self.max_price_cents,
            min_rating: self.min_rating,
            in_stock: self.in_stock,
            featured: self.featured,
            include_inactive: self.include_inactive,
            sort: self.sort.unwrap_or_default(),
            limit: self.limit.unwrap_or(CatalogQuery::DEFAULT_LIMIT),
            offset: self.offset.unwrap_or(0),
        }
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CATALOG_WRITE) {
        return res;
    }

    let input = NewProduct {
        sku: body.sku,
        name: body.name,
        description: body.description,
        category: body.category,
        tags: body.tags,
        price_cents: body.price_cents,
        cost_cents: body.cost_cents,
        featured: body.featured,
        threshold: body.threshold,
        initial_stock: body.initial_stock,
    };

    match services.product_create(input, principal.subject()) {
        Ok(product_id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({ "id": product_id.0.to_string() })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ProductListQuery>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CATALOG_READ) {
        return res;
    }
    let page = services.catalog_query(&query.into_catalog_query());
    (StatusCode::OK, Json(page)).into_response()
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CATALOG_READ) {
        return res;
    }
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.catalog_get(&product_id) {
        Some(entry) => (StatusCode::OK, Json(entry)).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found"),
    }
}

pub async fn update_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateProductRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CATALOG_WRITE) {
        return res;
    }
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    if let Err(e) = services.product_update_details(
        product_id,
        body.name,
        body.description,
        body.category,
        body.tags,
    ) {
        return errors::dispatch_error_to_response(e);
    }
    if let Some(rating) = body.rating {
        if let Err(e) = services.product_set_rating(product_id, rating) {
            return errors::dispatch_error_to_response(e);
        }
    }
    if let Some(featured) = body.featured {
        if let Err(e) = services.product_set_featured(product_id, featured) {
            return errors::dispatch_error_to_response(e);
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

pub async fn change_price(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangePriceRequest>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CATALOG_WRITE) {
        return res;
    }
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.product_change_price(product_id, body.price_cents, body.cost_cents) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn activate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CATALOG_WRITE) {
        return res;
    }
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.product_activate(product_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn deactivate_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::CATALOG_WRITE) {
        return res;
    }
    let product_id = match parse_product_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };
    match services.product_deactivate(product_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

fn parse_product_id(id: &str) -> Result<ProductId, axum::response::Response> {
    parse_aggregate_id(id, "invalid product id").map(ProductId::new)
}
