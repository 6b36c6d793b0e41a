//! Read-only event inspection over the append-only store, for auditing
//! and debugging.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use shopforge_auth::perms;
use shopforge_core::AggregateId;
use shopforge_infra::event_store::{EventFilter, EventQueryResult, Pagination, StoredEvent};

use crate::app::routes::parse_aggregate_id;
use crate::app::services::AppServices;
use crate::app::errors;
use crate::authz::require;
use crate::context::PrincipalContext;

#[derive(Debug, Deserialize)]
pub struct EventListQuery {
    pub aggregate_id: Option<String>,
    pub aggregate_type: Option<String>,
    pub event_type: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_events))
        .route("/aggregates/:id", get(list_aggregate_events))
        .route("/:event_id", get(get_event))
}

pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<EventListQuery>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::EVENTS_READ) {
        return res;
    }

    let aggregate_id = match query.aggregate_id {
        Some(raw) => match parse_aggregate_id(&raw, "invalid aggregate id") {
            Ok(v) => Some(v),
            Err(res) => return res,
        },
        None => None,
    };

    let filter = EventFilter {
        aggregate_id,
        aggregate_type: query.aggregate_type,
        event_type: query.event_type,
        occurred_after: query.occurred_after,
        occurred_before: query.occurred_before,
    };
    let pagination = Pagination::new(query.limit, query.offset);

    match services.query_events(filter, pagination).await {
        Ok(result) => query_result_response(result),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "query_failed",
            format!("failed to query events: {e:?}"),
        ),
    }
}

pub async fn list_aggregate_events(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Query(query): Query<EventListQuery>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::EVENTS_READ) {
        return res;
    }
    let aggregate_id: AggregateId = match parse_aggregate_id(&id, "invalid aggregate id") {
        Ok(v) => v,
        Err(res) => return res,
    };
    let pagination = Some(Pagination::new(query.limit, query.offset));

    match services.get_aggregate_events(aggregate_id, pagination).await {
        Ok(result) => query_result_response(result),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "query_failed",
            format!("failed to query events: {e:?}"),
        ),
    }
}

pub async fn get_event(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<PrincipalContext>,
    Path(event_id): Path<String>,
) -> axum::response::Response {
    if let Err(res) = require(&principal, &perms::EVENTS_READ) {
        return res;
    }
    let event_id = match event_id.parse::<uuid::Uuid>() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid event id"),
    };

    match services.get_event_by_id(event_id).await {
        Ok(Some(event)) => (StatusCode::OK, Json(event_to_json(&event))).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "event not found"),
        Err(e) => errors::json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "query_failed",
            format!("failed to load event: {e:?}"),
        ),
    }
}

fn query_result_response(result: EventQueryResult) -> axum::response::Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "events": result.events.iter().map(event_to_json).collect::<Vec<_>>(),
            "total": result.total,
            "pagination": {
                "limit": result.pagination.limit,
                "offset": result.pagination.offset,
            },
            "has_more": result.has_more,
        })),
    )
        .into_response()
}

fn event_to_json(event: &StoredEvent) -> serde_json::Value {
    serde_json::json!({
        "event_id": event.event_id,
        "aggregate_id": event.aggregate_id,
        "aggregate_type": event.aggregate_type,
        "sequence_number": event.sequence_number,
        "event_type": event.event_type,
        "event_version": event.event_version,
        "occurred_at": event.occurred_at,
        "payload": event.payload,
    })
}
