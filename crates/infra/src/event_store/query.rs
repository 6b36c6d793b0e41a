//! Event query interface for auditing and debugging.
//!
//! Read-only access to the append-only store, with filters and pagination.
//! This backs the `GET /events` audit surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopforge_core::AggregateId;

use crate::event_store::{EventStoreError, StoredEvent};

/// Pagination parameters for event queries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of events to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000), // Cap at 1000 for safety
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for event queries. All fields are optional and AND-ed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventFilter {
    pub aggregate_id: Option<AggregateId>,
    /// e.g. "inventory.stock".
    pub aggregate_type: Option<String>,
    /// e.g. "inventory.stock.movement_recorded".
    pub event_type: Option<String>,
    pub occurred_after: Option<DateTime<Utc>>,
    pub occurred_before: Option<DateTime<Utc>>,
}

impl EventFilter {
    /// Whether a stored event satisfies every set criterion.
    pub fn matches(&self, event: &StoredEvent) -> bool {
        if let Some(id) = self.aggregate_id {
            if event.aggregate_id != id {
                return false;
            }
        }
        if let Some(ref at) = self.aggregate_type {
            if &event.aggregate_type != at {
                return false;
            }
        }
        if let Some(ref et) = self.event_type {
            if &event.event_type != et {
                return false;
            }
        }
        if let Some(after) = self.occurred_after {
            if event.occurred_at < after {
                return false;
            }
        }
        if let Some(before) = self.occurred_before {
            if event.occurred_at > before {
                return false;
            }
        }
        true
    }
}

/// Paginated event query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventQueryResult {
    pub events: Vec<StoredEvent>,
    /// Total number of events matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

/// Async query interface for event inspection.
#[async_trait::async_trait]
pub trait EventQuery: Send + Sync {
    /// Query events with optional filters and pagination.
    ///
    /// Events are ordered by occurred_at (descending), then sequence_number
    /// (ascending) for equal timestamps.
    async fn query_events(
        &self,
        filter: EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError>;

    /// Get events for a specific aggregate stream, in sequence order.
    async fn get_aggregate_events(
        &self,
        aggregate_id: AggregateId,
        pagination: Option<Pagination>,
    ) -> Result<EventQueryResult, EventStoreError> {
        let filter = EventFilter {
            aggregate_id: Some(aggregate_id),
            ..Default::default()
        };
        self.query_events(filter, pagination.unwrap_or_default())
            .await
    }

    /// Get a single event by its ID.
    async fn get_event_by_id(
        &self,
        event_id: uuid::Uuid,
    ) -> Result<Option<StoredEvent>, EventStoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stored(aggregate_type: &str, event_type: &str) -> StoredEvent {
        StoredEvent {
            event_id: uuid::Uuid::now_v7(),
            aggregate_id: AggregateId::new(),
            aggregate_type: aggregate_type.to_string(),
            sequence_number: 1,
            event_type: event_type.to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: json!({}),
        }
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = EventFilter::default();
        assert!(filter.matches(&stored("catalog.product", "catalog.product.created")));
    }

    #[test]
    fn filters_are_conjunctive() {
        let e = stored("inventory.stock", "inventory.stock.movement_recorded");

        let filter = EventFilter {
            aggregate_type: Some("inventory.stock".to_string()),
            event_type: Some("inventory.stock.opened".to_string()),
            ..Default::default()
        };
        assert!(!filter.matches(&e));

        let filter = EventFilter {
            aggregate_type: Some("inventory.stock".to_string()),
            event_type: Some("inventory.stock.movement_recorded".to_string()),
            ..Default::default()
        };
        assert!(filter.matches(&e));
    }

    #[test]
    fn pagination_caps_limit() {
        let p = Pagination::new(Some(5000), None);
        assert_eq!(p.limit, 1000);
        assert_eq!(p.offset, 0);
    }
}
