//! Sales read model: recorded sales with revenue, cost, and profit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use shopforge_events::EventEnvelope;
use shopforge_orders::OrderId;
use shopforge_sales::{SaleEvent, SaleId, SaleLine, SALE_AGGREGATE_TYPE};

use crate::projections::{sort_for_replay, ProjectionError, StreamCursors};
use crate::read_model::ReadModelStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReadModel {
    pub sale_id: SaleId,
    pub order_id: Option<OrderId>,
    pub lines: Vec<SaleLine>,
    pub revenue_cents: u64,
    pub cost_cents: u64,
    pub profit_cents: i64,
    pub recorded_by: String,
    pub recorded_at: DateTime<Utc>,
}

/// Projects sale events into [`SaleReadModel`]s.
pub struct SalesProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> SalesProjection<S>
where
    S: ReadModelStore<SaleId, SaleReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, sale_id: &SaleId) -> Option<SaleReadModel> {
        self.store.get(sale_id)
    }

    /// All sales, newest first.
    pub fn list(&self) -> Vec<SaleReadModel> {
        let mut sales = self.store.list();
        sales.sort_by_key(|s| std::cmp::Reverse(s.recorded_at));
        sales
    }

    /// Aggregate totals over all recorded sales.
    pub fn totals(&self) -> SalesTotals {
        let sales = self.store.list();
        SalesTotals {
            count: sales.len() as u64,
            revenue_cents: sales.iter().map(|s| s.revenue_cents).sum(),
            cost_cents: sales.iter().map(|s| s.cost_cents).sum(),
            profit_cents: sales.iter().map(|s| s.profit_cents).sum(),
        }
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != SALE_AGGREGATE_TYPE {
            return Ok(());
        }

        self.cursors.apply_guarded(envelope, || {
            let event: SaleEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

            let SaleEvent::SaleRecorded(e) = event;
            if e.sale_id.0 != envelope.aggregate_id() {
                return Err(ProjectionError::StreamMismatch(format!(
                    "sale {} in stream {}",
                    e.sale_id.0,
                    envelope.aggregate_id()
                )));
            }

            self.store.upsert(
                e.sale_id,
                SaleReadModel {
                    sale_id: e.sale_id,
                    order_id: e.order_id,
                    lines: e.lines,
                    revenue_cents: e.revenue_cents,
                    cost_cents: e.cost_cents,
                    profit_cents: e.profit_cents,
                    recorded_by: e.recorded_by,
                    recorded_at: e.occurred_at,
                },
            );
            Ok(())
        })
    }

    pub fn rebuild_from_scratch(
        &self,
        mut envelopes: Vec<EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.cursors.clear();
        self.store.clear();
        sort_for_replay(&mut envelopes);
        for envelope in &envelopes {
            self.apply_envelope(envelope)?;
        }
        Ok(())
    }
}

/// Revenue summary across all sales.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SalesTotals {
    pub count: u64,
    pub revenue_cents: u64,
    pub cost_cents: u64,
    pub profit_cents: i64,
}
