//! Stock level read model: current balance plus movement ledger per SKU.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use shopforge_events::EventEnvelope;
use shopforge_inventory::{MovementType, StockEvent, StockRecordId, STOCK_AGGREGATE_TYPE};

use crate::projections::{sort_for_replay, ProjectionError, StreamCursors};
use crate::read_model::ReadModelStore;

/// One applied movement, as shown in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementEntry {
    pub movement_type: MovementType,
    pub quantity: u64,
    pub previous_stock: u64,
    pub new_stock: u64,
    pub reason: String,
    pub performed_by: String,
    pub occurred_at: DateTime<Utc>,
}

/// Current stock position for one SKU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevelRow {
    pub stock_id: StockRecordId,
    pub sku: String,
    pub stock: u64,
    pub threshold: u64,
    /// Movements in append order, oldest first.
    pub movements: Vec<MovementEntry>,
    pub updated_at: DateTime<Utc>,
}

impl StockLevelRow {
    pub fn below_threshold(&self) -> bool {
        self.stock <= self.threshold
    }
}

/// Projects stock events into per-SKU [`StockLevelRow`]s.
pub struct StockLevelsProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> StockLevelsProjection<S>
where
    S: ReadModelStore<String, StockLevelRow>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, sku: &str) -> Option<StockLevelRow> {
        self.store.get(&sku.to_string())
    }

    pub fn list(&self) -> Vec<StockLevelRow> {
        let mut rows = self.store.list();
        rows.sort_by(|a, b| a.sku.cmp(&b.sku));
        rows
    }

    /// SKUs at or below their reorder threshold.
    pub fn low_stock(&self) -> Vec<StockLevelRow> {
        self.list()
            .into_iter()
            .filter(StockLevelRow::below_threshold)
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != STOCK_AGGREGATE_TYPE {
            return Ok(());
        }

        self.cursors.apply_guarded(envelope, || {
            let event: StockEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
            self.apply_event(envelope, &event)
        })
    }

    fn apply_event(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        event: &StockEvent,
    ) -> Result<(), ProjectionError> {
        let stock_id = match event {
            StockEvent::StockOpened(e) => e.stock_id,
            StockEvent::MovementRecorded(e) => e.stock_id,
            StockEvent::ThresholdSet(e) => e.stock_id,
        };
        if stock_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::StreamMismatch(format!(
                "stock record {} in stream {}",
                stock_id.0,
                envelope.aggregate_id()
            )));
        }

        match event {
            StockEvent::StockOpened(e) => {
                self.store.upsert(
                    e.sku.clone(),
                    StockLevelRow {
                        stock_id: e.stock_id,
                        sku: e.sku.clone(),
                        stock: 0,
                        threshold: e.threshold,
                        movements: Vec::new(),
                        updated_at: e.occurred_at,
                    },
                );
            }
            StockEvent::MovementRecorded(e) => {
                if let Some(mut row) = self.store.get(&e.sku) {
                    row.stock = e.new_stock;
                    row.updated_at = e.occurred_at;
                    row.movements.push(MovementEntry {
                        movement_type: e.movement_type,
                        quantity: e.quantity,
                        previous_stock: e.previous_stock,
                        new_stock: e.new_stock,
                        reason: e.reason.clone(),
                        performed_by: e.performed_by.clone(),
                        occurred_at: e.occurred_at,
                    });
                    self.store.upsert(e.sku.clone(), row);
                }
            }
            StockEvent::ThresholdSet(e) => {
                if let Some(mut row) = self.store.get(&e.sku) {
                    row.threshold = e.threshold;
                    row.updated_at = e.occurred_at;
                    self.store.upsert(e.sku.clone(), row);
                }
            }
        }

        Ok(())
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shopforge_inventory::{MovementRecorded, StockOpened, ThresholdSet};
    use uuid::Uuid;

    use crate::read_model::InMemoryReadModelStore;

    fn projection() -> StockLevelsProjection<InMemoryReadModelStore<String, StockLevelRow>> {
        StockLevelsProjection::new(InMemoryReadModelStore::new())
    }

    fn envelope(seq: u64, event: StockEvent) -> EventEnvelope<JsonValue> {
        let stock_id = match &event {
            StockEvent::StockOpened(e) => e.stock_id,
            StockEvent::MovementRecorded(e) => e.stock_id,
            StockEvent::ThresholdSet(e) => e.stock_id,
        };
        EventEnvelope::new(
            Uuid::now_v7(),
            stock_id.0,
            STOCK_AGGREGATE_TYPE,
            seq,
            serde_json::to_value(&event).unwrap(),
        )
    }

    fn opened(sku: &str, threshold: u64) -> StockEvent {
        StockEvent::StockOpened(StockOpened {
            stock_id: StockRecordId::for_sku(sku),
            sku: sku.to_string(),
            threshold,
            occurred_at: Utc::now(),
        })
    }

    fn movement(sku: &str, movement_type: MovementType, qty: u64, prev: u64, new: u64) -> StockEvent {
        StockEvent::MovementRecorded(MovementRecorded {
            stock_id: StockRecordId::for_sku(sku),
            sku: sku.to_string(),
            movement_type,
            quantity: qty,
            previous_stock: prev,
            new_stock: new,
            reason: "test".to_string(),
            performed_by: "tester".to_string(),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn tracks_balance_and_ledger() {
        let projection = projection();
        projection.apply_envelope(&envelope(1, opened("SKU-1", 5))).unwrap();
        projection
            .apply_envelope(&envelope(2, movement("SKU-1", MovementType::In, 10, 0, 10)))
            .unwrap();
        projection
            .apply_envelope(&envelope(3, movement("SKU-1", MovementType::Out, 4, 10, 6)))
            .unwrap();

        let row = projection.get("SKU-1").unwrap();
        assert_eq!(row.stock, 6);
        assert_eq!(row.movements.len(), 2);
        assert_eq!(row.movements[1].new_stock, 6);
        assert!(!row.below_threshold());
    }

    #[test]
    fn low_stock_reports_at_or_below_threshold() {
        let projection = projection();
        projection.apply_envelope(&envelope(1, opened("SKU-1", 5))).unwrap();
        projection
            .apply_envelope(&envelope(2, movement("SKU-1", MovementType::In, 5, 0, 5)))
            .unwrap();
        projection.apply_envelope(&envelope(1, opened("SKU-2", 2))).unwrap();
        projection
            .apply_envelope(&envelope(2, movement("SKU-2", MovementType::In, 9, 0, 9)))
            .unwrap();

        let low = projection.low_stock();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].sku, "SKU-1");
    }

    #[test]
    fn threshold_changes_apply_in_place() {
        let projection = projection();
        projection.apply_envelope(&envelope(1, opened("SKU-1", 5))).unwrap();
        projection
            .apply_envelope(&envelope(
                2,
                StockEvent::ThresholdSet(ThresholdSet {
                    stock_id: StockRecordId::for_sku("SKU-1"),
                    sku: "SKU-1".to_string(),
                    threshold: 8,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert_eq!(projection.get("SKU-1").unwrap().threshold, 8);
    }

    #[test]
    fn redelivered_movements_do_not_double_apply() {
        let projection = projection();
        projection.apply_envelope(&envelope(1, opened("SKU-1", 0))).unwrap();
        let mv = envelope(2, movement("SKU-1", MovementType::In, 10, 0, 10));
        projection.apply_envelope(&mv).unwrap();
        projection.apply_envelope(&mv).unwrap();

        let row = projection.get("SKU-1").unwrap();
        assert_eq!(row.stock, 10);
        assert_eq!(row.movements.len(), 1);
    }
}
