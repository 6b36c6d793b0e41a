//! Shared stock decrement/restock steps for multi-line flows.
//!
//! There is no transaction across stock streams. Flows that consume stock
//! for several SKUs validate every line before decrementing any, and undo
//! applied decrements with RETURN movements when a later step fails. A
//! concurrent writer can still invalidate a line between validation and
//! its decrement; the decrement then fails and the applied prefix is
//! returned.

use chrono::Utc;
use serde_json::Value as JsonValue;

use shopforge_events::{EventBus, EventEnvelope};
use shopforge_inventory::{
    MovementType, RecordMovement, StockCommand, StockRecord, StockRecordId, STOCK_AGGREGATE_TYPE,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

/// One SKU's share of a flow.
#[derive(Debug, Clone)]
pub(crate) struct StockDecrement {
    pub sku: String,
    pub quantity: u64,
}

/// Validate every decrement, then apply them all as OUT movements.
///
/// On failure, already-applied decrements are returned with
/// `revert_reason` before the error propagates.
pub(crate) fn take_stock<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    decrements: &[StockDecrement],
    reason: &str,
    revert_reason: &str,
    performed_by: &str,
) -> Result<(), DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    for dec in decrements {
        let stock_id = StockRecordId::for_sku(&dec.sku);
        let (stock, _) = dispatcher
            .load_aggregate(stock_id.0, |id| StockRecord::empty(StockRecordId::new(id)))?;
        if !stock.exists() {
            return Err(DispatchError::NotFound);
        }
        stock.ensure_available(dec.quantity)?;
    }

    let mut applied: Vec<StockDecrement> = Vec::with_capacity(decrements.len());
    for dec in decrements {
        let result = record_movement(
            dispatcher,
            &dec.sku,
            MovementType::Out,
            dec.quantity,
            reason,
            performed_by,
        );
        match result {
            Ok(()) => applied.push(dec.clone()),
            Err(err) => {
                return_stock(dispatcher, &applied, revert_reason, performed_by);
                return Err(err);
            }
        }
    }

    Ok(())
}

/// Put stock back with RETURN movements.
///
/// Best-effort: a failing return is logged and the remaining lines are
/// still attempted, so one broken stream cannot strand the others.
pub(crate) fn return_stock<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    decrements: &[StockDecrement],
    reason: &str,
    performed_by: &str,
) where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    for dec in decrements {
        let result = record_movement(
            dispatcher,
            &dec.sku,
            MovementType::Return,
            dec.quantity,
            reason,
            performed_by,
        );
        if let Err(err) = result {
            tracing::error!(
                sku = %dec.sku,
                quantity = dec.quantity,
                error = ?err,
                "failed to return stock; ledger requires manual adjustment"
            );
        }
    }
}

fn record_movement<S, B>(
    dispatcher: &CommandDispatcher<S, B>,
    sku: &str,
    movement_type: MovementType,
    quantity: u64,
    reason: &str,
    performed_by: &str,
) -> Result<(), DispatchError>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    let stock_id = StockRecordId::for_sku(sku);
    dispatcher.dispatch(
        stock_id.0,
        STOCK_AGGREGATE_TYPE,
        StockCommand::RecordMovement(RecordMovement {
            stock_id,
            movement_type,
            quantity,
            reason: reason.to_string(),
            performed_by: performed_by.to_string(),
            occurred_at: Utc::now(),
        }),
        |id| StockRecord::empty(StockRecordId::new(id)),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use shopforge_events::InMemoryEventBus;

    use crate::event_store::InMemoryEventStore;
    use crate::services::products::{NewProduct, ProductService};

    type Dispatcher =
        CommandDispatcher<InMemoryEventStore, InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn setup(skus: &[(&str, u64)]) -> Arc<Dispatcher> {
        let dispatcher = Arc::new(CommandDispatcher::new(
            InMemoryEventStore::new(),
            InMemoryEventBus::new(),
        ));
        let products = ProductService::new(dispatcher.clone());
        for (sku, stock) in skus {
            products
                .create(
                    NewProduct {
                        sku: sku.to_string(),
                        name: format!("Product {sku}"),
                        description: String::new(),
                        category: "test".to_string(),
                        tags: vec![],
                        price_cents: 1000,
                        cost_cents: 500,
                        featured: false,
                        threshold: 0,
                        initial_stock: *stock,
                    },
                    "admin",
                )
                .unwrap();
        }
        dispatcher
    }

    fn balance(dispatcher: &Dispatcher, sku: &str) -> u64 {
        let stock_id = StockRecordId::for_sku(sku);
        let (stock, _) = dispatcher
            .load_aggregate(stock_id.0, |id| StockRecord::empty(StockRecordId::new(id)))
            .unwrap();
        stock.stock()
    }

    fn dec(sku: &str, quantity: u64) -> StockDecrement {
        StockDecrement {
            sku: sku.to_string(),
            quantity,
        }
    }

    #[test]
    fn takes_every_line_or_none() {
        let dispatcher = setup(&[("SKU-A", 10), ("SKU-B", 1)]);

        // SKU-B cannot cover its line, so SKU-A must not be touched.
        let err = take_stock(
            &dispatcher,
            &[dec("SKU-A", 2), dec("SKU-B", 5)],
            "order test",
            "order test reverted",
            "tester",
        )
        .unwrap_err();
        match err {
            DispatchError::InsufficientStock {
                requested: 5,
                available: 1,
            } => {}
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(balance(&dispatcher, "SKU-A"), 10);
        assert_eq!(balance(&dispatcher, "SKU-B"), 1);

        take_stock(
            &dispatcher,
            &[dec("SKU-A", 2), dec("SKU-B", 1)],
            "order test",
            "order test reverted",
            "tester",
        )
        .unwrap();
        assert_eq!(balance(&dispatcher, "SKU-A"), 8);
        assert_eq!(balance(&dispatcher, "SKU-B"), 0);
    }

    #[test]
    fn return_stock_restores_balances() {
        let dispatcher = setup(&[("SKU-A", 10)]);
        take_stock(
            &dispatcher,
            &[dec("SKU-A", 4)],
            "order test",
            "order test reverted",
            "tester",
        )
        .unwrap();
        return_stock(&dispatcher, &[dec("SKU-A", 4)], "order cancelled", "tester");
        assert_eq!(balance(&dispatcher, "SKU-A"), 10);
    }
}
