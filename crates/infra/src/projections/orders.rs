//! Order read model: current state of each placed order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use shopforge_events::EventEnvelope;
use shopforge_orders::{
    CustomerId, OrderEvent, OrderId, OrderLine, OrderStatus, PaymentStatus, ORDER_AGGREGATE_TYPE,
};

use crate::projections::{sort_for_replay, ProjectionError, StreamCursors};
use crate::read_model::ReadModelStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub customer_id: CustomerId,
    pub lines: Vec<OrderLine>,
    pub subtotal_cents: u64,
    pub tax_cents: u64,
    pub shipping_cents: u64,
    pub discount_cents: u64,
    pub total_cents: u64,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_reference: Option<String>,
    pub placed_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Projects order events into [`OrderReadModel`]s.
pub struct OrdersProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    /// All orders, newest first.
    pub fn list(&self) -> Vec<OrderReadModel> {
        let mut orders = self.store.list();
        orders.sort_by_key(|o| std::cmp::Reverse(o.placed_at));
        orders
    }

    /// One customer's orders, newest first.
    pub fn list_for_customer(&self, customer_id: &CustomerId) -> Vec<OrderReadModel> {
        self.list()
            .into_iter()
            .filter(|o| o.customer_id == *customer_id)
            .collect()
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != ORDER_AGGREGATE_TYPE {
            return Ok(());
        }

        self.cursors.apply_guarded(envelope, || {
            let event: OrderEvent = serde_json::from_value(envelope.payload().clone())
                .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
            self.apply_event(envelope, &event)
        })
    }

    fn apply_event(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        event: &OrderEvent,
    ) -> Result<(), ProjectionError> {
        let order_id = match event {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::OrderStatusChanged(e) => e.order_id,
            OrderEvent::OrderCancelled(e) => e.order_id,
            OrderEvent::OrderRefunded(e) => e.order_id,
        };
        if order_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::StreamMismatch(format!(
                "order {} in stream {}",
                order_id.0,
                envelope.aggregate_id()
            )));
        }

        match event {
            OrderEvent::OrderPlaced(e) => {
                self.store.upsert(
                    order_id,
                    OrderReadModel {
                        order_id,
                        customer_id: e.customer_id,
                        lines: e.lines.clone(),
                        subtotal_cents: e.subtotal_cents,
                        tax_cents: e.tax_cents,
                        shipping_cents: e.shipping_cents,
                        discount_cents: e.discount_cents,
                        total_cents: e.total_cents,
                        status: e.status,
                        payment_status: e.payment_status,
                        payment_reference: e.payment_reference.clone(),
                        placed_at: e.occurred_at,
                        updated_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::OrderStatusChanged(e) => {
                if let Some(mut order) = self.store.get(&order_id) {
                    order.status = e.to;
                    order.updated_at = e.occurred_at;
                    self.store.upsert(order_id, order);
                }
            }
            OrderEvent::OrderCancelled(e) => {
                if let Some(mut order) = self.store.get(&order_id) {
                    order.status = OrderStatus::Cancelled;
                    order.updated_at = e.occurred_at;
                    self.store.upsert(order_id, order);
                }
            }
            OrderEvent::OrderRefunded(e) => {
                if let Some(mut order) = self.store.get(&order_id) {
                    order.status = OrderStatus::Refunded;
                    order.payment_status = PaymentStatus::Refunded;
                    order.updated_at = e.occurred_at;
                    self.store.upsert(order_id, order);
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
    use shopforge_catalog::ProductId;
    use shopforge_core::AggregateId;
    use shopforge_orders::{OrderCancelled, OrderPlaced, OrderRefunded, OrderStatusChanged};
    use uuid::Uuid;

    use crate::read_model::InMemoryReadModelStore;

    fn projection() -> OrdersProjection<InMemoryReadModelStore<OrderId, OrderReadModel>> {
        OrdersProjection::new(InMemoryReadModelStore::new())
    }

    fn envelope(order_id: OrderId, seq: u64, event: OrderEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            order_id.0,
            ORDER_AGGREGATE_TYPE,
            seq,
            serde_json::to_value(&event).unwrap(),
        )
    }

    fn placed(order_id: OrderId, customer_id: CustomerId) -> OrderEvent {
        OrderEvent::OrderPlaced(OrderPlaced {
            order_id,
            customer_id,
            lines: vec![OrderLine {
                line_no: 1,
                product_id: ProductId::for_sku("SKU-1"),
                sku: "SKU-1".to_string(),
                product_name: "Anvil".to_string(),
                quantity: 2,
                unit_price_cents: 2500,
                line_total_cents: 5000,
            }],
            subtotal_cents: 5000,
            tax_cents: 0,
            shipping_cents: 500,
            discount_cents: 0,
            total_cents: 5500,
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Paid,
            payment_reference: Some("pi_test".to_string()),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn order_lifecycle_is_reflected() {
        let projection = projection();
        let order_id = OrderId(AggregateId::new());
        let customer_id = CustomerId::for_subject("alice");

        projection
            .apply_envelope(&envelope(order_id, 1, placed(order_id, customer_id)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                order_id,
                2,
                OrderEvent::OrderStatusChanged(OrderStatusChanged {
                    order_id,
                    from: OrderStatus::Processing,
                    to: OrderStatus::Shipped,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let order = projection.get(&order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.total_cents, 5500);
        assert_eq!(order.payment_reference.as_deref(), Some("pi_test"));
    }

    #[test]
    fn refund_flips_payment_status() {
        let projection = projection();
        let order_id = OrderId(AggregateId::new());
        let customer_id = CustomerId::for_subject("alice");

        projection
            .apply_envelope(&envelope(order_id, 1, placed(order_id, customer_id)))
            .unwrap();
        projection
            .apply_envelope(&envelope(
                order_id,
                2,
                OrderEvent::OrderRefunded(OrderRefunded {
                    order_id,
                    from: OrderStatus::Processing,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let order = projection.get(&order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        assert_eq!(order.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn customer_listing_filters_other_customers() {
        let projection = projection();
        let alice = CustomerId::for_subject("alice");
        let bob = CustomerId::for_subject("bob");

        let a = OrderId(AggregateId::new());
        let b = OrderId(AggregateId::new());
        projection.apply_envelope(&envelope(a, 1, placed(a, alice))).unwrap();
        projection.apply_envelope(&envelope(b, 1, placed(b, bob))).unwrap();

        let orders = projection.list_for_customer(&alice);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, a);
        assert_eq!(projection.list().len(), 2);
    }

    #[test]
    fn cancellation_applies_once() {
        let projection = projection();
        let order_id = OrderId(AggregateId::new());
        let customer_id = CustomerId::for_subject("alice");

        projection
            .apply_envelope(&envelope(order_id, 1, placed(order_id, customer_id)))
            .unwrap();
        let cancel = envelope(
            order_id,
            2,
            OrderEvent::OrderCancelled(OrderCancelled {
                order_id,
                from: OrderStatus::Processing,
                reason: "changed my mind".to_string(),
                occurred_at: Utc::now(),
            }),
        );
        projection.apply_envelope(&cancel).unwrap();
        projection.apply_envelope(&cancel).unwrap();

        assert_eq!(projection.get(&order_id).unwrap().status, OrderStatus::Cancelled);
    }
}
