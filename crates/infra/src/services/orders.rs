//! Order management service.
//!
//! Direct orders are the staff-facing path (phone orders, point of sale):
//! same stock discipline as checkout, but no cart and no payment gateway.
//! The order starts `Pending`/`Pending` and money is handled out of band.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use shopforge_catalog::{Product, ProductId};
use shopforge_core::AggregateId;
use shopforge_events::{EventBus, EventEnvelope};
use shopforge_orders::{
    CancelOrder, CustomerId, Order, OrderCommand, OrderId, OrderLine, OrderStatus, PaymentStatus,
    PlaceOrder, RefundOrder, UpdateOrderStatus, ORDER_AGGREGATE_TYPE,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::services::stock_ops::{return_stock, take_stock, StockDecrement};
use crate::services::CheckoutConfig;

/// One requested line of a direct order.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub sku: String,
    pub quantity: u64,
}

pub struct OrderService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    config: CheckoutConfig,
}

impl<S, B> OrderService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, config: CheckoutConfig) -> Self {
        Self { dispatcher, config }
    }

    /// Place an order directly, bypassing cart and payment.
    ///
    /// Stock is validated for every line before any is decremented; a
    /// failure mid-decrement puts the applied lines back.
    pub fn create_direct(
        &self,
        customer_id: CustomerId,
        requested: &[NewOrderLine],
        performed_by: &str,
    ) -> Result<OrderId, DispatchError> {
        if requested.is_empty() {
            return Err(DispatchError::Validation(
                "order must have at least one line".to_string(),
            ));
        }

        let mut lines = Vec::with_capacity(requested.len());
        for (idx, req) in requested.iter().enumerate() {
            if req.quantity == 0 {
                return Err(DispatchError::Validation(
                    "quantity must be greater than zero".to_string(),
                ));
            }
            let product_id = ProductId::for_sku(&req.sku);
            let (product, _) = self
                .dispatcher
                .load_aggregate(product_id.0, |id| Product::empty(ProductId::new(id)))?;
            if !product.exists() {
                return Err(DispatchError::NotFound);
            }
            if !product.can_be_sold() {
                return Err(DispatchError::Conflict(format!(
                    "product {} is not available for sale",
                    req.sku
                )));
            }
            let unit_price_cents = product.price_cents();
            lines.push(OrderLine {
                line_no: (idx + 1) as u32,
                product_id,
                sku: product.sku().to_string(),
                product_name: product.name().to_string(),
                quantity: req.quantity,
                unit_price_cents,
                line_total_cents: unit_price_cents.saturating_mul(req.quantity),
            });
        }

        let order_id = OrderId(AggregateId::new());
        let decrements: Vec<StockDecrement> = lines
            .iter()
            .map(|l| StockDecrement {
                sku: l.sku.clone(),
                quantity: l.quantity,
            })
            .collect();
        let reason = format!("order {}", order_id.0);
        take_stock(
            &self.dispatcher,
            &decrements,
            &reason,
            "order reverted",
            performed_by,
        )?;

        let subtotal: u64 = lines.iter().map(|l| l.line_total_cents).sum();
        let totals = self.config.totals_for(subtotal);
        let place = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            customer_id,
            lines,
            tax_cents: totals.tax_cents,
            shipping_cents: totals.shipping_cents,
            discount_cents: totals.discount_cents,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_reference: None,
            occurred_at: Utc::now(),
        });
        if let Err(err) =
            self.dispatcher
                .dispatch(order_id.0, ORDER_AGGREGATE_TYPE, place, |id| {
                    Order::empty(OrderId::new(id))
                })
        {
            return_stock(&self.dispatcher, &decrements, "order reverted", performed_by);
            return Err(err);
        }

        Ok(order_id)
    }

    /// Advance an order along the fulfillment chain.
    ///
    /// `Refunded` routes to the refund command; the chain itself is
    /// forward-only and enforced by the aggregate.
    pub fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), DispatchError> {
        let command = match status {
            OrderStatus::Refunded => OrderCommand::RefundOrder(RefundOrder {
                order_id,
                occurred_at: Utc::now(),
            }),
            _ => OrderCommand::UpdateOrderStatus(UpdateOrderStatus {
                order_id,
                status,
                occurred_at: Utc::now(),
            }),
        };
        self.dispatch_order(order_id, command)
    }

    /// Cancel an order and put its units back in stock.
    ///
    /// The cancellation commits first and at most once (a second cancel is
    /// a conflict), so the restock runs exactly once per order. Restock is
    /// best-effort per line; failures are logged for manual adjustment.
    pub fn cancel(
        &self,
        order_id: OrderId,
        reason: &str,
        performed_by: &str,
    ) -> Result<(), DispatchError> {
        let (order, _) = self
            .dispatcher
            .load_aggregate(order_id.0, |id| Order::empty(OrderId::new(id)))?;
        if !order.exists() {
            return Err(DispatchError::NotFound);
        }

        let decrements: Vec<StockDecrement> = order
            .lines()
            .iter()
            .map(|l| StockDecrement {
                sku: l.sku.clone(),
                quantity: l.quantity,
            })
            .collect();

        self.dispatch_order(
            order_id,
            OrderCommand::CancelOrder(CancelOrder {
                order_id,
                reason: reason.to_string(),
                occurred_at: Utc::now(),
            }),
        )?;

        return_stock(
            &self.dispatcher,
            &decrements,
            "order cancelled",
            performed_by,
        );
        Ok(())
    }

    /// Refund an order. Money moves back; goods do not restock.
    pub fn refund(&self, order_id: OrderId) -> Result<(), DispatchError> {
        self.dispatch_order(
            order_id,
            OrderCommand::RefundOrder(RefundOrder {
                order_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn dispatch_order(&self, order_id: OrderId, command: OrderCommand) -> Result<(), DispatchError> {
        self.dispatcher
            .dispatch(order_id.0, ORDER_AGGREGATE_TYPE, command, |id| {
                Order::empty(OrderId::new(id))
            })?;
        Ok(())
    }
}
