//! Sales recording service.
//!
//! Order-derived sales take no stock (checkout already did); the sale id
//! is derived from the order id, so recording the same order twice is a
//! conflict. Manual sales decrement stock themselves.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use shopforge_catalog::{Product, ProductId};
use shopforge_core::AggregateId;
use shopforge_events::{EventBus, EventEnvelope};
use shopforge_orders::{Order, OrderId};
use shopforge_sales::{RecordSale, Sale, SaleCommand, SaleId, SaleLine, SALE_AGGREGATE_TYPE};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::services::stock_ops::{take_stock, StockDecrement};

/// One line of a manual (walk-in, phone) sale.
#[derive(Debug, Clone)]
pub struct ManualSaleLine {
    pub sku: String,
    pub quantity: u64,
}

pub struct SaleService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
}

impl<S, B> SaleService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self { dispatcher }
    }

    /// Record the sale for a placed order.
    ///
    /// Unit costs come from the current catalog; a product that has left
    /// the catalog is recorded at zero cost. At most one sale per order.
    pub fn record_for_order(
        &self,
        order_id: OrderId,
        recorded_by: &str,
    ) -> Result<SaleId, DispatchError> {
        let (order, _) = self
            .dispatcher
            .load_aggregate(order_id.0, |id| Order::empty(OrderId::new(id)))?;
        if !order.exists() {
            return Err(DispatchError::NotFound);
        }

        let mut lines = Vec::with_capacity(order.lines().len());
        for line in order.lines() {
            let (product, _) = self
                .dispatcher
                .load_aggregate(line.product_id.0, |id| Product::empty(ProductId::new(id)))?;
            let unit_cost_cents = if product.exists() { product.cost_cents() } else { 0 };
            lines.push(SaleLine {
                line_no: line.line_no,
                product_id: line.product_id,
                sku: line.sku.clone(),
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                unit_cost_cents,
            });
        }

        let sale_id = SaleId::for_order(order_id);
        self.dispatch_sale(
            sale_id,
            RecordSale {
                sale_id,
                order_id: Some(order_id),
                lines,
                recorded_by: recorded_by.to_string(),
                occurred_at: Utc::now(),
            },
        )?;
        Ok(sale_id)
    }

    /// Record a manual sale, decrementing stock for every line.
    pub fn record_manual(
        &self,
        requested: &[ManualSaleLine],
        recorded_by: &str,
    ) -> Result<SaleId, DispatchError> {
        if requested.is_empty() {
            return Err(DispatchError::Validation(
                "sale must have at least one line".to_string(),
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
            lines.push(SaleLine {
                line_no: (idx + 1) as u32,
                product_id,
                sku: product.sku().to_string(),
                product_name: product.name().to_string(),
                quantity: req.quantity,
                unit_price_cents: product.price_cents(),
                unit_cost_cents: product.cost_cents(),
            });
        }

        let sale_id = SaleId(AggregateId::new());
        let decrements: Vec<StockDecrement> = lines
            .iter()
            .map(|l| StockDecrement {
                sku: l.sku.clone(),
                quantity: l.quantity,
            })
            .collect();
        let reason = format!("manual sale {}", sale_id.0);
        take_stock(
            &self.dispatcher,
            &decrements,
            &reason,
            "manual sale reverted",
            recorded_by,
        )?;

        match self.dispatch_sale(
            sale_id,
            RecordSale {
                sale_id,
                order_id: None,
                lines,
                recorded_by: recorded_by.to_string(),
                occurred_at: Utc::now(),
            },
        ) {
            Ok(()) => Ok(sale_id),
            Err(err) => {
                crate::services::stock_ops::return_stock(
                    &self.dispatcher,
                    &decrements,
                    "manual sale reverted",
                    recorded_by,
                );
                Err(err)
            }
        }
    }

    fn dispatch_sale(&self, sale_id: SaleId, command: RecordSale) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(
            sale_id.0,
            SALE_AGGREGATE_TYPE,
            SaleCommand::RecordSale(command),
            |id| Sale::empty(SaleId::new(id)),
        )?;
        Ok(())
    }
}
