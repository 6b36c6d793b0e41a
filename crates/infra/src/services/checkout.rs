//! Checkout reconciler.
//!
//! Confirmation turns a cart plus a succeeded payment into a paid order:
//!
//! 1. reject a payment reference whose claim is already held, so a bare
//!    replay of a finished confirmation reads as a duplicate rather than
//!    an empty-cart complaint
//! 2. load the cart (must be non-empty) and re-price its lines from the
//!    current catalog
//! 3. retrieve the payment intent; it must have succeeded and its amount
//!    must equal the order total
//! 4. capture the payment claim (create-once; a racing reference is a
//!    conflict before any stock moves)
//! 5. decrement stock for every line (validate all, then decrement all)
//! 6. place the order as `Processing`/`Paid`
//! 7. clear the cart
//!
//! A failure after step 4 compensates: applied decrements come back as
//! RETURN movements and the claim is released, so the reference can be
//! retried once the cause is fixed.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use shopforge_catalog::{Product, ProductId};
use shopforge_core::AggregateId;
use shopforge_events::{EventBus, EventEnvelope};
use shopforge_orders::{
    CapturePayment, Cart, CustomerId, Order, OrderCommand, OrderId, OrderLine, OrderStatus,
    PaymentClaim, PaymentClaimCommand, PaymentClaimId, PaymentStatus, PlaceOrder, ReleasePayment,
    CLAIM_AGGREGATE_TYPE, ORDER_AGGREGATE_TYPE,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::payment::{PaymentGateway, PaymentIntent, PaymentIntentStatus};
use crate::read_model::ReadModelStore;
use crate::services::stock_ops::{return_stock, take_stock, StockDecrement};
use crate::services::{CheckoutConfig, OrderTotals};

pub struct CheckoutService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    carts: Arc<dyn ReadModelStore<CustomerId, Cart>>,
    gateway: Arc<dyn PaymentGateway>,
    config: CheckoutConfig,
}

impl<S, B> CheckoutService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        carts: Arc<dyn ReadModelStore<CustomerId, Cart>>,
        gateway: Arc<dyn PaymentGateway>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            dispatcher,
            carts,
            gateway,
            config,
        }
    }

    /// Create a payment intent for the customer's current cart total.
    pub fn create_intent(&self, customer_id: CustomerId) -> Result<PaymentIntent, DispatchError> {
        let cart = self.non_empty_cart(customer_id)?;
        let lines = self.priced_lines(&cart)?;
        let totals = self.totals(&lines);
        Ok(self.gateway.create_intent(totals.total_cents)?)
    }

    /// Confirm checkout against a succeeded payment.
    ///
    /// Returns the placed order's id. Replaying the same payment reference
    /// fails with `Conflict` and leaves stock and orders untouched.
    pub fn confirm(
        &self,
        customer_id: CustomerId,
        payment_reference: &str,
        performed_by: &str,
    ) -> Result<OrderId, DispatchError> {
        // 1) A held claim means this reference already bought an order.
        // Checked before the cart so a replay of a finished confirmation
        // surfaces as a conflict, not as an empty cart.
        let claim_id = PaymentClaimId::for_reference(payment_reference);
        let (claim, _) = self
            .dispatcher
            .load_aggregate(claim_id.0, |id| PaymentClaim::empty(PaymentClaimId::new(id)))?;
        if claim.is_held() {
            return Err(DispatchError::Conflict(
                "payment reference already consumed".to_string(),
            ));
        }

        // 2) Cart, re-priced from the catalog. A snapshot taken when the
        // line was added is never billed as-is.
        let cart = self.non_empty_cart(customer_id)?;
        let lines = self.priced_lines(&cart)?;
        let totals = self.totals(&lines);

        // 3) Payment must have succeeded for exactly this total.
        let intent = self.gateway.retrieve(payment_reference)?;
        if intent.status != PaymentIntentStatus::Succeeded {
            return Err(DispatchError::Validation(
                "payment has not succeeded".to_string(),
            ));
        }
        if intent.amount_cents != totals.total_cents {
            return Err(DispatchError::Validation(format!(
                "payment amount {} does not match order total {}",
                intent.amount_cents, totals.total_cents
            )));
        }

        // 4) Consume the reference. The claim stream is derived from the
        // reference, so a racing confirmation that slipped past the
        // pre-check is still a version conflict here, before any stock
        // moves.
        let order_id = OrderId(AggregateId::new());
        let now = Utc::now();
        self.dispatcher.dispatch(
            claim_id.0,
            CLAIM_AGGREGATE_TYPE,
            PaymentClaimCommand::CapturePayment(CapturePayment {
                claim_id,
                reference: payment_reference.to_string(),
                amount_cents: intent.amount_cents,
                order_id,
                occurred_at: now,
            }),
            |id| PaymentClaim::empty(PaymentClaimId::new(id)),
        )?;

        // 5) Take stock for every line.
        let decrements: Vec<StockDecrement> = lines
            .iter()
            .map(|l| StockDecrement {
                sku: l.sku.clone(),
                quantity: l.quantity,
            })
            .collect();
        let reason = format!("order {}", order_id.0);
        if let Err(err) = take_stock(
            &self.dispatcher,
            &decrements,
            &reason,
            "checkout reverted",
            performed_by,
        ) {
            self.release_claim(claim_id, "checkout failed");
            return Err(err);
        }

        // 6) Place the order, already paid.
        let place = OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            customer_id,
            lines,
            tax_cents: totals.tax_cents,
            shipping_cents: totals.shipping_cents,
            discount_cents: totals.discount_cents,
            status: OrderStatus::Processing,
            payment_status: PaymentStatus::Paid,
            payment_reference: Some(payment_reference.to_string()),
            occurred_at: now,
        });
        if let Err(err) =
            self.dispatcher
                .dispatch(order_id.0, ORDER_AGGREGATE_TYPE, place, |id| {
                    Order::empty(OrderId::new(id))
                })
        {
            return_stock(
                &self.dispatcher,
                &decrements,
                "checkout reverted",
                performed_by,
            );
            self.release_claim(claim_id, "checkout failed");
            return Err(err);
        }

        // 7) The cart is spent.
        let mut cleared = cart;
        cleared.clear(Utc::now());
        self.carts.upsert(customer_id, cleared);

        Ok(order_id)
    }

    fn non_empty_cart(&self, customer_id: CustomerId) -> Result<Cart, DispatchError> {
        self.carts
            .get(&customer_id)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| DispatchError::Validation("cart is empty".to_string()))
    }

    /// Rebuild order lines from the write-side catalog state.
    fn priced_lines(&self, cart: &Cart) -> Result<Vec<OrderLine>, DispatchError> {
        let mut lines = Vec::with_capacity(cart.lines().len());
        for (idx, line) in cart.lines().iter().enumerate() {
            let (product, _) = self
                .dispatcher
                .load_aggregate(line.product_id.0, |id| Product::empty(ProductId::new(id)))?;
            if !product.exists() {
                return Err(DispatchError::NotFound);
            }
            if !product.can_be_sold() {
                return Err(DispatchError::Conflict(format!(
                    "product {} is no longer available",
                    product.sku()
                )));
            }
            let unit_price_cents = product.price_cents();
            lines.push(OrderLine {
                line_no: (idx + 1) as u32,
                product_id: line.product_id,
                sku: product.sku().to_string(),
                product_name: product.name().to_string(),
                quantity: line.quantity,
                unit_price_cents,
                line_total_cents: unit_price_cents.saturating_mul(line.quantity),
            });
        }
        Ok(lines)
    }

    fn totals(&self, lines: &[OrderLine]) -> OrderTotals {
        let subtotal = lines.iter().map(|l| l.line_total_cents).sum();
        self.config.totals_for(subtotal)
    }

    fn release_claim(&self, claim_id: PaymentClaimId, reason: &str) {
        let release = PaymentClaimCommand::ReleasePayment(ReleasePayment {
            claim_id,
            reason: reason.to_string(),
            occurred_at: Utc::now(),
        });
        let result = self
            .dispatcher
            .dispatch(claim_id.0, CLAIM_AGGREGATE_TYPE, release, |id| {
                PaymentClaim::empty(PaymentClaimId::new(id))
            });
        if let Err(err) = result {
            tracing::error!(
                claim = %claim_id,
                error = ?err,
                "failed to release payment claim after aborted checkout"
            );
        }
    }
}
