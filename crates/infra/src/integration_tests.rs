//! Integration tests for the full event-sourced pipeline.
//!
//! Tests: Command → EventStore → EventBus → Projection → ReadModel, plus
//! the multi-stream reconcilers on top (checkout, cancellation, sales).
//!
//! Verifies:
//! - Checkout converges: failure after capture leaves no stock taken
//! - A payment reference confirms at most one order
//! - Cancellation restocks exactly once
//! - Projections stay consistent with the write side

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use serde_json::Value as JsonValue;

    use shopforge_catalog::ProductId;
    use shopforge_events::{EventBus, EventEnvelope, InMemoryEventBus};
    use shopforge_inventory::{StockRecord, StockRecordId};
    use shopforge_orders::{Cart, CustomerId, OrderId, OrderStatus, PaymentStatus};

    use crate::command_dispatcher::{CommandDispatcher, DispatchError};
    use crate::event_store::InMemoryEventStore;
    use crate::payment::InMemoryPaymentGateway;
    use crate::projections::{
        CatalogEntry, CatalogProjection, OrderReadModel, OrdersProjection, SaleReadModel,
        SalesProjection, StockLevelRow, StockLevelsProjection,
    };
    use crate::read_model::{InMemoryReadModelStore, ReadModelStore};
    use crate::services::{
        CartService, CheckoutConfig, CheckoutService, ManualSaleLine, NewOrderLine, NewProduct,
        OrderService, ProductService, SaleService,
    };

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
    type Dispatcher = Arc<CommandDispatcher<InMemoryEventStore, Bus>>;

    struct Harness {
        dispatcher: Dispatcher,
        products: ProductService<InMemoryEventStore, Bus>,
        cart: CartService<InMemoryEventStore, Bus>,
        checkout: CheckoutService<InMemoryEventStore, Bus>,
        orders: OrderService<InMemoryEventStore, Bus>,
        sales: SaleService<InMemoryEventStore, Bus>,
        gateway: Arc<InMemoryPaymentGateway>,
        catalog_rm: Arc<CatalogProjection<InMemoryReadModelStore<ProductId, CatalogEntry>>>,
        stock_rm: Arc<StockLevelsProjection<InMemoryReadModelStore<String, StockLevelRow>>>,
        orders_rm: Arc<OrdersProjection<InMemoryReadModelStore<OrderId, OrderReadModel>>>,
        sales_rm: Arc<SalesProjection<InMemoryReadModelStore<shopforge_sales::SaleId, SaleReadModel>>>,
    }

    fn config() -> CheckoutConfig {
        CheckoutConfig {
            shipping_flat_cents: 500,
            tax_rate_bps: 0,
        }
    }

    fn setup(auto_settle: bool) -> Harness {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let dispatcher: Dispatcher = Arc::new(CommandDispatcher::new(
            InMemoryEventStore::new(),
            bus.clone(),
        ));

        let catalog_rm = Arc::new(CatalogProjection::new(InMemoryReadModelStore::new()));
        let stock_rm = Arc::new(StockLevelsProjection::new(InMemoryReadModelStore::new()));
        let orders_rm = Arc::new(OrdersProjection::new(InMemoryReadModelStore::new()));
        let sales_rm = Arc::new(SalesProjection::new(InMemoryReadModelStore::new()));

        // Subscribe to the bus BEFORE any events are published.
        let (ready_tx, ready_rx) = mpsc::channel::<()>();
        {
            let bus = bus.clone();
            let catalog_rm = catalog_rm.clone();
            let stock_rm = stock_rm.clone();
            let orders_rm = orders_rm.clone();
            let sales_rm = sales_rm.clone();
            thread::spawn(move || {
                let sub = bus.subscribe();
                let _ = ready_tx.send(());
                while let Ok(env) = sub.recv() {
                    if let Err(e) = catalog_rm.apply_envelope(&env) {
                        eprintln!("catalog projection failed: {e:?}");
                    }
                    if let Err(e) = stock_rm.apply_envelope(&env) {
                        eprintln!("stock projection failed: {e:?}");
                    }
                    if let Err(e) = orders_rm.apply_envelope(&env) {
                        eprintln!("orders projection failed: {e:?}");
                    }
                    if let Err(e) = sales_rm.apply_envelope(&env) {
                        eprintln!("sales projection failed: {e:?}");
                    }
                }
            });
        }
        // Ensure the subscriber is ready before returning (prevents missing early events).
        let _ = ready_rx.recv_timeout(Duration::from_secs(1));

        let carts: Arc<dyn ReadModelStore<CustomerId, Cart>> =
            Arc::new(InMemoryReadModelStore::new());
        let gateway = Arc::new(InMemoryPaymentGateway::new(auto_settle));

        Harness {
            products: ProductService::new(dispatcher.clone()),
            cart: CartService::new(dispatcher.clone(), carts.clone()),
            checkout: CheckoutService::new(
                dispatcher.clone(),
                carts,
                gateway.clone(),
                config(),
            ),
            orders: OrderService::new(dispatcher.clone(), config()),
            sales: SaleService::new(dispatcher.clone()),
            gateway,
            dispatcher,
            catalog_rm,
            stock_rm,
            orders_rm,
            sales_rm,
        }
    }

    /// Wait a short time for the subscriber thread to drain the bus.
    fn wait_for_processing() {
        thread::sleep(Duration::from_millis(50));
    }

    fn seed_product(h: &Harness, sku: &str, price_cents: u64, initial_stock: u64) {
        h.products
            .create(
                NewProduct {
                    sku: sku.to_string(),
                    name: format!("Product {sku}"),
                    description: String::new(),
                    category: "test".to_string(),
                    tags: vec![],
                    price_cents,
                    cost_cents: price_cents / 2,
                    featured: false,
                    threshold: 1,
                    initial_stock,
                },
                "admin",
            )
            .unwrap();
    }

    fn stock_of(h: &Harness, sku: &str) -> u64 {
        let stock_id = StockRecordId::for_sku(sku);
        let (stock, _) = h
            .dispatcher
            .load_aggregate(stock_id.0, |id| StockRecord::empty(StockRecordId::new(id)))
            .unwrap();
        stock.stock()
    }

    #[test]
    fn checkout_places_a_paid_order_and_clears_the_cart() {
        let h = setup(true);
        seed_product(&h, "SKU-1", 2500, 10);
        let customer = CustomerId::for_subject("alice");

        h.cart.add_item(customer, "SKU-1", 2).unwrap();
        let intent = h.checkout.create_intent(customer).unwrap();
        // 2 * 2500 + 500 shipping
        assert_eq!(intent.amount_cents, 5500);

        let order_id = h.checkout.confirm(customer, &intent.reference, "alice").unwrap();

        assert_eq!(stock_of(&h, "SKU-1"), 8);
        assert!(h.cart.get(customer).is_empty());

        wait_for_processing();
        let order = h.orders_rm.get(&order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(order.total_cents, 5500);
        assert_eq!(order.payment_reference.as_deref(), Some(intent.reference.as_str()));

        let row = h.stock_rm.get("SKU-1").unwrap();
        assert_eq!(row.stock, 8);
    }

    #[test]
    fn a_payment_reference_confirms_at_most_one_order() {
        let h = setup(true);
        seed_product(&h, "SKU-1", 1000, 10);
        let customer = CustomerId::for_subject("alice");

        h.cart.add_item(customer, "SKU-1", 1).unwrap();
        let intent = h.checkout.create_intent(customer).unwrap();
        h.checkout.confirm(customer, &intent.reference, "alice").unwrap();

        // Same reference again, against a refilled cart of equal total.
        h.cart.add_item(customer, "SKU-1", 1).unwrap();
        let err = h
            .checkout
            .confirm(customer, &intent.reference, "alice")
            .unwrap_err();
        match err {
            DispatchError::Conflict(_) => {}
            other => panic!("Expected Conflict for a consumed reference, got {other:?}"),
        }

        // Only the first confirmation took stock.
        assert_eq!(stock_of(&h, "SKU-1"), 9);
    }

    #[test]
    fn replaying_a_confirmation_with_an_empty_cart_is_still_a_conflict() {
        let h = setup(true);
        seed_product(&h, "SKU-1", 1000, 10);
        let customer = CustomerId::for_subject("alice");

        h.cart.add_item(customer, "SKU-1", 1).unwrap();
        let intent = h.checkout.create_intent(customer).unwrap();
        h.checkout.confirm(customer, &intent.reference, "alice").unwrap();
        assert!(h.cart.get(customer).is_empty());

        // The consumed reference is reported ahead of the empty cart.
        let err = h
            .checkout
            .confirm(customer, &intent.reference, "alice")
            .unwrap_err();
        match err {
            DispatchError::Conflict(_) => {}
            other => panic!("Expected Conflict for a consumed reference, got {other:?}"),
        }
        assert_eq!(stock_of(&h, "SKU-1"), 9);
    }

    #[test]
    fn failed_checkout_compensates_and_releases_the_claim() {
        let h = setup(true);
        seed_product(&h, "SKU-A", 1000, 10);
        seed_product(&h, "SKU-B", 1000, 3);
        let customer = CustomerId::for_subject("alice");

        h.cart.add_item(customer, "SKU-A", 2).unwrap();
        h.cart.add_item(customer, "SKU-B", 3).unwrap();
        let intent = h.checkout.create_intent(customer).unwrap();

        // A competing sale empties SKU-B between intent and confirmation.
        h.sales
            .record_manual(
                &[ManualSaleLine {
                    sku: "SKU-B".to_string(),
                    quantity: 2,
                }],
                "staff",
            )
            .unwrap();

        let err = h
            .checkout
            .confirm(customer, &intent.reference, "alice")
            .unwrap_err();
        match err {
            DispatchError::InsufficientStock { requested: 3, available: 1 } => {}
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }

        // Nothing taken, cart intact.
        assert_eq!(stock_of(&h, "SKU-A"), 10);
        assert_eq!(stock_of(&h, "SKU-B"), 1);
        assert!(!h.cart.get(customer).is_empty());

        // The claim was released; after fixing the cart a fresh intent
        // for the corrected total goes through.
        h.cart
            .set_quantity(customer, ProductId::for_sku("SKU-B"), 1)
            .unwrap();
        let retry_intent = h.checkout.create_intent(customer).unwrap();
        h.checkout.confirm(customer, &retry_intent.reference, "alice").unwrap();
        assert_eq!(stock_of(&h, "SKU-A"), 8);
        assert_eq!(stock_of(&h, "SKU-B"), 0);
    }

    #[test]
    fn unsettled_payment_cannot_confirm() {
        let h = setup(false);
        seed_product(&h, "SKU-1", 1000, 5);
        let customer = CustomerId::for_subject("alice");

        h.cart.add_item(customer, "SKU-1", 1).unwrap();
        let intent = h.checkout.create_intent(customer).unwrap();

        let err = h
            .checkout
            .confirm(customer, &intent.reference, "alice")
            .unwrap_err();
        match err {
            DispatchError::Validation(msg) => assert!(msg.contains("not succeeded")),
            other => panic!("Expected Validation, got {other:?}"),
        }
        assert_eq!(stock_of(&h, "SKU-1"), 5);

        h.gateway.settle(&intent.reference).unwrap();
        h.checkout.confirm(customer, &intent.reference, "alice").unwrap();
        assert_eq!(stock_of(&h, "SKU-1"), 4);
    }

    #[test]
    fn price_change_invalidates_the_intent_amount() {
        let h = setup(true);
        seed_product(&h, "SKU-1", 1000, 5);
        let customer = CustomerId::for_subject("alice");

        h.cart.add_item(customer, "SKU-1", 1).unwrap();
        let intent = h.checkout.create_intent(customer).unwrap();

        h.products
            .change_price(ProductId::for_sku("SKU-1"), 1200, 600)
            .unwrap();

        let err = h
            .checkout
            .confirm(customer, &intent.reference, "alice")
            .unwrap_err();
        match err {
            DispatchError::Validation(msg) => assert!(msg.contains("does not match")),
            other => panic!("Expected Validation for amount mismatch, got {other:?}"),
        }
        assert_eq!(stock_of(&h, "SKU-1"), 5);
    }

    #[test]
    fn cancellation_restocks_exactly_once() {
        let h = setup(true);
        seed_product(&h, "SKU-1", 1000, 10);
        let customer = CustomerId::for_subject("alice");

        let order_id = h
            .orders
            .create_direct(
                customer,
                &[NewOrderLine {
                    sku: "SKU-1".to_string(),
                    quantity: 4,
                }],
                "staff",
            )
            .unwrap();
        assert_eq!(stock_of(&h, "SKU-1"), 6);

        h.orders.cancel(order_id, "customer changed mind", "staff").unwrap();
        assert_eq!(stock_of(&h, "SKU-1"), 10);

        // A second cancel is rejected and must not restock again.
        let err = h
            .orders
            .cancel(order_id, "again", "staff")
            .unwrap_err();
        match err {
            DispatchError::Conflict(_) => {}
            other => panic!("Expected Conflict for double cancel, got {other:?}"),
        }
        assert_eq!(stock_of(&h, "SKU-1"), 10);

        wait_for_processing();
        assert_eq!(h.orders_rm.get(&order_id).unwrap().status, OrderStatus::Cancelled);
    }

    #[test]
    fn order_sale_records_at_most_once_and_takes_no_stock() {
        let h = setup(true);
        seed_product(&h, "SKU-1", 1000, 10);
        let customer = CustomerId::for_subject("alice");

        h.cart.add_item(customer, "SKU-1", 2).unwrap();
        let intent = h.checkout.create_intent(customer).unwrap();
        let order_id = h.checkout.confirm(customer, &intent.reference, "alice").unwrap();
        assert_eq!(stock_of(&h, "SKU-1"), 8);

        let sale_id = h.sales.record_for_order(order_id, "staff").unwrap();
        // Recording the sale moves no stock; checkout already did.
        assert_eq!(stock_of(&h, "SKU-1"), 8);

        let err = h.sales.record_for_order(order_id, "staff").unwrap_err();
        match err {
            DispatchError::Conflict(_) => {}
            other => panic!("Expected Conflict for duplicate sale, got {other:?}"),
        }

        wait_for_processing();
        let sale = h.sales_rm.get(&sale_id).unwrap();
        assert_eq!(sale.order_id, Some(order_id));
        assert_eq!(sale.revenue_cents, 2000);
        assert_eq!(sale.profit_cents, 1000);
    }

    #[test]
    fn projections_follow_the_catalog() {
        let h = setup(true);
        seed_product(&h, "SKU-1", 2500, 10);

        wait_for_processing();
        let entry = h.catalog_rm.get_by_sku("SKU-1").unwrap();
        assert_eq!(entry.price_cents, 2500);
        assert_eq!(entry.stock, 10);
        assert!(entry.active);

        h.products
            .deactivate(ProductId::for_sku("SKU-1"))
            .unwrap();
        wait_for_processing();
        let entry = h.catalog_rm.get_by_sku("SKU-1").unwrap();
        assert!(!entry.active);
    }
}
