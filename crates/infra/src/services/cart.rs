//! Cart service with the stock guard.
//!
//! The guard runs against write-side state, not a projection: adding or
//! resizing a line rehydrates the product and its stock record from their
//! streams and checks the requested quantity against the current balance.
//! Nothing is reserved; the same check runs again at confirmation.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use shopforge_catalog::{Product, ProductId};
use shopforge_events::{EventBus, EventEnvelope};
use shopforge_inventory::{StockRecord, StockRecordId};
use shopforge_orders::{Cart, CartLine, CustomerId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::read_model::ReadModelStore;

pub struct CartService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    carts: Arc<dyn ReadModelStore<CustomerId, Cart>>,
}

impl<S, B> CartService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        carts: Arc<dyn ReadModelStore<CustomerId, Cart>>,
    ) -> Self {
        Self { dispatcher, carts }
    }

    /// The customer's cart; customers who have never added anything get an
    /// empty one.
    pub fn get(&self, customer_id: CustomerId) -> Cart {
        self.carts
            .get(&customer_id)
            .unwrap_or_else(|| Cart::new(customer_id, Utc::now()))
    }

    /// Add `quantity` units of a SKU, merging with any existing line.
    ///
    /// Guards: the product must exist and be sellable, and the line's new
    /// total quantity must be available in stock.
    pub fn add_item(
        &self,
        customer_id: CustomerId,
        sku: &str,
        quantity: u64,
    ) -> Result<Cart, DispatchError> {
        let product_id = ProductId::for_sku(sku);
        let (product, _) = self
            .dispatcher
            .load_aggregate(product_id.0, |id| Product::empty(ProductId::new(id)))?;
        if !product.exists() {
            return Err(DispatchError::NotFound);
        }
        if !product.can_be_sold() {
            return Err(DispatchError::Conflict(format!(
                "product {sku} is not available for sale"
            )));
        }

        let mut cart = self.get(customer_id);
        let requested = cart.quantity_of(product_id).saturating_add(quantity);
        self.ensure_stock(product.sku(), requested)?;

        let now = Utc::now();
        cart.add_line(
            CartLine {
                product_id,
                sku: product.sku().to_string(),
                name: product.name().to_string(),
                unit_price_cents: product.price_cents(),
                quantity,
            },
            now,
        )?;
        self.carts.upsert(customer_id, cart.clone());
        Ok(cart)
    }

    /// Replace the quantity of an existing line, re-running the stock guard
    /// against the new total.
    pub fn set_quantity(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u64,
    ) -> Result<Cart, DispatchError> {
        let mut cart = self.get(customer_id);
        let sku = cart
            .lines()
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.sku.clone())
            .ok_or(DispatchError::NotFound)?;
        self.ensure_stock(&sku, quantity)?;

        cart.set_quantity(product_id, quantity, Utc::now())?;
        self.carts.upsert(customer_id, cart.clone());
        Ok(cart)
    }

    pub fn remove_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<Cart, DispatchError> {
        let mut cart = self.get(customer_id);
        cart.remove_line(product_id, Utc::now())?;
        self.carts.upsert(customer_id, cart.clone());
        Ok(cart)
    }

    pub fn clear(&self, customer_id: CustomerId) -> Cart {
        let mut cart = self.get(customer_id);
        cart.clear(Utc::now());
        self.carts.upsert(customer_id, cart.clone());
        cart
    }

    fn ensure_stock(&self, sku: &str, requested: u64) -> Result<(), DispatchError> {
        let stock_id = StockRecordId::for_sku(sku);
        let (stock, _) = self
            .dispatcher
            .load_aggregate(stock_id.0, |id| StockRecord::empty(StockRecordId::new(id)))?;
        if !stock.exists() {
            return Err(DispatchError::NotFound);
        }
        stock.ensure_available(requested)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopforge_events::InMemoryEventBus;

    use crate::event_store::InMemoryEventStore;
    use crate::read_model::InMemoryReadModelStore;
    use crate::services::products::{NewProduct, ProductService};

    type Store = InMemoryEventStore;
    type Bus = InMemoryEventBus<EventEnvelope<JsonValue>>;

    fn setup(initial_stock: u64) -> (CartService<Store, Bus>, CustomerId) {
        let dispatcher = Arc::new(CommandDispatcher::new(Store::new(), Bus::new()));
        let products = ProductService::new(dispatcher.clone());
        products
            .create(
                NewProduct {
                    sku: "SKU-1".to_string(),
                    name: "Anvil".to_string(),
                    description: String::new(),
                    category: "tools".to_string(),
                    tags: vec![],
                    price_cents: 2500,
                    cost_cents: 1000,
                    featured: false,
                    threshold: 0,
                    initial_stock,
                },
                "admin",
            )
            .unwrap();

        let carts: Arc<dyn ReadModelStore<CustomerId, Cart>> =
            Arc::new(InMemoryReadModelStore::new());
        (
            CartService::new(dispatcher, carts),
            CustomerId::for_subject("alice"),
        )
    }

    #[test]
    fn add_item_snapshots_the_product() {
        let (service, customer) = setup(10);
        let cart = service.add_item(customer, "SKU-1", 2).unwrap();

        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.lines()[0].unit_price_cents, 2500);
        assert_eq!(cart.subtotal_cents(), 5000);
    }

    #[test]
    fn guard_counts_the_existing_line() {
        let (service, customer) = setup(5);
        service.add_item(customer, "SKU-1", 3).unwrap();

        // 3 in the cart + 3 more would exceed the 5 available.
        let err = service.add_item(customer, "SKU-1", 3).unwrap_err();
        match err {
            DispatchError::InsufficientStock {
                requested: 6,
                available: 5,
            } => {}
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }

        // The failed add left the cart untouched.
        assert_eq!(service.get(customer).total_quantity(), 3);
    }

    #[test]
    fn unknown_sku_is_not_found() {
        let (service, customer) = setup(5);
        let err = service.add_item(customer, "SKU-MISSING", 1).unwrap_err();
        match err {
            DispatchError::NotFound => {}
            other => panic!("Expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn set_quantity_reruns_the_guard() {
        let (service, customer) = setup(5);
        let product_id = ProductId::for_sku("SKU-1");
        service.add_item(customer, "SKU-1", 2).unwrap();

        let cart = service.set_quantity(customer, product_id, 5).unwrap();
        assert_eq!(cart.quantity_of(product_id), 5);

        let err = service.set_quantity(customer, product_id, 6).unwrap_err();
        match err {
            DispatchError::InsufficientStock { .. } => {}
            other => panic!("Expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn remove_and_clear() {
        let (service, customer) = setup(5);
        let product_id = ProductId::for_sku("SKU-1");
        service.add_item(customer, "SKU-1", 2).unwrap();

        let cart = service.remove_item(customer, product_id).unwrap();
        assert!(cart.is_empty());

        let err = service.remove_item(customer, product_id).unwrap_err();
        match err {
            DispatchError::NotFound => {}
            other => panic!("Expected NotFound for missing line, got {other:?}"),
        }

        service.add_item(customer, "SKU-1", 2).unwrap();
        assert!(service.clear(customer).is_empty());
    }
}
