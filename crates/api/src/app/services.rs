//! Application wiring: event store, bus, projections, and domain services
//! assembled into one [`AppServices`] value shared via `Extension`.
//!
//! Two profiles exist behind the same surface: fully in-memory (default)
//! and Postgres + Redis pub/sub behind the `redis` cargo feature, selected
//! at startup via `USE_PERSISTENT_STORES`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use chrono::Utc;
use serde_json::Value as JsonValue;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use shopforge_catalog::{ProductId, PRODUCT_AGGREGATE_TYPE};
use shopforge_core::AggregateId;
use shopforge_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use shopforge_inventory::{
    MovementType, RecordMovement, SetThreshold, StockCommand, StockRecord, StockRecordId,
    STOCK_AGGREGATE_TYPE,
};
use shopforge_orders::{Cart, CustomerId, OrderId, OrderStatus, ORDER_AGGREGATE_TYPE};
use shopforge_sales::{SaleId, SALE_AGGREGATE_TYPE};

use shopforge_infra::command_dispatcher::{CommandDispatcher, DispatchError};
use shopforge_infra::event_store::{
    EventFilter, EventQuery, EventQueryResult, EventStoreError, InMemoryEventStore, Pagination,
    StoredEvent,
};
#[cfg(feature = "redis")]
use shopforge_infra::event_store::PostgresEventStore;
#[cfg(feature = "redis")]
use shopforge_infra::event_bus::RedisPubSubEventBus;
use shopforge_infra::payment::{InMemoryPaymentGateway, PaymentGateway, PaymentIntent};
use shopforge_infra::projections::{
    CatalogEntry, CatalogPage, CatalogProjection, CatalogQuery, OrderReadModel, OrdersProjection,
    SaleReadModel, SalesProjection, SalesTotals, StockLevelRow, StockLevelsProjection,
};
use shopforge_infra::read_model::{InMemoryReadModelStore, ReadModelStore};
use shopforge_infra::services::{
    CartService, CheckoutConfig, CheckoutService, ManualSaleLine, NewOrderLine, NewProduct,
    OrderService, ProductService, SaleService,
};

type JsonEnvelope = EventEnvelope<JsonValue>;
type InMemoryBus = Arc<InMemoryEventBus<JsonEnvelope>>;

pub type InMemoryDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, InMemoryBus>;
#[cfg(feature = "redis")]
pub type PersistentDispatcher =
    CommandDispatcher<Arc<PostgresEventStore>, Arc<RedisPubSubEventBus>>;

type CatalogRm = Arc<CatalogProjection<InMemoryReadModelStore<ProductId, CatalogEntry>>>;
type StockRm = Arc<StockLevelsProjection<InMemoryReadModelStore<String, StockLevelRow>>>;
type OrdersRm = Arc<OrdersProjection<InMemoryReadModelStore<OrderId, OrderReadModel>>>;
type SalesRm = Arc<SalesProjection<InMemoryReadModelStore<SaleId, SaleReadModel>>>;

/// Message fanned out to SSE subscribers whenever a projection advances.
#[derive(Debug, Clone)]
pub struct RealtimeMessage {
    pub topic: String,
    pub payload: JsonValue,
}

pub enum AppServices {
    InMemory {
        dispatcher: Arc<InMemoryDispatcher>,
        event_store: Arc<InMemoryEventStore>,
        products: ProductService<Arc<InMemoryEventStore>, InMemoryBus>,
        cart: CartService<Arc<InMemoryEventStore>, InMemoryBus>,
        checkout: CheckoutService<Arc<InMemoryEventStore>, InMemoryBus>,
        orders: OrderService<Arc<InMemoryEventStore>, InMemoryBus>,
        sales: SaleService<Arc<InMemoryEventStore>, InMemoryBus>,
        catalog: CatalogRm,
        stock_levels: StockRm,
        orders_rm: OrdersRm,
        sales_rm: SalesRm,
        realtime_tx: broadcast::Sender<RealtimeMessage>,
    },
    #[cfg(feature = "redis")]
    Persistent {
        dispatcher: Arc<PersistentDispatcher>,
        event_store: Arc<PostgresEventStore>,
        products: ProductService<Arc<PostgresEventStore>, Arc<RedisPubSubEventBus>>,
        cart: CartService<Arc<PostgresEventStore>, Arc<RedisPubSubEventBus>>,
        checkout: CheckoutService<Arc<PostgresEventStore>, Arc<RedisPubSubEventBus>>,
        orders: OrderService<Arc<PostgresEventStore>, Arc<RedisPubSubEventBus>>,
        sales: SaleService<Arc<PostgresEventStore>, Arc<RedisPubSubEventBus>>,
        catalog: CatalogRm,
        stock_levels: StockRm,
        orders_rm: OrdersRm,
        sales_rm: SalesRm,
        realtime_tx: broadcast::Sender<RealtimeMessage>,
    },
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .map(|v| v == "true")
        .unwrap_or(false);

    if use_persistent {
        #[cfg(feature = "redis")]
        {
            return build_persistent_services().await;
        }
        #[cfg(not(feature = "redis"))]
        tracing::warn!(
            "USE_PERSISTENT_STORES=true but the redis feature is disabled; using in-memory stores"
        );
    }

    build_in_memory_services()
}

fn env_flag(name: &str, default: bool) -> bool {
    std::env::var(name).map(|v| v == "true").unwrap_or(default)
}

fn build_in_memory_services() -> AppServices {
    let store = Arc::new(InMemoryEventStore::new());
    let bus: InMemoryBus = Arc::new(InMemoryEventBus::new());

    let catalog: CatalogRm = Arc::new(CatalogProjection::new(InMemoryReadModelStore::new()));
    let stock_levels: StockRm =
        Arc::new(StockLevelsProjection::new(InMemoryReadModelStore::new()));
    let orders_rm: OrdersRm = Arc::new(OrdersProjection::new(InMemoryReadModelStore::new()));
    let sales_rm: SalesRm = Arc::new(SalesProjection::new(InMemoryReadModelStore::new()));

    // Lossy broadcast for SSE; slow consumers drop messages, not the core.
    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    // Subscribe before the first command so no event is missed.
    let sub = bus.subscribe();
    spawn_projection_worker(
        sub,
        catalog.clone(),
        stock_levels.clone(),
        orders_rm.clone(),
        sales_rm.clone(),
        realtime_tx.clone(),
    );

    let dispatcher: Arc<InMemoryDispatcher> =
        Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));

    let carts: Arc<dyn ReadModelStore<CustomerId, Cart>> =
        Arc::new(InMemoryReadModelStore::new());
    let gateway: Arc<dyn PaymentGateway> = Arc::new(InMemoryPaymentGateway::new(env_flag(
        "PAYMENT_AUTO_SETTLE",
        true,
    )));
    let config = CheckoutConfig::from_env();

    AppServices::InMemory {
        products: ProductService::new(dispatcher.clone()),
        cart: CartService::new(dispatcher.clone(), carts.clone()),
        checkout: CheckoutService::new(dispatcher.clone(), carts, gateway, config),
        orders: OrderService::new(dispatcher.clone(), config),
        sales: SaleService::new(dispatcher.clone()),
        dispatcher,
        event_store: store,
        catalog,
        stock_levels,
        orders_rm,
        sales_rm,
        realtime_tx,
    }
}

#[cfg(feature = "redis")]
async fn build_persistent_services() -> AppServices {
    use sqlx::PgPool;

    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");
    let store = Arc::new(PostgresEventStore::new(pool));

    let bus = Arc::new(
        RedisPubSubEventBus::new(&redis_url, "shopforge.events")
            .expect("failed to create Redis pub/sub event bus"),
    );

    // Read models stay in-memory; they are rebuildable from the store.
    let catalog: CatalogRm = Arc::new(CatalogProjection::new(InMemoryReadModelStore::new()));
    let stock_levels: StockRm =
        Arc::new(StockLevelsProjection::new(InMemoryReadModelStore::new()));
    let orders_rm: OrdersRm = Arc::new(OrdersProjection::new(InMemoryReadModelStore::new()));
    let sales_rm: SalesRm = Arc::new(SalesProjection::new(InMemoryReadModelStore::new()));

    let (realtime_tx, _realtime_rx) = broadcast::channel::<RealtimeMessage>(256);

    let sub = bus.subscribe();
    spawn_projection_worker(
        sub,
        catalog.clone(),
        stock_levels.clone(),
        orders_rm.clone(),
        sales_rm.clone(),
        realtime_tx.clone(),
    );

    let dispatcher: Arc<PersistentDispatcher> =
        Arc::new(CommandDispatcher::new(store.clone(), bus.clone()));

    let carts: Arc<dyn ReadModelStore<CustomerId, Cart>> =
        Arc::new(InMemoryReadModelStore::new());
    let gateway: Arc<dyn PaymentGateway> = Arc::new(InMemoryPaymentGateway::new(env_flag(
        "PAYMENT_AUTO_SETTLE",
        false,
    )));
    let config = CheckoutConfig::from_env();

    AppServices::Persistent {
        products: ProductService::new(dispatcher.clone()),
        cart: CartService::new(dispatcher.clone(), carts.clone()),
        checkout: CheckoutService::new(dispatcher.clone(), carts, gateway, config),
        orders: OrderService::new(dispatcher.clone(), config),
        sales: SaleService::new(dispatcher.clone()),
        dispatcher,
        event_store: store,
        catalog,
        stock_levels,
        orders_rm,
        sales_rm,
        realtime_tx,
    }
}

/// Background worker: bus -> projections -> SSE broadcast.
///
/// Delivery is at-least-once and projections are cursor-guarded, so a
/// redelivered envelope is a no-op. A failed apply is logged and skipped;
/// the read model can be rebuilt from the store.
fn spawn_projection_worker(
    sub: Subscription<JsonEnvelope>,
    catalog: CatalogRm,
    stock_levels: StockRm,
    orders_rm: OrdersRm,
    sales_rm: SalesRm,
    realtime_tx: broadcast::Sender<RealtimeMessage>,
) {
    tokio::task::spawn_blocking(move || loop {
        match sub.recv() {
            Ok(env) => {
                let at = env.aggregate_type();
                let apply_ok = match at {
                    PRODUCT_AGGREGATE_TYPE => {
                        catalog.apply_envelope(&env).map_err(|e| e.to_string())
                    }
                    // Stock events feed both the ledger rows and the
                    // catalog's availability join.
                    STOCK_AGGREGATE_TYPE => catalog
                        .apply_envelope(&env)
                        .and_then(|_| stock_levels.apply_envelope(&env))
                        .map_err(|e| e.to_string()),
                    ORDER_AGGREGATE_TYPE => {
                        orders_rm.apply_envelope(&env).map_err(|e| e.to_string())
                    }
                    SALE_AGGREGATE_TYPE => {
                        sales_rm.apply_envelope(&env).map_err(|e| e.to_string())
                    }
                    // Payment claims carry no read model.
                    _ => Ok(()),
                };

                if let Err(e) = apply_ok {
                    tracing::warn!("projection apply failed: {e}");
                    continue;
                }

                let _ = realtime_tx.send(RealtimeMessage {
                    topic: format!("{at}.projection_updated"),
                    payload: serde_json::json!({
                        "kind": "projection_update",
                        "aggregate_type": at,
                        "aggregate_id": env.aggregate_id().to_string(),
                        "sequence_number": env.sequence_number(),
                    }),
                });
            }
            Err(_) => break,
        }
    });
}

impl AppServices {
    pub fn realtime_tx(&self) -> &broadcast::Sender<RealtimeMessage> {
        match self {
            AppServices::InMemory { realtime_tx, .. } => realtime_tx,
            #[cfg(feature = "redis")]
            AppServices::Persistent { realtime_tx, .. } => realtime_tx,
        }
    }

    // ── Catalog ────────────────────────────────────────────────────────

    pub fn product_create(
        &self,
        input: NewProduct,
        performed_by: &str,
    ) -> Result<ProductId, DispatchError> {
        match self {
            AppServices::InMemory { products, .. } => products.create(input, performed_by),
            #[cfg(feature = "redis")]
            AppServices::Persistent { products, .. } => products.create(input, performed_by),
        }
    }

    pub fn product_update_details(
        &self,
        product_id: ProductId,
        name: String,
        description: String,
        category: String,
        tags: Vec<String>,
    ) -> Result<(), DispatchError> {
        match self {
            AppServices::InMemory { products, .. } => {
                products.update_details(product_id, name, description, category, tags)
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { products, .. } => {
                products.update_details(product_id, name, description, category, tags)
            }
        }
    }

    pub fn product_change_price(
        &self,
        product_id: ProductId,
        price_cents: u64,
        cost_cents: u64,
    ) -> Result<(), DispatchError> {
        match self {
            AppServices::InMemory { products, .. } => {
                products.change_price(product_id, price_cents, cost_cents)
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { products, .. } => {
                products.change_price(product_id, price_cents, cost_cents)
            }
        }
    }

    pub fn product_set_rating(
        &self,
        product_id: ProductId,
        rating: f64,
    ) -> Result<(), DispatchError> {
        match self {
            AppServices::InMemory { products, .. } => products.set_rating(product_id, rating),
            #[cfg(feature = "redis")]
            AppServices::Persistent { products, .. } => products.set_rating(product_id, rating),
        }
    }

    pub fn product_set_featured(
        &self,
        product_id: ProductId,
        featured: bool,
    ) -> Result<(), DispatchError> {
        match self {
            AppServices::InMemory { products, .. } => products.set_featured(product_id, featured),
            #[cfg(feature = "redis")]
            AppServices::Persistent { products, .. } => products.set_featured(product_id, featured),
        }
    }

    pub fn product_activate(&self, product_id: ProductId) -> Result<(), DispatchError> {
        match self {
            AppServices::InMemory { products, .. } => products.activate(product_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { products, .. } => products.activate(product_id),
        }
    }

    pub fn product_deactivate(&self, product_id: ProductId) -> Result<(), DispatchError> {
        match self {
            AppServices::InMemory { products, .. } => products.deactivate(product_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { products, .. } => products.deactivate(product_id),
        }
    }

    pub fn catalog_get(&self, product_id: &ProductId) -> Option<CatalogEntry> {
        match self {
            AppServices::InMemory { catalog, .. } => catalog.get(product_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { catalog, .. } => catalog.get(product_id),
        }
    }

    pub fn catalog_query(&self, query: &CatalogQuery) -> CatalogPage {
        match self {
            AppServices::InMemory { catalog, .. } => catalog.query(query),
            #[cfg(feature = "redis")]
            AppServices::Persistent { catalog, .. } => catalog.query(query),
        }
    }

    // ── Inventory ──────────────────────────────────────────────────────

    pub fn inventory_record_movement(
        &self,
        sku: &str,
        movement_type: MovementType,
        quantity: u64,
        reason: String,
        performed_by: String,
    ) -> Result<(), DispatchError> {
        let stock_id = StockRecordId::for_sku(sku);
        let cmd = StockCommand::RecordMovement(RecordMovement {
            stock_id,
            movement_type,
            quantity,
            reason,
            performed_by,
            occurred_at: Utc::now(),
        });
        match self {
            AppServices::InMemory { dispatcher, .. } => dispatcher
                .dispatch(stock_id.0, STOCK_AGGREGATE_TYPE, cmd, |id| {
                    StockRecord::empty(StockRecordId::new(id))
                })
                .map(|_| ()),
            #[cfg(feature = "redis")]
            AppServices::Persistent { dispatcher, .. } => dispatcher
                .dispatch(stock_id.0, STOCK_AGGREGATE_TYPE, cmd, |id| {
                    StockRecord::empty(StockRecordId::new(id))
                })
                .map(|_| ()),
        }
    }

    pub fn inventory_set_threshold(
        &self,
        sku: &str,
        threshold: u64,
    ) -> Result<(), DispatchError> {
        let stock_id = StockRecordId::for_sku(sku);
        let cmd = StockCommand::SetThreshold(SetThreshold {
            stock_id,
            threshold,
            occurred_at: Utc::now(),
        });
        match self {
            AppServices::InMemory { dispatcher, .. } => dispatcher
                .dispatch(stock_id.0, STOCK_AGGREGATE_TYPE, cmd, |id| {
                    StockRecord::empty(StockRecordId::new(id))
                })
                .map(|_| ()),
            #[cfg(feature = "redis")]
            AppServices::Persistent { dispatcher, .. } => dispatcher
                .dispatch(stock_id.0, STOCK_AGGREGATE_TYPE, cmd, |id| {
                    StockRecord::empty(StockRecordId::new(id))
                })
                .map(|_| ()),
        }
    }

    pub fn stock_get(&self, sku: &str) -> Option<StockLevelRow> {
        match self {
            AppServices::InMemory { stock_levels, .. } => stock_levels.get(sku),
            #[cfg(feature = "redis")]
            AppServices::Persistent { stock_levels, .. } => stock_levels.get(sku),
        }
    }

    pub fn stock_list(&self) -> Vec<StockLevelRow> {
        match self {
            AppServices::InMemory { stock_levels, .. } => stock_levels.list(),
            #[cfg(feature = "redis")]
            AppServices::Persistent { stock_levels, .. } => stock_levels.list(),
        }
    }

    // ── Cart ───────────────────────────────────────────────────────────

    pub fn cart_get(&self, customer_id: CustomerId) -> Cart {
        match self {
            AppServices::InMemory { cart, .. } => cart.get(customer_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart, .. } => cart.get(customer_id),
        }
    }

    pub fn cart_add_item(
        &self,
        customer_id: CustomerId,
        sku: &str,
        quantity: u64,
    ) -> Result<Cart, DispatchError> {
        match self {
            AppServices::InMemory { cart, .. } => cart.add_item(customer_id, sku, quantity),
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart, .. } => cart.add_item(customer_id, sku, quantity),
        }
    }

    pub fn cart_set_quantity(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u64,
    ) -> Result<Cart, DispatchError> {
        match self {
            AppServices::InMemory { cart, .. } => {
                cart.set_quantity(customer_id, product_id, quantity)
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart, .. } => {
                cart.set_quantity(customer_id, product_id, quantity)
            }
        }
    }

    pub fn cart_remove_item(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<Cart, DispatchError> {
        match self {
            AppServices::InMemory { cart, .. } => cart.remove_item(customer_id, product_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart, .. } => cart.remove_item(customer_id, product_id),
        }
    }

    pub fn cart_clear(&self, customer_id: CustomerId) -> Cart {
        match self {
            AppServices::InMemory { cart, .. } => cart.clear(customer_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { cart, .. } => cart.clear(customer_id),
        }
    }

    // ── Checkout ───────────────────────────────────────────────────────

    pub fn checkout_create_intent(
        &self,
        customer_id: CustomerId,
    ) -> Result<PaymentIntent, DispatchError> {
        match self {
            AppServices::InMemory { checkout, .. } => checkout.create_intent(customer_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { checkout, .. } => checkout.create_intent(customer_id),
        }
    }

    pub fn checkout_confirm(
        &self,
        customer_id: CustomerId,
        payment_reference: &str,
        performed_by: &str,
    ) -> Result<OrderId, DispatchError> {
        match self {
            AppServices::InMemory { checkout, .. } => {
                checkout.confirm(customer_id, payment_reference, performed_by)
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { checkout, .. } => {
                checkout.confirm(customer_id, payment_reference, performed_by)
            }
        }
    }

    // ── Orders ─────────────────────────────────────────────────────────

    pub fn order_create_direct(
        &self,
        customer_id: CustomerId,
        lines: &[NewOrderLine],
        performed_by: &str,
    ) -> Result<OrderId, DispatchError> {
        match self {
            AppServices::InMemory { orders, .. } => {
                orders.create_direct(customer_id, lines, performed_by)
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { orders, .. } => {
                orders.create_direct(customer_id, lines, performed_by)
            }
        }
    }

    pub fn order_update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
    ) -> Result<(), DispatchError> {
        match self {
            AppServices::InMemory { orders, .. } => orders.update_status(order_id, status),
            #[cfg(feature = "redis")]
            AppServices::Persistent { orders, .. } => orders.update_status(order_id, status),
        }
    }

    pub fn order_cancel(
        &self,
        order_id: OrderId,
        reason: &str,
        performed_by: &str,
    ) -> Result<(), DispatchError> {
        match self {
            AppServices::InMemory { orders, .. } => orders.cancel(order_id, reason, performed_by),
            #[cfg(feature = "redis")]
            AppServices::Persistent { orders, .. } => orders.cancel(order_id, reason, performed_by),
        }
    }

    pub fn orders_get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        match self {
            AppServices::InMemory { orders_rm, .. } => orders_rm.get(order_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { orders_rm, .. } => orders_rm.get(order_id),
        }
    }

    pub fn orders_list(&self) -> Vec<OrderReadModel> {
        match self {
            AppServices::InMemory { orders_rm, .. } => orders_rm.list(),
            #[cfg(feature = "redis")]
            AppServices::Persistent { orders_rm, .. } => orders_rm.list(),
        }
    }

    pub fn orders_list_for_customer(&self, customer_id: &CustomerId) -> Vec<OrderReadModel> {
        match self {
            AppServices::InMemory { orders_rm, .. } => orders_rm.list_for_customer(customer_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { orders_rm, .. } => orders_rm.list_for_customer(customer_id),
        }
    }

    // ── Sales ──────────────────────────────────────────────────────────

    pub fn sale_record_for_order(
        &self,
        order_id: OrderId,
        recorded_by: &str,
    ) -> Result<SaleId, DispatchError> {
        match self {
            AppServices::InMemory { sales, .. } => sales.record_for_order(order_id, recorded_by),
            #[cfg(feature = "redis")]
            AppServices::Persistent { sales, .. } => sales.record_for_order(order_id, recorded_by),
        }
    }

    pub fn sale_record_manual(
        &self,
        lines: &[ManualSaleLine],
        recorded_by: &str,
    ) -> Result<SaleId, DispatchError> {
        match self {
            AppServices::InMemory { sales, .. } => sales.record_manual(lines, recorded_by),
            #[cfg(feature = "redis")]
            AppServices::Persistent { sales, .. } => sales.record_manual(lines, recorded_by),
        }
    }

    pub fn sales_get(&self, sale_id: &SaleId) -> Option<SaleReadModel> {
        match self {
            AppServices::InMemory { sales_rm, .. } => sales_rm.get(sale_id),
            #[cfg(feature = "redis")]
            AppServices::Persistent { sales_rm, .. } => sales_rm.get(sale_id),
        }
    }

    pub fn sales_list(&self) -> Vec<SaleReadModel> {
        match self {
            AppServices::InMemory { sales_rm, .. } => sales_rm.list(),
            #[cfg(feature = "redis")]
            AppServices::Persistent { sales_rm, .. } => sales_rm.list(),
        }
    }

    pub fn sales_totals(&self) -> SalesTotals {
        match self {
            AppServices::InMemory { sales_rm, .. } => sales_rm.totals(),
            #[cfg(feature = "redis")]
            AppServices::Persistent { sales_rm, .. } => sales_rm.totals(),
        }
    }

    // ── Event audit ────────────────────────────────────────────────────

    pub async fn query_events(
        &self,
        filter: EventFilter,
        pagination: Pagination,
    ) -> Result<EventQueryResult, EventStoreError> {
        match self {
            AppServices::InMemory { event_store, .. } => {
                event_store.query_events(filter, pagination).await
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { event_store, .. } => {
                event_store.query_events(filter, pagination).await
            }
        }
    }

    pub async fn get_aggregate_events(
        &self,
        aggregate_id: AggregateId,
        pagination: Option<Pagination>,
    ) -> Result<EventQueryResult, EventStoreError> {
        match self {
            AppServices::InMemory { event_store, .. } => {
                event_store.get_aggregate_events(aggregate_id, pagination).await
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { event_store, .. } => {
                event_store.get_aggregate_events(aggregate_id, pagination).await
            }
        }
    }

    pub async fn get_event_by_id(
        &self,
        event_id: uuid::Uuid,
    ) -> Result<Option<StoredEvent>, EventStoreError> {
        match self {
            AppServices::InMemory { event_store, .. } => {
                event_store.get_event_by_id(event_id).await
            }
            #[cfg(feature = "redis")]
            AppServices::Persistent { event_store, .. } => {
                event_store.get_event_by_id(event_id).await
            }
        }
    }
}

/// SSE stream of projection update notifications (used by `/stream`).
pub fn sse_stream(
    services: Arc<AppServices>,
) -> Sse<impl tokio_stream::Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = services.realtime_tx().subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(m) => {
            let data = serde_json::to_string(&m.payload).unwrap_or_else(|_| "{}".to_string());
            Some(Ok(SseEvent::default().event(m.topic).data(data)))
        }
        // Lagged receivers skip messages; clients reconcile via reads.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}
