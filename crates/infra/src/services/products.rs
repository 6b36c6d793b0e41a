//! Product lifecycle service.
//!
//! Creating a product opens its stock record in the same call, so every
//! listed SKU has a ledger from day one. The two streams are separate
//! aggregates; if opening stock fails the product still exists, and the
//! error surfaces so the caller can retry.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;

use shopforge_catalog::{
    ActivateProduct, ChangePrice, CreateProduct, DeactivateProduct, Product, ProductCommand,
    ProductId, SetFeatured, SetRating, UpdateDetails, PRODUCT_AGGREGATE_TYPE,
};
use shopforge_events::{EventBus, EventEnvelope};
use shopforge_inventory::{
    MovementType, OpenStock, RecordMovement, StockCommand, StockRecord, StockRecordId,
    STOCK_AGGREGATE_TYPE,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;

/// Input for a product creation, including its opening stock position.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub price_cents: u64,
    pub cost_cents: u64,
    pub featured: bool,
    pub threshold: u64,
    pub initial_stock: u64,
}

pub struct ProductService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
}

impl<S, B> ProductService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self { dispatcher }
    }

    /// Create a product and open its stock record.
    ///
    /// The product id is derived from the SKU, so creating the same SKU
    /// twice targets the same stream and fails with a conflict instead of
    /// listing a duplicate.
    pub fn create(
        &self,
        input: NewProduct,
        performed_by: &str,
    ) -> Result<ProductId, DispatchError> {
        let product_id = ProductId::for_sku(&input.sku);
        let stock_id = StockRecordId::for_sku(&input.sku);
        let now = Utc::now();

        self.dispatcher.dispatch(
            product_id.0,
            PRODUCT_AGGREGATE_TYPE,
            ProductCommand::CreateProduct(CreateProduct {
                product_id,
                sku: input.sku.clone(),
                name: input.name,
                description: input.description,
                category: input.category,
                tags: input.tags,
                price_cents: input.price_cents,
                cost_cents: input.cost_cents,
                featured: input.featured,
                occurred_at: now,
            }),
            |id| Product::empty(ProductId::new(id)),
        )?;

        self.dispatcher.dispatch(
            stock_id.0,
            STOCK_AGGREGATE_TYPE,
            StockCommand::OpenStock(OpenStock {
                stock_id,
                sku: input.sku,
                threshold: input.threshold,
                occurred_at: now,
            }),
            |id| StockRecord::empty(StockRecordId::new(id)),
        )?;

        if input.initial_stock > 0 {
            self.dispatcher.dispatch(
                stock_id.0,
                STOCK_AGGREGATE_TYPE,
                StockCommand::RecordMovement(RecordMovement {
                    stock_id,
                    movement_type: MovementType::In,
                    quantity: input.initial_stock,
                    reason: "initial stock".to_string(),
                    performed_by: performed_by.to_string(),
                    occurred_at: now,
                }),
                |id| StockRecord::empty(StockRecordId::new(id)),
            )?;
        }

        Ok(product_id)
    }

    pub fn update_details(
        &self,
        product_id: ProductId,
        name: String,
        description: String,
        category: String,
        tags: Vec<String>,
    ) -> Result<(), DispatchError> {
        self.dispatch_product(
            product_id,
            ProductCommand::UpdateDetails(UpdateDetails {
                product_id,
                name,
                description,
                category,
                tags,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn change_price(
        &self,
        product_id: ProductId,
        price_cents: u64,
        cost_cents: u64,
    ) -> Result<(), DispatchError> {
        self.dispatch_product(
            product_id,
            ProductCommand::ChangePrice(ChangePrice {
                product_id,
                price_cents,
                cost_cents,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn set_rating(&self, product_id: ProductId, rating: f64) -> Result<(), DispatchError> {
        self.dispatch_product(
            product_id,
            ProductCommand::SetRating(SetRating {
                product_id,
                rating,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn set_featured(&self, product_id: ProductId, featured: bool) -> Result<(), DispatchError> {
        self.dispatch_product(
            product_id,
            ProductCommand::SetFeatured(SetFeatured {
                product_id,
                featured,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn activate(&self, product_id: ProductId) -> Result<(), DispatchError> {
        self.dispatch_product(
            product_id,
            ProductCommand::ActivateProduct(ActivateProduct {
                product_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    pub fn deactivate(&self, product_id: ProductId) -> Result<(), DispatchError> {
        self.dispatch_product(
            product_id,
            ProductCommand::DeactivateProduct(DeactivateProduct {
                product_id,
                occurred_at: Utc::now(),
            }),
        )
    }

    fn dispatch_product(
        &self,
        product_id: ProductId,
        command: ProductCommand,
    ) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(
            product_id.0,
            PRODUCT_AGGREGATE_TYPE,
            command,
            |id| Product::empty(ProductId::new(id)),
        )?;
        Ok(())
    }
}
