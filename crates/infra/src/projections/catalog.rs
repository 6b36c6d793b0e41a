//! Catalog read model: browsable product listing with live stock levels.
//!
//! Joins two streams onto one row. Product events carry the catalog fields;
//! stock events from the inventory streams are folded in through the
//! SKU-derived product id, so shoppers see availability without a second
//! lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use shopforge_catalog::{ProductEvent, ProductId, PRODUCT_AGGREGATE_TYPE};
use shopforge_events::EventEnvelope;
use shopforge_inventory::{StockEvent, STOCK_AGGREGATE_TYPE};

use crate::projections::{sort_for_replay, ProjectionError, StreamCursors};
use crate::read_model::ReadModelStore;

/// One catalog row, denormalized for browsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: Vec<String>,
    pub price_cents: u64,
    pub cost_cents: u64,
    pub rating: Option<f64>,
    pub featured: bool,
    pub active: bool,
    pub stock: u64,
    pub threshold: u64,
    pub created_at: DateTime<Utc>,
    /// False while only stock events have been seen for this SKU.
    pub created: bool,
}

impl CatalogEntry {
    fn placeholder(product_id: ProductId, sku: String, occurred_at: DateTime<Utc>) -> Self {
        Self {
            product_id,
            sku,
            name: String::new(),
            description: String::new(),
            category: String::new(),
            tags: Vec::new(),
            price_cents: 0,
            cost_cents: 0,
            rating: None,
            featured: false,
            active: false,
            stock: 0,
            threshold: 0,
            created_at: occurred_at,
            created: false,
        }
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    pub fn below_threshold(&self) -> bool {
        self.stock <= self.threshold
    }
}

/// Sort order for catalog queries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogSort {
    #[default]
    NameAsc,
    PriceAsc,
    PriceDesc,
    RatingDesc,
    Newest,
}

/// Catalog filter. All filters are conjunctive; `None` means "no constraint".
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    /// Case-insensitive substring over name, description, and tags.
    pub search: Option<String>,
    pub category: Option<String>,
    pub min_price_cents: Option<u64>,
    pub max_price_cents: Option<u64>,
    pub min_rating: Option<f64>,
    pub in_stock: Option<bool>,
    pub featured: Option<bool>,
    /// Inactive products are hidden unless explicitly requested.
    pub include_inactive: bool,
    pub sort: CatalogSort,
    pub limit: u32,
    pub offset: u32,
}

impl CatalogQuery {
    pub const DEFAULT_LIMIT: u32 = 20;

    fn matches(&self, entry: &CatalogEntry) -> bool {
        if !entry.created {
            return false;
        }
        if !self.include_inactive && !entry.active {
            return false;
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let in_name = entry.name.to_lowercase().contains(&needle);
            let in_description = entry.description.to_lowercase().contains(&needle);
            let in_tags = entry
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(&needle));
            if !(in_name || in_description || in_tags) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if !entry.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(min) = self.min_price_cents {
            if entry.price_cents < min {
                return false;
            }
        }
        if let Some(max) = self.max_price_cents {
            if entry.price_cents > max {
                return false;
            }
        }
        if let Some(min_rating) = self.min_rating {
            if entry.rating.is_none_or(|r| r < min_rating) {
                return false;
            }
        }
        if let Some(in_stock) = self.in_stock {
            if entry.in_stock() != in_stock {
                return false;
            }
        }
        if let Some(featured) = self.featured {
            if entry.featured != featured {
                return false;
            }
        }
        true
    }
}

/// One page of catalog results.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogPage {
    pub items: Vec<CatalogEntry>,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

/// Projects product and stock events into [`CatalogEntry`] rows.
pub struct CatalogProjection<S> {
    store: S,
    cursors: StreamCursors,
}

impl<S> CatalogProjection<S>
where
    S: ReadModelStore<ProductId, CatalogEntry>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// Look up one catalog row. Rows that exist only as stock placeholders
    /// are not visible.
    pub fn get(&self, product_id: &ProductId) -> Option<CatalogEntry> {
        self.store.get(product_id).filter(|e| e.created)
    }

    pub fn get_by_sku(&self, sku: &str) -> Option<CatalogEntry> {
        self.get(&ProductId::for_sku(sku))
    }

    /// Filter, sort, and paginate the catalog.
    pub fn query(&self, query: &CatalogQuery) -> CatalogPage {
        let mut items: Vec<CatalogEntry> = self
            .store
            .list()
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();

        match query.sort {
            CatalogSort::NameAsc => {
                items.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            }
            CatalogSort::PriceAsc => items.sort_by_key(|e| e.price_cents),
            CatalogSort::PriceDesc => items.sort_by_key(|e| std::cmp::Reverse(e.price_cents)),
            CatalogSort::RatingDesc => {
                // Unrated products sort last.
                items.sort_by(|a, b| {
                    b.rating
                        .unwrap_or(-1.0)
                        .total_cmp(&a.rating.unwrap_or(-1.0))
                });
            }
            CatalogSort::Newest => items.sort_by_key(|e| std::cmp::Reverse(e.created_at)),
        }

        let total = items.len() as u64;
        let limit = if query.limit == 0 {
            CatalogQuery::DEFAULT_LIMIT
        } else {
            query.limit
        } as usize;
        let offset = query.offset as usize;

        let items: Vec<CatalogEntry> = items.into_iter().skip(offset).take(limit).collect();
        CatalogPage {
            has_next: (offset + limit) < total as usize,
            has_prev: offset > 0,
            items,
            total,
        }
    }

    /// Apply a published envelope. Envelopes from unrelated streams are
    /// ignored.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        match envelope.aggregate_type() {
            PRODUCT_AGGREGATE_TYPE => self.cursors.apply_guarded(envelope, || {
                let event: ProductEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
                self.apply_product_event(envelope, &event)
            }),
            STOCK_AGGREGATE_TYPE => self.cursors.apply_guarded(envelope, || {
                let event: StockEvent = serde_json::from_value(envelope.payload().clone())
                    .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;
                self.apply_stock_event(envelope, &event)
            }),
            _ => Ok(()),
        }
    }

    fn apply_product_event(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        event: &ProductEvent,
    ) -> Result<(), ProjectionError> {
        let product_id = match event {
            ProductEvent::ProductCreated(e) => e.product_id,
            ProductEvent::ProductDetailsUpdated(e) => e.product_id,
            ProductEvent::ProductPriceChanged(e) => e.product_id,
            ProductEvent::ProductRatingSet(e) => e.product_id,
            ProductEvent::ProductFeaturedSet(e) => e.product_id,
            ProductEvent::ProductActivated(e) => e.product_id,
            ProductEvent::ProductDeactivated(e) => e.product_id,
        };
        if product_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::StreamMismatch(format!(
                "product {} in stream {}",
                product_id.0,
                envelope.aggregate_id()
            )));
        }

        match event {
            ProductEvent::ProductCreated(e) => {
                // Stock events for this SKU may have arrived first; keep
                // whatever balance the placeholder accumulated.
                let mut entry = self
                    .store
                    .get(&product_id)
                    .unwrap_or_else(|| {
                        CatalogEntry::placeholder(product_id, e.sku.clone(), e.occurred_at)
                    });
                entry.sku = e.sku.clone();
                entry.name = e.name.clone();
                entry.description = e.description.clone();
                entry.category = e.category.clone();
                entry.tags = e.tags.clone();
                entry.price_cents = e.price_cents;
                entry.cost_cents = e.cost_cents;
                entry.rating = None;
                entry.featured = e.featured;
                entry.active = true;
                entry.created_at = e.occurred_at;
                entry.created = true;
                self.store.upsert(product_id, entry);
            }
            ProductEvent::ProductDetailsUpdated(e) => {
                if let Some(mut entry) = self.store.get(&product_id) {
                    entry.name = e.name.clone();
                    entry.description = e.description.clone();
                    entry.category = e.category.clone();
                    entry.tags = e.tags.clone();
                    self.store.upsert(product_id, entry);
                }
            }
            ProductEvent::ProductPriceChanged(e) => {
                if let Some(mut entry) = self.store.get(&product_id) {
                    entry.price_cents = e.price_cents;
                    entry.cost_cents = e.cost_cents;
                    self.store.upsert(product_id, entry);
                }
            }
            ProductEvent::ProductRatingSet(e) => {
                if let Some(mut entry) = self.store.get(&product_id) {
                    entry.rating = Some(e.rating);
                    self.store.upsert(product_id, entry);
                }
            }
            ProductEvent::ProductFeaturedSet(e) => {
                if let Some(mut entry) = self.store.get(&product_id) {
                    entry.featured = e.featured;
                    self.store.upsert(product_id, entry);
                }
            }
            ProductEvent::ProductActivated(_) => {
                if let Some(mut entry) = self.store.get(&product_id) {
                    entry.active = true;
                    self.store.upsert(product_id, entry);
                }
            }
            ProductEvent::ProductDeactivated(_) => {
                if let Some(mut entry) = self.store.get(&product_id) {
                    entry.active = false;
                    self.store.upsert(product_id, entry);
                }
            }
        }

        Ok(())
    }

    fn apply_stock_event(
        &self,
        envelope: &EventEnvelope<JsonValue>,
        event: &StockEvent,
    ) -> Result<(), ProjectionError> {
        let (stock_id, sku) = match event {
            StockEvent::StockOpened(e) => (e.stock_id, &e.sku),
            StockEvent::MovementRecorded(e) => (e.stock_id, &e.sku),
            StockEvent::ThresholdSet(e) => (e.stock_id, &e.sku),
        };
        if stock_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::StreamMismatch(format!(
                "stock record {} in stream {}",
                stock_id.0,
                envelope.aggregate_id()
            )));
        }

        // The join key: a product's catalog row and its stock record share
        // the same SKU.
        let product_id = ProductId::for_sku(sku);
        let mut entry = self.store.get(&product_id).unwrap_or_else(|| {
            let occurred_at = match event {
                StockEvent::StockOpened(e) => e.occurred_at,
                StockEvent::MovementRecorded(e) => e.occurred_at,
                StockEvent::ThresholdSet(e) => e.occurred_at,
            };
            CatalogEntry::placeholder(product_id, sku.clone(), occurred_at)
        });

        match event {
            StockEvent::StockOpened(e) => {
                entry.stock = 0;
                entry.threshold = e.threshold;
            }
            StockEvent::MovementRecorded(e) => {
                entry.stock = e.new_stock;
            }
            StockEvent::ThresholdSet(e) => {
                entry.threshold = e.threshold;
            }
        }
        self.store.upsert(product_id, entry);

        Ok(())
    }

    /// Drop all state and replay the given envelopes in stream order.
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
