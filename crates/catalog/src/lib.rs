//! Catalog domain module (event-sourced).
//!
//! This crate contains business rules for the product catalog, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod product;

pub use product::{
    ActivateProduct, ChangePrice, CreateProduct, DeactivateProduct, Product, ProductActivated,
    ProductCommand, ProductCreated, ProductDeactivated, ProductDetailsUpdated, ProductEvent,
    ProductFeaturedSet, ProductId, ProductPriceChanged, ProductRatingSet, SetFeatured, SetRating,
    UpdateDetails, PRODUCT_AGGREGATE_TYPE,
};
