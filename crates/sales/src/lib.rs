//! Sales domain module (event-sourced).
//!
//! A sale is the revenue-side record of units leaving the building: what
//! was sold, at what price, against what cost. Order-derived sales link
//! back to their order and are recorded at most once per order; manual
//! sales (walk-in, phone) stand alone.

pub mod sale;

pub use sale::{
    RecordSale, Sale, SaleCommand, SaleEvent, SaleId, SaleLine, SaleRecorded,
    SALE_AGGREGATE_TYPE,
};
