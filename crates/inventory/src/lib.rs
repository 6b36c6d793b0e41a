//! Inventory domain module (event-sourced).
//!
//! The stock record for a SKU is an append-only ledger: every accepted
//! command appends exactly one movement carrying the balance before and
//! after it, and the current balance is the fold of the stream. History
//! and running total can never disagree because they are the same data.

pub mod movement;
pub mod stock;

pub use movement::MovementType;
pub use stock::{
    MovementRecorded, OpenStock, RecordMovement, SetThreshold, StockCommand, StockEvent,
    StockOpened, StockRecord, StockRecordId, ThresholdSet, STOCK_AGGREGATE_TYPE,
};
