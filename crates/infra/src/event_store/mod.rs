//! Append-only event store boundary.
//!
//! Infrastructure-facing abstraction for storing and loading event streams
//! without making storage assumptions: an in-memory implementation for
//! tests/dev and a Postgres implementation for production.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::{EventFilter, EventQuery, EventQueryResult, Pagination};
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
