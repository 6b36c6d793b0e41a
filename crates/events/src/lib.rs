//! `shopforge-events` — event trait, envelopes, and pub/sub mechanics.
//!
//! Domain crates define their event payloads; this crate defines what makes
//! them events (typing, versioning, business time), the envelope they travel
//! in, and the bus that carries committed envelopes to projections.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod handler;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use handler::execute;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
