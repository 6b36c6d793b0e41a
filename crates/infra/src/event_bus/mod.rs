//! Infrastructure event bus implementations.
//!
//! The core event bus abstraction lives in `shopforge-events` as pure
//! mechanics. This module provides infrastructure-backed implementations.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{RedisBusError, RedisPubSubEventBus};
