//! Infrastructure layer: event store, bus, dispatcher, projections, services.

pub mod command_dispatcher;
pub mod event_bus;
pub mod event_store;
pub mod payment;
pub mod projections;
pub mod read_model;
pub mod services;

#[cfg(test)]
mod integration_tests;
