//! HTTP edge of the system: axum routers, auth middleware, and the wiring
//! that assembles stores, bus, projections, and services into one app.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
