//! # Pharmacy Dispatch Server
//! This crate hosts the HTTP server for emergency medicine orders. It is responsible for:
//! * Accepting emergency orders from customers and broadcasting them to the best nearby pharmacies.
//! * Collecting accept/reject responses from the targeted pharmacies.
//! * Letting requesters cancel, and requesters or the accepted pharmacy fulfil, orders.
//! * Periodically expiring orders that nobody accepted in time (see [timeout_sweeper]).
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/emergency-orders`, `/api/my/emergency-orders` and `/api/pharmacy/emergency-orders`: see [routes].
//!
//! Every `/api` route expects the caller identity headers described in [identity].

pub mod cli;
pub mod config;
pub mod errors;
pub mod identity;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod timeout_sweeper;

#[cfg(test)]
mod endpoint_tests;
