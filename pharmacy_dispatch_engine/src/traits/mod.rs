//! # Backend contracts
//!
//! This module defines the behaviour a storage backend must provide to drive the emergency order flow.
//!
//! * [`EmergencyOrderStore`] persists emergency orders and performs every guarded status transition atomically.
//! * [`MarketplaceDirectory`] is the read-only view onto the rest of the marketplace: the product catalog, user
//!   locations and the geospatial pharmacy directory.
//! * [`DispatchBackend`] is shorthand for a backend that provides both, which is what
//!   [`crate::EmergencyOrderApi`] needs.
mod data_objects;
mod emergency_order_store;
mod marketplace_directory;

pub use data_objects::SweepResult;
pub use emergency_order_store::{DispatchError, EmergencyOrderStore};
pub use marketplace_directory::MarketplaceDirectory;

/// A backend that can both store emergency orders and answer marketplace directory queries.
pub trait DispatchBackend: EmergencyOrderStore + MarketplaceDirectory {}

impl<T> DispatchBackend for T where T: EmergencyOrderStore + MarketplaceDirectory {}
