//! # Emergency order public API
//!
//! [`emergency_order_api`] exposes the emergency order flow: smart creation (dispatch), pharmacy responses,
//! cancellation, fulfilment, listings and the timeout sweep. [`order_objects`] holds the request objects and the
//! caller identity those calls take.
//!
//! As with every API in this crate, an instance is created by handing it a backend that implements the traits it needs:
//!
//! ```rust,ignore
//! use pharmacy_dispatch_engine::{dispatch::DispatchPolicy, EmergencyOrderApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! // SqliteDatabase implements EmergencyOrderStore and MarketplaceDirectory
//! let api = EmergencyOrderApi::new(db, DispatchPolicy::default());
//! let order = api.create_smart_emergency_order(requester_id, request).await?;
//! ```

pub mod emergency_order_api;
pub mod order_objects;
