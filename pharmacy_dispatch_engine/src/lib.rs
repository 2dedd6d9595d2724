//! Pharmacy Dispatch Engine
//!
//! When a customer urgently needs a medicine, they raise an *emergency order*. The engine picks a small set of nearby
//! pharmacies that carry the product, broadcasts the order to them, collects their accept/reject responses, and closes
//! the order out when it is fulfilled, cancelled or left unanswered past its deadline.
//!
//! The library is divided into the following sections:
//! 1. The data types ([`mod@db_types`]) shared by every layer.
//! 2. The backend contracts ([`mod@traits`]). Storage backends implement these in order to drive the emergency order
//!    flow. A SQLite backend ships with the crate behind the default `sqlite` feature.
//! 3. Pharmacy targeting ([`mod@dispatch`]). Pure scoring and selection, with no storage access.
//! 4. The public API ([`EmergencyOrderApi`]). This is what an HTTP layer or a scheduled job talks to.
pub mod db_types;
pub mod dispatch;
pub mod traits;

mod dispatch_api;

#[cfg(feature = "sqlite")]
mod sqlite;

pub use dispatch_api::{emergency_order_api::EmergencyOrderApi, order_objects};
#[cfg(feature = "sqlite")]
pub use sqlite::{db as sqlite_db, SqliteDatabase};
pub use traits::{DispatchBackend, DispatchError, EmergencyOrderStore, MarketplaceDirectory, SweepResult};
