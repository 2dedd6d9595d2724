use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{EmergencyOrder, NewEmergencyOrder, NewPharmacyResponse},
    traits::SweepResult,
};

/// Persistence for emergency orders.
///
/// Every method that changes an order's status must apply its guard and its write as one atomic step, so that two
/// racing callers can never both succeed. Implementations must not check the guard in application code and then write.
#[allow(async_fn_in_trait)]
pub trait EmergencyOrderStore {
    /// Stores a new order with status `pending` and returns it with its assigned id.
    async fn insert_emergency_order(&self, order: NewEmergencyOrder) -> Result<EmergencyOrder, DispatchError>;

    async fn fetch_emergency_order(&self, order_id: i64) -> Result<Option<EmergencyOrder>, DispatchError>;

    /// Appends `response` to the order's responses.
    ///
    /// Succeeds only if, at the moment of the write, the order exists, its status is `pending`, the responding pharmacy
    /// is one of its targets, and that pharmacy has not responded before. An acceptance also moves the order to
    /// `accepted` and records the pharmacy as the accepted one, as part of the same write.
    ///
    /// Any failed precondition results in [`DispatchError::Conflict`], and nothing is written.
    async fn record_response(
        &self,
        order_id: i64,
        response: NewPharmacyResponse,
    ) -> Result<EmergencyOrder, DispatchError>;

    /// Moves the order to `canceled`, provided it belongs to `requester_id` and is `pending` or `no_response`.
    /// Otherwise [`DispatchError::Conflict`] is returned.
    async fn cancel_emergency_order(
        &self,
        order_id: i64,
        requester_id: i64,
        now: DateTime<Utc>,
    ) -> Result<EmergencyOrder, DispatchError>;

    /// Moves an `accepted` order to `fulfilled`. Any other current status results in [`DispatchError::Conflict`].
    async fn mark_order_fulfilled(&self, order_id: i64, now: DateTime<Utc>) -> Result<EmergencyOrder, DispatchError>;

    /// Moves every `pending` order whose response deadline is before `now` to `no_response`, in one set-based update.
    /// Responses are left untouched. Running it again with the same `now` changes nothing.
    async fn expire_overdue_orders(&self, now: DateTime<Utc>) -> Result<SweepResult, DispatchError>;

    /// All orders created by the given user, newest first.
    async fn fetch_orders_for_requester(&self, requester_id: i64) -> Result<Vec<EmergencyOrder>, DispatchError>;

    /// Pending orders that target the given pharmacy, high priority first, then oldest first.
    async fn fetch_pending_orders_for_pharmacy(&self, pharmacy_id: i64)
        -> Result<Vec<EmergencyOrder>, DispatchError>;
}

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Not found. {0}")]
    NotFound(String),
    #[error("Conflict. {0}")]
    Conflict(String),
    #[error("Forbidden. {0}")]
    Forbidden(String),
    #[error("Internal database error: {0}")]
    DatabaseError(String),
}

impl DispatchError {
    pub fn not_available_for_response() -> Self {
        Self::Conflict("Order not available for response".to_string())
    }
}

impl From<sqlx::Error> for DispatchError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                DispatchError::Conflict(format!("Duplicate record. {db}"))
            },
            _ => DispatchError::DatabaseError(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_messages_read_cleanly() {
        let err = DispatchError::DatabaseError("disk I/O error".into());
        assert_eq!(err.to_string(), "Internal database error: disk I/O error");
        assert_eq!(DispatchError::not_available_for_response().to_string(), "Conflict. Order not available for response");
    }
}
