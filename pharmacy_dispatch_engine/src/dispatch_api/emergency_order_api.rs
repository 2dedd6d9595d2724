use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;

use crate::{
    db_types::{EmergencyOrder, EmergencyStatus, NewEmergencyOrder, NewPharmacyResponse},
    dispatch::{select_targets, DispatchPolicy, MAX_RESPONSE_TIMEOUT_MINUTES},
    dispatch_api::order_objects::{Caller, NewEmergencyOrderRequest, PharmacyResponseRequest},
    traits::{DispatchBackend, DispatchError, SweepResult},
};

/// `EmergencyOrderApi` is the primary API for the emergency order flow.
///
/// An order moves through the following states. No other transitions are legal.
///
/// | From \ To   | accepted | fulfilled | canceled | no_response |
/// |-------------|----------|-----------|----------|-------------|
/// | pending     | 1        | Err       | 3        | 2           |
/// | accepted    | Err      | 4         | Err      | Err         |
/// | no_response | Err      | Err       | 3        | Err         |
/// | fulfilled   | Err      | Err       | Err      | Err         |
/// | canceled    | Err      | Err       | Err      | Err         |
///
/// 1. A targeted pharmacy accepts ([`Self::respond_to_order`]). First accept wins.
/// 2. The response deadline passes without an acceptance ([`Self::process_order_timeouts`]).
/// 3. The requester cancels ([`Self::cancel_order`]).
/// 4. The requester or the accepted pharmacy closes the order ([`Self::fulfill_order`]).
pub struct EmergencyOrderApi<B> {
    db: B,
    policy: DispatchPolicy,
}

impl<B> Debug for EmergencyOrderApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EmergencyOrderApi ({:?})", self.policy)
    }
}

impl<B> EmergencyOrderApi<B> {
    pub fn new(db: B, policy: DispatchPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B> EmergencyOrderApi<B>
where B: DispatchBackend
{
    /// Creates an emergency order and picks the pharmacies it is broadcast to.
    ///
    /// 1. The medicine name must not be blank, and neither may the delivery address.
    /// 2. The search location is the one in the request, or failing that, the requester's stored location.
    /// 3. The medicine name is resolved against the catalog (first case-insensitive substring match).
    /// 4. Active pharmacies within the policy radius are scored and the best eligible ones are targeted (see
    ///    [`crate::dispatch`]).
    ///
    /// ## Failure modes
    /// * [`DispatchError::ValidationError`] for blank fields or an out-of-range response timeout.
    /// * [`DispatchError::NotFound`] if there is no location, no matching product, or no eligible pharmacy. No order is
    ///   stored in these cases.
    pub async fn create_smart_emergency_order(
        &self,
        requester_id: i64,
        request: NewEmergencyOrderRequest,
    ) -> Result<EmergencyOrder, DispatchError> {
        let medicine = request.requested_medicine_name.trim();
        if medicine.is_empty() {
            return Err(DispatchError::ValidationError("requestedMedicineName is required".into()));
        }
        let delivery_address = request.delivery_address.trim();
        if delivery_address.is_empty() {
            return Err(DispatchError::ValidationError("deliveryAddress is required".into()));
        }
        let timeout = self.response_timeout(request.response_timeout_minutes)?;
        let location = match request.location {
            Some(location) => location,
            None => self.db.fetch_user_location(requester_id).await?.ok_or_else(|| {
                debug!("🚑️ User #{requester_id} sent no location and has none on file");
                DispatchError::NotFound("User location not found".into())
            })?,
        };
        let product = self
            .db
            .find_product_by_name(medicine)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("No product matches '{medicine}'")))?;
        trace!("🚑️ '{medicine}' resolved to product #{} ({})", product.id, product.name);
        let candidates = self.db.active_pharmacies_near(&location, self.policy.radius_m).await?;
        let targets = select_targets(&candidates, product.id, &self.policy);
        debug!(
            "🚑️ {} of {} pharmacies near {location} are eligible for product #{}",
            targets.len(),
            candidates.len(),
            product.id
        );
        if targets.is_empty() {
            return Err(DispatchError::NotFound("No nearby pharmacies currently have this product in stock".into()));
        }
        let now = Utc::now();
        let order = NewEmergencyOrder {
            requester_id,
            product_id: product.id,
            requested_medicine_name: product.name,
            additional_notes: request.additional_notes.trim().to_string(),
            delivery_address: delivery_address.to_string(),
            location,
            priority: request.priority,
            targets,
            response_deadline: now + timeout,
            created_at: now,
        };
        let order = self.db.insert_emergency_order(order).await?;
        info!(
            "🚑️ Emergency order #{} for '{}' broadcast to pharmacies {:?}. Responses due by {}",
            order.id, order.requested_medicine_name, order.targeted_pharmacy_ids, order.response_deadline
        );
        Ok(order)
    }

    fn response_timeout(&self, minutes: Option<i64>) -> Result<Duration, DispatchError> {
        match minutes {
            None => Ok(self.policy.default_response_timeout),
            Some(m) if (1..=MAX_RESPONSE_TIMEOUT_MINUTES).contains(&m) => Ok(Duration::minutes(m)),
            Some(m) => Err(DispatchError::ValidationError(format!(
                "responseTimeoutMinutes must be between 1 and {MAX_RESPONSE_TIMEOUT_MINUTES}, got {m}"
            ))),
        }
    }

    /// Records a targeted pharmacy's decision on a pending order.
    ///
    /// Only pharmacists may respond, and they always respond on behalf of their own pharmacy. Each pharmacy gets exactly
    /// one response per order: a pharmacy that rejected cannot later accept. Rejections leave the order `pending`, even
    /// if every target has rejected; the timeout sweep takes care of those.
    ///
    /// ## Failure modes
    /// * [`DispatchError::Forbidden`] if the caller is not a pharmacist.
    /// * [`DispatchError::Conflict`] if the order does not exist, is no longer pending, does not target this pharmacy,
    ///   or already has a response from it.
    pub async fn respond_to_order(
        &self,
        order_id: i64,
        caller: &Caller,
        request: PharmacyResponseRequest,
    ) -> Result<EmergencyOrder, DispatchError> {
        let pharmacy_id = caller
            .pharmacy_id()
            .ok_or_else(|| DispatchError::Forbidden("Only pharmacists can respond to emergency orders".into()))?;
        let response = NewPharmacyResponse {
            pharmacy_id,
            decision: request.decision,
            rejection_reason: request.normalized_reason(),
            responded_at: Utc::now(),
        };
        let order = self.db.record_response(order_id, response).await.map_err(|e| {
            debug!("🚑️ Pharmacy #{pharmacy_id} could not respond to order #{order_id}. {e}");
            e
        })?;
        info!("🚑️ Pharmacy #{pharmacy_id} {} emergency order #{order_id}", request.decision);
        Ok(order)
    }

    /// Cancels an order on behalf of its requester. Only `pending` and `no_response` orders can be cancelled.
    ///
    /// Returns [`DispatchError::Conflict`] if the order is missing, belongs to someone else, or is in any other status.
    pub async fn cancel_order(&self, order_id: i64, requester_id: i64) -> Result<EmergencyOrder, DispatchError> {
        let order = self.db.cancel_emergency_order(order_id, requester_id, Utc::now()).await?;
        info!("🚑️ Emergency order #{order_id} canceled by user #{requester_id}");
        Ok(order)
    }

    /// Marks an accepted order as fulfilled. The caller must be the requester, or a pharmacist of the accepted pharmacy.
    ///
    /// ## Failure modes
    /// * [`DispatchError::NotFound`] if the order does not exist.
    /// * [`DispatchError::Forbidden`] if the caller is neither the requester nor the accepted pharmacy.
    /// * [`DispatchError::Conflict`] if the order is not `accepted`.
    pub async fn fulfill_order(&self, order_id: i64, caller: &Caller) -> Result<EmergencyOrder, DispatchError> {
        let order = self.fetch_existing_order(order_id).await?;
        let is_requester = caller.user_id() == order.requester_id;
        let is_accepted_pharmacy = caller.pharmacy_id().is_some() && caller.pharmacy_id() == order.accepted_pharmacy_id;
        if !(is_requester || is_accepted_pharmacy) {
            return Err(DispatchError::Forbidden(format!("{caller} may not fulfill emergency order #{order_id}")));
        }
        if order.status != EmergencyStatus::Accepted {
            return Err(DispatchError::Conflict(format!(
                "Emergency order #{order_id} is {}. Only accepted orders can be fulfilled",
                order.status
            )));
        }
        let order = self.db.mark_order_fulfilled(order_id, Utc::now()).await?;
        info!("🚑️ Emergency order #{order_id} fulfilled by {caller}");
        Ok(order)
    }

    /// Fetches a single order. The requester and every targeted pharmacy may see it.
    pub async fn fetch_order(&self, order_id: i64, caller: &Caller) -> Result<EmergencyOrder, DispatchError> {
        let order = self.fetch_existing_order(order_id).await?;
        let visible = caller.user_id() == order.requester_id
            || caller.pharmacy_id().map(|p| order.is_targeted(p)).unwrap_or(false);
        if visible {
            Ok(order)
        } else {
            Err(DispatchError::Forbidden(format!("{caller} may not view emergency order #{order_id}")))
        }
    }

    async fn fetch_existing_order(&self, order_id: i64) -> Result<EmergencyOrder, DispatchError> {
        self.db
            .fetch_emergency_order(order_id)
            .await?
            .ok_or_else(|| DispatchError::NotFound(format!("Emergency order #{order_id} does not exist")))
    }

    /// All emergency orders the user has created, newest first.
    pub async fn orders_for_user(&self, user_id: i64) -> Result<Vec<EmergencyOrder>, DispatchError> {
        self.db.fetch_orders_for_requester(user_id).await
    }

    /// Pending orders that target the pharmacy, high priority first, then oldest first.
    pub async fn pending_orders_for_pharmacy(&self, pharmacy_id: i64) -> Result<Vec<EmergencyOrder>, DispatchError> {
        self.db.fetch_pending_orders_for_pharmacy(pharmacy_id).await
    }

    /// Expires every pending order whose response deadline has passed. Safe to call at any cadence.
    pub async fn process_order_timeouts(&self) -> Result<SweepResult, DispatchError> {
        self.process_order_timeouts_at(Utc::now()).await
    }

    /// As [`Self::process_order_timeouts`], but with an explicit notion of "now".
    pub async fn process_order_timeouts_at(&self, now: DateTime<Utc>) -> Result<SweepResult, DispatchError> {
        let result = self.db.expire_overdue_orders(now).await?;
        if !result.is_empty() {
            info!("🚑️ {} emergency orders received no acceptance in time: {:?}", result.count(), result.expired);
        }
        Ok(result)
    }
}
