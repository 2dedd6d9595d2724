use std::fmt::Display;

use chrono::{DateTime, Utc};
use pds_common::GeoPoint;
use serde::{Deserialize, Serialize};
use sqlx::Type;

use crate::dispatch::ScoredPharmacy;

//--------------------------------------   EmergencyStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    /// The order has been broadcast and is waiting for a targeted pharmacy to accept it.
    Pending,
    /// Exactly one targeted pharmacy has accepted the order.
    Accepted,
    /// The accepted pharmacy has handed over the medicine.
    Fulfilled,
    /// The requester withdrew the order.
    Canceled,
    /// The response deadline passed without an acceptance. The requester may still cancel.
    NoResponse,
}

impl Display for EmergencyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmergencyStatus::Pending => write!(f, "pending"),
            EmergencyStatus::Accepted => write!(f, "accepted"),
            EmergencyStatus::Fulfilled => write!(f, "fulfilled"),
            EmergencyStatus::Canceled => write!(f, "canceled"),
            EmergencyStatus::NoResponse => write!(f, "no_response"),
        }
    }
}

//--------------------------------------      Priority       ---------------------------------------------------------
/// Informational urgency of an emergency order. High priority orders are listed first for pharmacies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Normal,
}

impl Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Normal => write!(f, "normal"),
        }
    }
}

//--------------------------------------  ResponseDecision   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ResponseDecision {
    Accepted,
    Rejected,
}

impl Display for ResponseDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseDecision::Accepted => write!(f, "accepted"),
            ResponseDecision::Rejected => write!(f, "rejected"),
        }
    }
}

//--------------------------------------  PharmacyResponse   ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyResponse {
    pub pharmacy_id: i64,
    pub decision: ResponseDecision,
    pub rejection_reason: Option<String>,
    pub responded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPharmacyResponse {
    pub pharmacy_id: i64,
    pub decision: ResponseDecision,
    pub rejection_reason: Option<String>,
    pub responded_at: DateTime<Utc>,
}

impl NewPharmacyResponse {
    pub fn is_acceptance(&self) -> bool {
        self.decision == ResponseDecision::Accepted
    }
}

//--------------------------------------   EmergencyOrder    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmergencyOrder {
    pub id: i64,
    pub requester_id: i64,
    /// The catalog product the requested medicine name resolved to.
    pub product_id: i64,
    pub requested_medicine_name: String,
    pub additional_notes: String,
    pub delivery_address: String,
    pub location: GeoPoint,
    pub status: EmergencyStatus,
    /// Ranked by dispatch score, best first. Fixed at creation.
    pub targeted_pharmacy_ids: Vec<i64>,
    /// The score and distance each target was picked with, in the same order as `targeted_pharmacy_ids`.
    #[serde(default)]
    pub dispatch_targets: Vec<DispatchTarget>,
    pub responses: Vec<PharmacyResponse>,
    pub accepted_pharmacy_id: Option<i64>,
    pub priority: Priority,
    pub response_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EmergencyOrder {
    pub fn is_targeted(&self, pharmacy_id: i64) -> bool {
        self.targeted_pharmacy_ids.contains(&pharmacy_id)
    }
}

/// A pharmacy an order was broadcast to, as it looked when the order was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchTarget {
    pub pharmacy_id: i64,
    pub score: f64,
    /// Metres from the search location.
    pub distance: f64,
}

//--------------------------------------  NewEmergencyOrder  ---------------------------------------------------------
/// A fully resolved emergency order, ready to be persisted. The dispatch step has already picked the targets.
#[derive(Debug, Clone)]
pub struct NewEmergencyOrder {
    pub requester_id: i64,
    pub product_id: i64,
    pub requested_medicine_name: String,
    pub additional_notes: String,
    pub delivery_address: String,
    pub location: GeoPoint,
    pub priority: Priority,
    /// The dispatch targets, best first.
    pub targets: Vec<ScoredPharmacy>,
    pub response_deadline: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------       Product       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub sub_category: String,
}

//--------------------------------------      StockItem      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub product_id: i64,
    pub quantity: i64,
    pub price: f64,
}

//--------------------------------------      Pharmacy       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pharmacy {
    pub id: i64,
    pub name: String,
    pub location: GeoPoint,
    pub is_active: bool,
    pub average_rating: f64,
    pub stock: Vec<StockItem>,
}

impl Pharmacy {
    /// A pharmacy stocks a product when its stock list carries a positive quantity of it.
    pub fn stocks(&self, product_id: i64) -> bool {
        self.stock.iter().any(|s| s.product_id == product_id && s.quantity > 0)
    }
}

//--------------------------------------   NearbyPharmacy    ---------------------------------------------------------
/// A pharmacy returned by a proximity query, annotated with its distance (in metres) from the query point.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyPharmacy {
    pub pharmacy: Pharmacy,
    pub distance: f64,
}
