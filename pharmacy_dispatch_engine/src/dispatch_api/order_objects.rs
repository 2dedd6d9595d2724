use std::fmt::Display;

use pds_common::GeoPoint;
use serde::{Deserialize, Serialize};

use crate::db_types::{Priority, ResponseDecision};

//--------------------------------------        Role         ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Customer,
    Pharmacist,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "Customer"),
            Role::Pharmacist => write!(f, "Pharmacist"),
        }
    }
}

//--------------------------------------       Caller        ---------------------------------------------------------
/// Who is making a call. Authentication happens upstream; by the time a `Caller` exists, the identity is trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Caller {
    Requester { user_id: i64 },
    Pharmacist { user_id: i64, pharmacy_id: i64 },
}

impl Caller {
    pub fn requester(user_id: i64) -> Self {
        Self::Requester { user_id }
    }

    pub fn pharmacist(user_id: i64, pharmacy_id: i64) -> Self {
        Self::Pharmacist { user_id, pharmacy_id }
    }

    pub fn user_id(&self) -> i64 {
        match self {
            Caller::Requester { user_id } | Caller::Pharmacist { user_id, .. } => *user_id,
        }
    }

    pub fn pharmacy_id(&self) -> Option<i64> {
        match self {
            Caller::Requester { .. } => None,
            Caller::Pharmacist { pharmacy_id, .. } => Some(*pharmacy_id),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Caller::Requester { .. } => Role::Customer,
            Caller::Pharmacist { .. } => Role::Pharmacist,
        }
    }
}

impl Display for Caller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Caller::Requester { user_id } => write!(f, "user #{user_id}"),
            Caller::Pharmacist { user_id, pharmacy_id } => write!(f, "pharmacist #{user_id} of pharmacy #{pharmacy_id}"),
        }
    }
}

//------------------------------------- NewEmergencyOrderRequest ------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEmergencyOrderRequest {
    /// Free text. Resolved against the catalog by case-insensitive substring match.
    pub requested_medicine_name: String,
    /// Where to search from. When omitted, the requester's stored address location is used.
    #[serde(default)]
    pub location: Option<GeoPoint>,
    pub delivery_address: String,
    #[serde(default)]
    pub additional_notes: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub response_timeout_minutes: Option<i64>,
}

impl NewEmergencyOrderRequest {
    pub fn new<S1: Into<String>, S2: Into<String>>(medicine: S1, delivery_address: S2) -> Self {
        Self {
            requested_medicine_name: medicine.into(),
            location: None,
            delivery_address: delivery_address.into(),
            additional_notes: String::default(),
            priority: Priority::default(),
            response_timeout_minutes: None,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_notes<S: Into<String>>(mut self, notes: S) -> Self {
        self.additional_notes = notes.into();
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_response_timeout_minutes(mut self, minutes: i64) -> Self {
        self.response_timeout_minutes = Some(minutes);
        self
    }
}

//------------------------------------- PharmacyResponseRequest -------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PharmacyResponseRequest {
    pub decision: ResponseDecision,
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

impl PharmacyResponseRequest {
    pub fn accept() -> Self {
        Self { decision: ResponseDecision::Accepted, rejection_reason: None }
    }

    pub fn reject<S: Into<String>>(reason: S) -> Self {
        Self { decision: ResponseDecision::Rejected, rejection_reason: Some(reason.into()) }
    }

    /// The rejection reason, trimmed. Reasons are only kept for rejections, and blank reasons are dropped.
    pub fn normalized_reason(&self) -> Option<String> {
        match self.decision {
            ResponseDecision::Accepted => None,
            ResponseDecision::Rejected => {
                self.rejection_reason.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
            },
        }
    }
}
