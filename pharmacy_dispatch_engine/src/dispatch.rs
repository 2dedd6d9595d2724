//! # Emergency order targeting
//!
//! Picks the pharmacies an emergency order is broadcast to. Every active pharmacy near the requester is given a score
//! out of 100:
//!
//! | Component    | Points | Rule                                                                   |
//! |--------------|--------|------------------------------------------------------------------------|
//! | distance     | 0-50   | `max(0, 50 - distance / radius * 50)`, linear decay to 0 at the radius |
//! | rating       | 0-30   | `average_rating / 5 * 30`                                              |
//! | availability | 0/20   | 20 if the pharmacy stocks the requested product                        |
//!
//! Only pharmacies that stock the product *and* score strictly more than [`MIN_TARGET_SCORE`] are eligible. Eligible
//! pharmacies are ranked by score (ties go to the closer pharmacy) and the best [`DispatchPolicy::max_targets`] are
//! targeted.
//!
//! Everything in this module is pure, so it can be exercised without a database.
use chrono::Duration;
use serde::Serialize;

use crate::db_types::NearbyPharmacy;

pub const DEFAULT_SEARCH_RADIUS_M: f64 = 5000.0;
pub const DEFAULT_MAX_TARGETS: usize = 5;
pub const DEFAULT_RESPONSE_TIMEOUT_MINUTES: i64 = 15;
/// Upper bound on a caller supplied response timeout (one day).
pub const MAX_RESPONSE_TIMEOUT_MINUTES: i64 = 24 * 60;
pub const MIN_TARGET_SCORE: f64 = 40.0;

const DISTANCE_WEIGHT: f64 = 50.0;
const RATING_WEIGHT: f64 = 30.0;
const AVAILABILITY_WEIGHT: f64 = 20.0;
const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchPolicy {
    /// Pharmacies further than this (in metres) are never considered. Also normalises the distance score.
    pub radius_m: f64,
    pub max_targets: usize,
    /// Used when the requester does not ask for a specific response window.
    pub default_response_timeout: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_SEARCH_RADIUS_M,
            max_targets: DEFAULT_MAX_TARGETS,
            default_response_timeout: Duration::minutes(DEFAULT_RESPONSE_TIMEOUT_MINUTES),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DispatchScore {
    pub distance: f64,
    pub rating: f64,
    pub availability: f64,
}

impl DispatchScore {
    pub fn total(&self) -> f64 {
        self.distance + self.rating + self.availability
    }

    pub fn has_product(&self) -> bool {
        self.availability > 0.0
    }

    pub fn is_eligible(&self) -> bool {
        self.has_product() && self.total() > MIN_TARGET_SCORE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredPharmacy {
    pub pharmacy_id: i64,
    pub distance: f64,
    pub score: DispatchScore,
}

pub fn score_pharmacy(candidate: &NearbyPharmacy, product_id: i64, policy: &DispatchPolicy) -> DispatchScore {
    let distance = if policy.radius_m > 0.0 {
        (DISTANCE_WEIGHT - (candidate.distance / policy.radius_m) * DISTANCE_WEIGHT).max(0.0)
    } else {
        0.0
    };
    let rating = (candidate.pharmacy.average_rating.clamp(0.0, MAX_RATING) / MAX_RATING) * RATING_WEIGHT;
    let availability = if candidate.pharmacy.stocks(product_id) { AVAILABILITY_WEIGHT } else { 0.0 };
    DispatchScore { distance, rating, availability }
}

/// Scores every candidate and returns the eligible ones, best first, capped at `policy.max_targets`.
///
/// Candidates are expected in ascending distance order (as the proximity query returns them). The sort is stable, so
/// equal scores keep that order.
pub fn select_targets(candidates: &[NearbyPharmacy], product_id: i64, policy: &DispatchPolicy) -> Vec<ScoredPharmacy> {
    let mut scored = candidates
        .iter()
        .filter(|c| c.pharmacy.is_active)
        .map(|c| ScoredPharmacy {
            pharmacy_id: c.pharmacy.id,
            distance: c.distance,
            score: score_pharmacy(c, product_id, policy),
        })
        .filter(|s| s.score.is_eligible())
        .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.score.total().total_cmp(&a.score.total()));
    scored.truncate(policy.max_targets);
    scored
}
