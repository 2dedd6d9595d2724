use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean earth radius used for great-circle distances.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("Longitude must lie in [-180, 180], got {0}")]
    InvalidLongitude(f64),
    #[error("Latitude must lie in [-90, 90], got {0}")]
    InvalidLatitude(f64),
    #[error("Only 'Point' locations are supported, got '{0}'")]
    UnsupportedType(String),
}

//--------------------------------------      GeoPoint       ---------------------------------------------------------
/// A point on the earth's surface.
///
/// On the wire a point is GeoJSON shaped, i.e. `{"type": "Point", "coordinates": [longitude, latitude]}`. The `type`
/// member may be omitted on input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoJsonPoint", into = "GeoJsonPoint")]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

impl GeoPoint {
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, GeoError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::InvalidLongitude(longitude));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::InvalidLatitude(latitude));
        }
        Ok(Self { longitude, latitude })
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Great-circle (haversine) distance to `other`, in metres.
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.latitude.to_radians(), other.latitude.to_radians());
        let d_lat = lat2 - lat1;
        let d_lng = (other.longitude - self.longitude).to_radians();
        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
    }

    /// The `(min_lng, min_lat, max_lng, max_lat)` box that contains every point within `radius_m` of this one. The box
    /// is clamped to valid coordinates, so it is only an approximation near the poles and the antimeridian, where it
    /// errs on the side of including too much.
    pub fn bounding_box(&self, radius_m: f64) -> (f64, f64, f64, f64) {
        let d_lat = (radius_m / EARTH_RADIUS_M).to_degrees();
        let cos_lat = self.latitude.to_radians().cos();
        let d_lng = if cos_lat.abs() < 1e-9 { 180.0 } else { (d_lat / cos_lat).min(180.0) };
        let (min_lng, max_lng) = if self.longitude - d_lng < -180.0 || self.longitude + d_lng > 180.0 {
            (-180.0, 180.0)
        } else {
            (self.longitude - d_lng, self.longitude + d_lng)
        };
        (min_lng, (self.latitude - d_lat).max(-90.0), max_lng, (self.latitude + d_lat).min(90.0))
    }
}

impl Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.longitude, self.latitude)
    }
}

#[derive(Serialize, Deserialize)]
struct GeoJsonPoint {
    #[serde(rename = "type", default = "point_type")]
    kind: String,
    coordinates: [f64; 2],
}

fn point_type() -> String {
    "Point".to_string()
}

impl TryFrom<GeoJsonPoint> for GeoPoint {
    type Error = GeoError;

    fn try_from(value: GeoJsonPoint) -> Result<Self, Self::Error> {
        if value.kind != "Point" {
            return Err(GeoError::UnsupportedType(value.kind));
        }
        let [longitude, latitude] = value.coordinates;
        GeoPoint::new(longitude, latitude)
    }
}

impl From<GeoPoint> for GeoJsonPoint {
    fn from(p: GeoPoint) -> Self {
        Self { kind: point_type(), coordinates: [p.longitude, p.latitude] }
    }
}
