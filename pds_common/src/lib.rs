mod geo;

pub mod helpers;

pub use geo::{GeoError, GeoPoint, EARTH_RADIUS_M};
