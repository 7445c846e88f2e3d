//! Geographic utilities: distance between coordinates.
//!
//! Both measures come from the `geo` crate. `Geodesic` (Karney's algorithm on
//! the WGS84 ellipsoid) is the closest match for what the platform SDKs
//! report from `Location.distanceBetween` / `CLLocation.distance(from:)`.
//! `Haversine` assumes a spherical earth and can differ by up to ~0.5%.

use geo::{Distance, Geodesic, Haversine, Point};
use serde::{Deserialize, Serialize};

/// Which great-circle formula the containment check uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum DistanceMetric {
    /// Ellipsoidal (WGS84) geodesic distance
    #[default]
    Geodesic,
    /// Spherical haversine distance (mean earth radius)
    Haversine,
}

impl DistanceMetric {
    /// Distance in meters between two `(latitude, longitude)` pairs in degrees.
    pub fn distance(self, lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
        let p1 = Point::new(lng1, lat1);
        let p2 = Point::new(lng2, lat2);
        match self {
            DistanceMetric::Geodesic => Geodesic::distance(p1, p2),
            DistanceMetric::Haversine => Haversine::distance(p1, p2),
        }
    }
}

/// Calculate haversine distance between two coordinates in meters.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    DistanceMetric::Haversine.distance(lat1, lng1, lat2, lng2)
}

/// Calculate geodesic (WGS84) distance between two coordinates in meters.
pub fn geodesic_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    DistanceMetric::Geodesic.distance(lat1, lng1, lat2, lng2)
}

/// Check if a latitude/longitude pair is finite and within range.
pub fn is_valid_coordinate(latitude: f64, longitude: f64) -> bool {
    latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude)
}
