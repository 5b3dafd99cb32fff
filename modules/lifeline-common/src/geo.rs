use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::LifelineError;

/// Mean Earth radius in kilometers, shared by every distance computation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Meters per degree of latitude on a sphere of `EARTH_RADIUS_KM`.
/// Handy for expressing small offsets (the aggregation radius) in degrees.
pub const METERS_PER_DEG_LAT: f64 = EARTH_RADIUS_KM * 1000.0 * std::f64::consts::PI / 180.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Construct a point, rejecting out-of-range coordinates.
    /// All ingestion paths go through this before any store access.
    pub fn checked(lat: f64, lng: f64) -> Result<Self, LifelineError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(LifelineError::Validation(format!(
                "latitude {lat} out of range [-90, 90]"
            )));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(LifelineError::Validation(format!(
                "longitude {lng} out of range [-180, 180]"
            )));
        }
        Ok(Self { lat, lng })
    }

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        haversine_km(self.lat, self.lng, other.lat, other.lng)
    }

    pub fn distance_m(&self, other: &GeoPoint) -> f64 {
        self.distance_km(other) * 1000.0
    }
}

/// Haversine great-circle distance between two lat/lng points in kilometers.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let lat1_r = lat1.to_radians();
    let lat2_r = lat2.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1_r.cos() * lat2_r.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_KM * c
}

// Facility registration arrives with a Google Maps share link; coordinates
// are buried in one of three URL shapes.
static AT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(-?\d+\.\d+),(-?\d+\.\d+)").unwrap());
static PLACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/place/[^/]+/@?(-?\d+\.\d+),(-?\d+\.\d+)").unwrap());
static QUERY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]q=(-?\d+\.\d+),(-?\d+\.\d+)").unwrap());

/// Extract coordinates from a Google Maps share link.
///
/// Tries the `@lat,lng` path segment, then `/place/…/lat,lng`, then the
/// `?q=lat,lng` query parameter. Returns `None` when no pattern matches or
/// the extracted pair is out of range.
pub fn coords_from_maps_link(url: &str) -> Option<GeoPoint> {
    for re in [&*AT_RE, &*PLACE_RE, &*QUERY_RE] {
        if let Some(caps) = re.captures(url) {
            let lat: f64 = caps[1].parse().ok()?;
            let lng: f64 = caps[2].parse().ok()?;
            return GeoPoint::checked(lat, lng).ok();
        }
    }
    None
}
