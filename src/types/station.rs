//! Defines the GNSS station location table and the implementations needed to
//! index stations spatially with the `rstar` crate.

use rstar::{PointDistance, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

// --- Data Structures ---

/// One row of the station location table shipped inside a model artifact.
///
/// Besides the location, a station can carry an aggregate precipitable water value
/// (latest or mean observation at that station). Those aggregates are what the
/// spatial interpolator is fitted on, and their mean is the regional fallback used
/// when a query point is far outside the network.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StationLocation {
    /// Station identifier as used in the observation dataset (e.g. "ZIMM").
    pub id: String,
    /// Latitude in decimal degrees (positive for North, negative for South).
    pub latitude: f64,
    /// Longitude in decimal degrees (positive for East, negative for West).
    pub longitude: f64,
    /// Antenna height above sea level in meters, if known.
    pub elevation: Option<f64>,
    /// Station-level aggregate precipitable water in millimeters, if known.
    pub pw_mm: Option<f64>,
}

impl StationLocation {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            elevation: None,
            pw_mm: None,
        }
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = Some(elevation);
        self
    }

    pub fn with_pw(mut self, pw_mm: f64) -> Self {
        self.pw_mm = Some(pw_mm);
        self
    }

    /// A station can take part in spatial fitting when its location and PW are finite.
    pub(crate) fn has_valid_pw(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.pw_mm.is_some_and(|pw| pw.is_finite())
    }
}

// --- R-Tree Implementations ---

/// Lets a `StationLocation` live in an R-tree keyed on `[latitude, longitude]`.
impl RTreeObject for StationLocation {
    type Envelope = AABB<[f64; 2]>;

    /// A station is a point, so its envelope is the degenerate box around it.
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.latitude, self.longitude])
    }
}

impl PointDistance for StationLocation {
    /// Squared Euclidean distance in degree space between the station and
    /// `[query_latitude, query_longitude]`.
    ///
    /// The extrapolation policy of the interpolator is expressed in degrees, so this
    /// planar metric is exactly what it needs. Kilometer distances go through haversine.
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.latitude - point[0];
        let dy = self.longitude - point[1];
        dx * dx + dy * dy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstar::RTree;

    #[test]
    fn test_nearest_station_in_degree_space() {
        let tree = RTree::bulk_load(vec![
            StationLocation::new("ZIMM", 46.877, 7.465),
            StationLocation::new("MATE", 40.649, 16.705),
            StationLocation::new("NPLC", 30.033, 31.233),
        ]);
        let nearest = tree.nearest_neighbor(&[45.0, 8.0]).map(|s| s.id.as_str());
        assert_eq!(nearest, Some("ZIMM"));
    }

    #[test]
    fn test_valid_pw_requires_finite_values() {
        assert!(!StationLocation::new("A", 1.0, 2.0).has_valid_pw());
        assert!(StationLocation::new("A", 1.0, 2.0).with_pw(20.0).has_valid_pw());
        assert!(!StationLocation::new("A", f64::NAN, 2.0).with_pw(20.0).has_valid_pw());
        assert!(!StationLocation::new("A", 1.0, 2.0).with_pw(f64::INFINITY).has_valid_pw());
    }
}
