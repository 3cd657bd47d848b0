//! Inverse-distance weighting over station aggregates.

use crate::predictor::LatLon;
use crate::spatial::locate_station::StationIndex;
use serde::{Deserialize, Serialize};

/// Distances below this (in degrees) are floored so a query on top of a station
/// does not divide by zero.
pub const MIN_DISTANCE_DEG: f64 = 1e-6;

/// Restricts weighting to the closest stations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeighbourLimit {
    pub count: usize,
    pub max_distance_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InverseDistanceWeighting {
    pub power: f64,
    pub neighbours: Option<NeighbourLimit>,
}

impl Default for InverseDistanceWeighting {
    fn default() -> Self {
        Self {
            power: 2.0,
            neighbours: None,
        }
    }
}

impl InverseDistanceWeighting {
    /// Weighted mean of station PW at `query`, or `None` if no station qualifies.
    pub fn estimate(&self, index: &StationIndex, query: LatLon) -> Option<f64> {
        match self.neighbours {
            Some(limit) => {
                let nearest =
                    index.query_with_pw(query.0, query.1, limit.count, limit.max_distance_km);
                weighted_mean(nearest.iter().map(|(s, _)| s), query, self.power)
            }
            None => weighted_mean(index.stations(), query, self.power),
        }
    }
}

/// Weighted mean of the finite `pw_mm` values, weights `1 / d^power` with `d` the
/// planar distance in degrees.
pub fn weighted_mean<'a>(
    stations: impl IntoIterator<Item = &'a crate::types::station::StationLocation>,
    query: LatLon,
    power: f64,
) -> Option<f64> {
    let (weighted, total) = stations
        .into_iter()
        .filter(|s| s.has_valid_pw())
        .filter_map(|s| s.pw_mm.map(|pw| (s, pw)))
        .map(|(s, pw)| {
            let d = ((s.longitude - query.1).powi(2) + (s.latitude - query.0).powi(2))
                .sqrt()
                .max(MIN_DISTANCE_DEG);
            let w = 1.0 / d.powf(power);
            (w * pw, w)
        })
        .fold((0.0, 0.0), |(a, b), (wv, w)| (a + wv, b + w));
    (total > 0.0).then(|| weighted / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::station::StationLocation;

    fn stations() -> Vec<StationLocation> {
        vec![
            StationLocation::new("A", 0.0, 0.0).with_pw(10.0),
            StationLocation::new("B", 0.0, 2.0).with_pw(20.0),
            StationLocation::new("C", 10.0, 10.0),
        ]
    }

    #[test]
    fn test_midpoint_is_plain_average() {
        let v = weighted_mean(&stations(), LatLon(0.0, 1.0), 2.0).unwrap();
        assert!((v - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_query_on_a_station_returns_its_value() {
        let v = weighted_mean(&stations(), LatLon(0.0, 0.0), 2.0).unwrap();
        assert!((v - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_closer_station_dominates() {
        let v = weighted_mean(&stations(), LatLon(0.0, 0.5), 2.0).unwrap();
        // weights 1/0.25 and 1/2.25
        let expected = (10.0 / 0.25 + 20.0 / 2.25) / (1.0 / 0.25 + 1.0 / 2.25);
        assert!((v - expected).abs() < 1e-9);
    }

    #[test]
    fn test_no_stations_with_pw() {
        let only_c = vec![StationLocation::new("C", 10.0, 10.0)];
        assert_eq!(weighted_mean(&only_c, LatLon(0.0, 0.0), 2.0), None);
    }

    #[test]
    fn test_neighbour_limit() {
        let mut all = stations();
        all.push(StationLocation::new("D", 40.0, 40.0).with_pw(1000.0));
        let index = StationIndex::new(all);
        let unrestricted = InverseDistanceWeighting::default()
            .estimate(&index, LatLon(0.0, 1.0))
            .unwrap();
        let restricted = InverseDistanceWeighting {
            power: 2.0,
            neighbours: Some(NeighbourLimit {
                count: 2,
                max_distance_km: 1000.0,
            }),
        }
        .estimate(&index, LatLon(0.0, 1.0))
        .unwrap();
        assert!(unrestricted > 15.0);
        assert!((restricted - 15.0).abs() < 1e-12);
    }
}
