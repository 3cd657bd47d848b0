use crate::types::station::StationLocation;
use haversine::{distance, Location as HaversineLocation, Units};
use ordered_float::OrderedFloat;
use rstar::{PointDistance, RTree};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// R-tree over the station location table.
#[derive(Debug, Clone)]
pub struct StationIndex {
    rtree: RTree<StationLocation>,
}

// Heap entry ordered by distance only
struct StationCandidate<'a> {
    distance_km: OrderedFloat<f64>,
    station: &'a StationLocation,
}
impl PartialEq for StationCandidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.distance_km == other.distance_km
    }
}
impl Eq for StationCandidate<'_> {}
impl PartialOrd for StationCandidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for StationCandidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance_km.cmp(&other.distance_km)
    }
}

fn haversine_km(latitude: f64, longitude: f64, station: &StationLocation) -> f64 {
    distance(
        HaversineLocation {
            latitude,
            longitude,
        },
        HaversineLocation {
            latitude: station.latitude,
            longitude: station.longitude,
        },
        Units::Kilometers,
    )
}

impl StationIndex {
    pub fn new(stations: Vec<StationLocation>) -> Self {
        Self {
            rtree: RTree::bulk_load(stations),
        }
    }

    pub fn len(&self) -> usize {
        self.rtree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.rtree.size() == 0
    }

    pub fn stations(&self) -> impl Iterator<Item = &StationLocation> {
        self.rtree.iter()
    }

    /// Nearest station carrying a finite PW aggregate, by planar degree distance,
    /// with that distance in degrees.
    pub fn nearest_with_pw(&self, latitude: f64, longitude: f64) -> Option<(&StationLocation, f64)> {
        let point = [latitude, longitude];
        self.rtree
            .nearest_neighbor_iter(&point)
            .find(|s| s.has_valid_pw())
            .map(|s| (s, s.distance_2(&point).sqrt()))
    }

    /// Finds up to `n_results` stations carrying a finite PW aggregate within
    /// `max_distance_km` (great-circle), closest first.
    pub fn query_with_pw(
        &self,
        latitude: f64,
        longitude: f64,
        n_results: usize,
        max_distance_km: f64,
    ) -> Vec<(StationLocation, f64)> {
        if n_results == 0 {
            return vec![];
        }
        let mut heap: BinaryHeap<StationCandidate<'_>> = BinaryHeap::with_capacity(n_results);
        let iteration_limit = (n_results * 4).max(32);
        let mut items_checked = 0;

        for station in self.rtree.nearest_neighbor_iter(&[latitude, longitude]) {
            items_checked += 1;
            if station.has_valid_pw() {
                let dist_km = haversine_km(latitude, longitude, station);
                if dist_km <= max_distance_km {
                    let candidate = StationCandidate {
                        distance_km: OrderedFloat(dist_km),
                        station,
                    };
                    if heap.len() < n_results {
                        heap.push(candidate);
                    } else if heap
                        .peek()
                        .is_some_and(|worst| candidate.distance_km < worst.distance_km)
                    {
                        heap.pop();
                        heap.push(candidate);
                    }
                }
            }
            if items_checked >= iteration_limit && heap.len() == n_results {
                break;
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|c| (c.station.to_owned(), c.distance_km.into_inner()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> StationIndex {
        StationIndex::new(vec![
            StationLocation::new("ZIMM", 46.877, 7.465).with_pw(14.0),
            StationLocation::new("WTZR", 49.144, 12.879).with_pw(15.0),
            StationLocation::new("MATE", 40.649, 16.705),
            StationLocation::new("NPLC", 30.033, 31.233).with_pw(22.0),
            StationLocation::new("BOGO", 52.476, 21.035).with_pw(11.0),
        ])
    }

    fn validate_results(results: &[(StationLocation, f64)], expected_max_len: usize, max_distance_km: f64) {
        assert!(results.len() <= expected_max_len);
        let mut last_dist = -1.0;
        for (station, dist) in results {
            assert!(*dist <= max_distance_km + 1e-9, "{} too far", station.id);
            assert!(*dist >= last_dist - 1e-9, "{} out of order", station.id);
            last_dist = *dist;
        }
    }

    #[test]
    fn test_basic_query() {
        let results = index().query_with_pw(46.0, 10.0, 3, 1000.0);
        validate_results(&results, 3, 1000.0);
        // MATE has no PW, BOGO is ~1080 km away
        let ids: Vec<&str> = results.iter().map(|(s, _)| s.id.as_str()).collect();
        assert_eq!(ids, ["ZIMM", "WTZR"]);
    }

    #[test]
    fn test_query_with_pw_skips_stations_without_pw() {
        let results = index().query_with_pw(40.6, 16.7, 2, 2000.0);
        validate_results(&results, 2, 2000.0);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(s, _)| s.id != "MATE"));
    }

    #[test]
    fn test_tight_radius_and_zero_results() {
        let idx = index();
        assert!(idx.query_with_pw(0.0, 0.0, 5, 1.0).is_empty());
        assert!(idx.query_with_pw(46.877, 7.465, 0, 500.0).is_empty());
    }

    #[test]
    fn test_nearest_in_degrees() {
        let idx = index();
        let (station, dist) = idx.nearest_with_pw(30.033, 34.233).unwrap();
        assert_eq!(station.id, "NPLC");
        assert!((dist - 3.0).abs() < 1e-9);
        // MATE sits on the query point but has no PW
        let (station, _) = idx.nearest_with_pw(40.649, 16.705).unwrap();
        assert_ne!(station.id, "MATE");
        assert!(StationIndex::new(vec![]).nearest_with_pw(0.0, 0.0).is_none());
    }
}
