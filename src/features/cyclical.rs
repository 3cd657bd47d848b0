//! Sine/cosine encoding of periodic quantities.
//!
//! A raw hour of 23 and a raw hour of 0 are far apart numerically but adjacent in
//! time. Mapping a value onto the unit circle removes that seam.

use std::f64::consts::TAU;

pub const HOURS_PER_DAY: f64 = 24.0;
pub const DAYS_PER_YEAR: f64 = 365.25;
pub const MONTHS_PER_YEAR: f64 = 12.0;

/// Returns `(sin(2π·x/period), cos(2π·x/period))`.
pub fn encode(value: f64, period: f64) -> (f64, f64) {
    let angle = TAU * value / period;
    (angle.sin(), angle.cos())
}

/// Inverse of [`encode`]: recovers `x mod period` in `[0, period)`.
pub fn decode(sin: f64, cos: f64, period: f64) -> f64 {
    let angle = sin.atan2(cos).rem_euclid(TAU);
    let value = angle / TAU * period;
    // rem_euclid can land exactly on the period for tiny negative angles
    if value >= period {
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hour_round_trip_has_no_aliasing() {
        for hour in 0..24 {
            let (s, c) = encode(hour as f64, HOURS_PER_DAY);
            let angle = s.atan2(c).rem_euclid(TAU);
            let expected = (TAU * hour as f64 / HOURS_PER_DAY).rem_euclid(TAU);
            assert!((angle - expected).abs() < 1e-9, "hour {}", hour);
            assert!((decode(s, c, HOURS_PER_DAY) - hour as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_period_boundary_is_continuous() {
        let (s23, c23) = encode(23.0, HOURS_PER_DAY);
        let (s0, c0) = encode(0.0, HOURS_PER_DAY);
        let (s12, c12) = encode(12.0, HOURS_PER_DAY);
        let d = |a: (f64, f64), b: (f64, f64)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
        assert!(d((s23, c23), (s0, c0)) < d((s12, c12), (s0, c0)));
    }

    #[test]
    fn test_month_and_day_of_year_periods() {
        let (s, c) = encode(12.0, MONTHS_PER_YEAR);
        assert!(s.abs() < 1e-12 && (c - 1.0).abs() < 1e-12);
        let (s, c) = encode(365.25, DAYS_PER_YEAR);
        assert!(s.abs() < 1e-12 && (c - 1.0).abs() < 1e-12);
    }
}
