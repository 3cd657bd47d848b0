//! Output schema of the prediction service.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which tier of the prediction chain produced a value.
///
/// Callers use this to gauge how much trust to put in `predicted_pw`: the variants
/// are listed roughly from most to least informed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionMethod {
    /// Physics baseline plus the learned residual correction.
    PhysicsInformedPrediction,
    /// Bevis conversion of an observed ZWD, no learned correction.
    PhysicsBaseline,
    /// Kernel regression over station aggregates, inside the network.
    SpatialInterpolation,
    /// Query point far from every station with a high kernel uncertainty: regional mean.
    SpatialExtrapolation,
    /// Inverse-distance weighting over station aggregates.
    InverseDistanceWeighting,
    /// Hand-tuned linear function of |latitude| and |longitude|.
    ApproximateInterpolation,
    /// Coordinate formula used when no model artifact is usable.
    FallbackFormula,
    /// Constant `ZWD · 0.16` conversion used when nothing else is available.
    FallbackConversion,
}

impl PredictionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMethod::PhysicsInformedPrediction => "physics_informed_prediction",
            PredictionMethod::PhysicsBaseline => "physics_baseline",
            PredictionMethod::SpatialInterpolation => "spatial_interpolation",
            PredictionMethod::SpatialExtrapolation => "spatial_extrapolation",
            PredictionMethod::InverseDistanceWeighting => "inverse_distance_weighting",
            PredictionMethod::ApproximateInterpolation => "approximate_interpolation",
            PredictionMethod::FallbackFormula => "fallback_formula",
            PredictionMethod::FallbackConversion => "fallback_conversion",
        }
    }

    /// `true` for the two last-resort formulas that do not use any model artifact.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            PredictionMethod::FallbackFormula | PredictionMethod::FallbackConversion
        )
    }
}

impl fmt::Display for PredictionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One prediction, as returned to callers and printed by the command-line tool.
///
/// `predicted_pw` and `uncertainty` are always non-negative and rounded to four
/// decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub predicted_pw: f64,
    pub uncertainty: f64,
    pub method: PredictionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl PredictionResult {
    /// Builds a result, clipping both numbers at zero and rounding them to 4 decimals.
    pub fn new(predicted_pw: f64, uncertainty: f64, method: PredictionMethod) -> Self {
        Self {
            predicted_pw: round4(crate::physics::enforce_physical_pw(predicted_pw)),
            uncertainty: round4(if uncertainty.is_nan() { 0.0 } else { uncertainty.max(0.0) }),
            method,
            note: None,
            error: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn at(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }
}

/// Payload emitted when a request cannot be answered at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl fmt::Display) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// Rounds to 4 decimal places, the precision of the public API.
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
