//! Classification of incoming prediction requests.
//!
//! The shape of a request is decided exactly once, here, at the boundary. Downstream
//! code matches on [`PredictionRequest`] instead of probing keys.

use crate::predictor::LatLon;
use crate::types::observation::{field, ObservationRecord};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    #[error("Prediction request must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("Unsupported input: expected 'latitude'/'longitude' or contextual fields such as 'zwdObservation', 'stationLatitude' or 'year'")]
    UnsupportedShape,

    #[error("Failed to parse request JSON: {0}")]
    InvalidJson(String),
}

/// A prediction request after shape classification.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionRequest {
    /// Only plain coordinates: answered by the spatial interpolator.
    Coordinate(LatLon),
    /// Station, meteorological, temporal or ZWD context: answered by the feature path.
    Features(ObservationRecord),
}

impl PredictionRequest {
    /// Classifies a parsed JSON value.
    ///
    /// * Any contextual key present → [`PredictionRequest::Features`].
    /// * Otherwise, numeric `latitude` and `longitude` → [`PredictionRequest::Coordinate`].
    /// * Otherwise → [`RequestError::UnsupportedShape`].
    ///
    /// # Examples
    ///
    /// ```
    /// use vapourcast::{LatLon, PredictionRequest};
    /// use serde_json::json;
    ///
    /// let req = PredictionRequest::from_json(json!({"latitude": 40.0127, "longitude": -105.2535})).unwrap();
    /// assert_eq!(req, PredictionRequest::Coordinate(LatLon(40.0127, -105.2535)));
    ///
    /// let req = PredictionRequest::from_json(json!({"zwdObservation": 15})).unwrap();
    /// assert!(matches!(req, PredictionRequest::Features(_)));
    /// ```
    pub fn from_json(value: Value) -> Result<Self, RequestError> {
        let map = match value {
            Value::Object(map) => map,
            Value::Array(_) => return Err(RequestError::NotAnObject("an array")),
            Value::String(_) => return Err(RequestError::NotAnObject("a string")),
            Value::Number(_) => return Err(RequestError::NotAnObject("a number")),
            Value::Bool(_) => return Err(RequestError::NotAnObject("a boolean")),
            Value::Null => return Err(RequestError::NotAnObject("null")),
        };
        let record = ObservationRecord::new(map);

        if field::contextual().any(|k| record.has_any(&[k])) {
            return Ok(PredictionRequest::Features(record));
        }

        let latitude = record.number(field::COORDINATE_LATITUDE).ok().flatten();
        let longitude = record.number(field::COORDINATE_LONGITUDE).ok().flatten();
        match (latitude, longitude) {
            (Some(lat), Some(lon)) => Ok(PredictionRequest::Coordinate(LatLon(lat, lon))),
            _ => Err(RequestError::UnsupportedShape),
        }
    }
}

impl FromStr for PredictionRequest {
    type Err = RequestError;

    /// Parses and classifies a JSON document.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let value: Value =
            serde_json::from_str(input).map_err(|e| RequestError::InvalidJson(e.to_string()))?;
        Self::from_json(value)
    }
}
