//! Raw and typed representations of a single GNSS epoch at one station.
//!
//! [`ObservationRecord`] is the loosely-shaped record a prediction request carries:
//! any subset of fields, under any of several aliases, as numbers or numeric strings.
//! [`Observation`] is the fully typed row the training pipeline and the validation
//! harness work with. Both go through the same feature engineer, so a model sees the
//! same columns at training time and at serving time.

use crate::features::error::FeatureError;
use crate::physics;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Alias tables, in precedence order. The explicit contextual name always comes
/// first so that, for example, `stationLatitude` wins over a generic `latitude`.
pub mod field {
    pub const LATITUDE: &[&str] = &["stationLatitude", "Station Latitude", "latitude", "lat"];
    pub const LONGITUDE: &[&str] = &["stationLongitude", "Station Longitude", "longitude", "lon"];
    pub const ELEVATION: &[&str] = &["stationElevation", "Station Elevation", "Elevation", "elevation"];
    pub const TEMPERATURE: &[&str] = &["temperature", "Temperature (°C)"];
    pub const PRESSURE: &[&str] = &["pressure", "Pressure (hPa)"];
    pub const HUMIDITY: &[&str] = &["humidity", "Humidity (%)"];
    pub const ZWD: &[&str] = &["zwdObservation", "ZWD Observation"];
    /// Total zenith delay [m]; ZWD is derived from it when absent.
    pub const ZTD: &[&str] = &["ztdObservation", "ZTD Observation"];
    /// Dew point [°C]; relative humidity is derived from it when absent.
    pub const DEWPOINT: &[&str] = &["dewpoint", "Dewpoint (°C)"];
    pub const STATION_ID: &[&str] = &["stationId", "Station ID"];
    pub const SATELLITE_AZIMUTH: &[&str] = &["satelliteAzimuth", "Satellite Azimuth"];
    pub const SATELLITE_ELEVATION: &[&str] = &["satelliteElevation", "Satellite Elevation"];
    pub const YEAR: &[&str] = &["year", "Year"];
    pub const MONTH: &[&str] = &["month", "Month"];
    pub const DAY: &[&str] = &["day", "Day"];
    pub const HOUR: &[&str] = &["hour", "Hour"];
    pub const TIMESTAMP: &[&str] = &["dateString", "Date (ISO Format)"];

    /// Plain coordinate keys of a coordinate-only query.
    pub const COORDINATE_LATITUDE: &[&str] = &["latitude"];
    pub const COORDINATE_LONGITUDE: &[&str] = &["longitude"];

    /// Station identity: the presence of any of these marks a request from a known source.
    pub const STATION_IDENTITY: &[&str] = &[
        "stationId",
        "Station ID",
        "stationLatitude",
        "stationLongitude",
        "Station Latitude",
        "Station Longitude",
    ];

    /// Every key that turns a request into a feature request.
    pub fn contextual() -> impl Iterator<Item = &'static str> {
        [
            STATION_ID,
            &LATITUDE[..2],
            &LONGITUDE[..2],
            &ELEVATION[..2],
            TEMPERATURE,
            PRESSURE,
            HUMIDITY,
            DEWPOINT,
            ZWD,
            ZTD,
            SATELLITE_AZIMUTH,
            SATELLITE_ELEVATION,
            YEAR,
            MONTH,
            DAY,
            HOUR,
            TIMESTAMP,
        ]
        .into_iter()
        .flatten()
        .copied()
    }
}

/// A heterogeneous input record: a JSON object whose fields are resolved through
/// alias tables on demand.
///
/// `null` values are treated as absent. Numbers may be JSON numbers or strings that
/// parse as `f64`; anything else under a numeric alias is a
/// [`FeatureError::NonNumeric`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationRecord {
    fields: Map<String, Value>,
}

impl ObservationRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Builds a record from `(key, value)` pairs of plain numbers.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        let fields = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::from(v)))
            .collect();
        Self { fields }
    }

    /// Inserts or replaces a field.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns `true` if any alias is present with a non-null value.
    pub fn has_any(&self, aliases: &[&str]) -> bool {
        aliases.iter().any(|k| self.get(k).is_some())
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// First present alias, with the key it was found under.
    fn first<'a>(&'a self, aliases: &[&'static str]) -> Option<(&'static str, &'a Value)> {
        aliases
            .iter()
            .find_map(|k| self.get(k).map(|v| (*k, v)))
    }

    /// Resolves a numeric field through its aliases.
    ///
    /// Returns `Ok(None)` when no alias is present.
    pub fn number(&self, aliases: &[&'static str]) -> Result<Option<f64>, FeatureError> {
        let Some((key, value)) = self.first(aliases) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        };
        match parsed {
            Some(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(FeatureError::NonNumeric {
                field: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Resolves a numeric field, substituting `default` when absent.
    pub fn number_or(&self, aliases: &[&'static str], default: f64) -> Result<f64, FeatureError> {
        Ok(self.number(aliases)?.unwrap_or(default))
    }

    /// Resolves a numeric field, treating unparseable values as absent.
    ///
    /// Only the last-resort fallback formulas use this, since they must produce an
    /// answer no matter how malformed the request is.
    pub fn number_lenient(&self, aliases: &[&'static str]) -> Option<f64> {
        self.number(aliases).ok().flatten()
    }

    /// Resolves a textual field; numbers are rendered as text.
    pub fn text(&self, aliases: &[&'static str]) -> Option<String> {
        match self.first(aliases)? {
            (_, Value::String(s)) => Some(s.clone()),
            (_, Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for ObservationRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// A fully typed observation row, as found in the training dataset.
///
/// Field names follow the dataset column headers when (de)serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    #[serde(rename = "Station ID")]
    pub station_id: String,
    #[serde(rename = "Station Latitude")]
    pub latitude: f64,
    #[serde(rename = "Station Longitude")]
    pub longitude: f64,
    #[serde(rename = "Station Elevation")]
    pub elevation: f64,
    #[serde(rename = "Date (ISO Format)")]
    pub timestamp: NaiveDateTime,
    /// Zenith wet delay in meters.
    #[serde(rename = "ZWD Observation")]
    pub zwd_m: f64,
    #[serde(rename = "Temperature (°C)")]
    pub temperature_c: f64,
    #[serde(rename = "Pressure (hPa)")]
    pub pressure_hpa: f64,
    #[serde(rename = "Humidity (%)")]
    pub humidity_pct: f64,
    #[serde(rename = "Satellite Azimuth", default)]
    pub satellite_azimuth: Option<f64>,
    #[serde(rename = "Satellite Elevation", default)]
    pub satellite_elevation: Option<f64>,
    /// Reference PW in millimeters (e.g. reanalysis total column water vapour), if any.
    #[serde(rename = "Actual Measured PW", default)]
    pub measured_pw_mm: Option<f64>,
}

impl Observation {
    /// Bevis physics PW for this row [mm].
    pub fn physics_pw_mm(&self) -> f64 {
        physics::bevis_pw_mm(self.zwd_m, self.temperature_c)
    }

    /// Whether the row passes the training sanity window.
    pub fn is_plausible(&self) -> bool {
        physics::is_physically_plausible(
            self.zwd_m,
            self.temperature_c,
            self.pressure_hpa,
            self.humidity_pct,
        )
    }

    /// The raw record view of this row, with every field under its dataset alias.
    pub fn to_record(&self) -> ObservationRecord {
        let mut record = ObservationRecord::from_pairs([
            ("Station Latitude", self.latitude),
            ("Station Longitude", self.longitude),
            ("Station Elevation", self.elevation),
            ("ZWD Observation", self.zwd_m),
            ("Temperature (°C)", self.temperature_c),
            ("Pressure (hPa)", self.pressure_hpa),
            ("Humidity (%)", self.humidity_pct),
        ]);
        record.insert("Station ID", self.station_id.clone());
        record.insert(
            "Date (ISO Format)",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
        );
        if let Some(az) = self.satellite_azimuth {
            record.insert("Satellite Azimuth", az);
        }
        if let Some(el) = self.satellite_elevation {
            record.insert("Satellite Elevation", el);
        }
        record
    }
}
