//! Builds model-ready feature vectors from heterogeneous observation records.
//!
//! The engineer resolves every quantity it knows how to derive (location,
//! meteorology, vapour pressure, ZWD-derived values, cyclical time encodings) into a
//! named map, then lays that map out in whatever column order a trained model
//! expects. Columns the model wants but the engineer cannot produce are filled with
//! neutral values instead of failing the request.

use crate::features::cyclical::{self, DAYS_PER_YEAR, HOURS_PER_DAY, MONTHS_PER_YEAR};
use crate::features::error::FeatureError;
use crate::model::encoder::StationEncoder;
use crate::physics;
use crate::types::observation::{field, ObservationRecord};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike, Utc};
use log::{debug, warn};
use std::collections::BTreeMap;

/// Column layout of the deployed physics-informed model.
pub const DEFAULT_FEATURE_COLUMNS: [&str; 10] = [
    "lat",
    "lon",
    "elev",
    "temp",
    "pressure",
    "vapor_pressure",
    "hour_sin",
    "hour_cos",
    "doy_sin",
    "doy_cos",
];

/// Values substituted for absent meteorological and location fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDefaults {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation_m: f64,
    pub temperature_c: f64,
    pub pressure_hpa: f64,
    pub humidity_pct: f64,
    /// Neutral PW used for lag / rolling columns when no ZWD is available.
    pub neutral_pw_mm: f64,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            latitude: 0.0,
            longitude: 0.0,
            elevation_m: 100.0,
            temperature_c: 25.0,
            pressure_hpa: 1013.0,
            humidity_pct: 60.0,
            neutral_pw_mm: 2.5,
        }
    }
}

/// Named feature values derived from one record.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineeredFeatures {
    values: BTreeMap<&'static str, f64>,
    neutral_pw: f64,
    timestamp: NaiveDateTime,
}

impl EngineeredFeatures {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(canonical_name(name)).copied()
    }

    /// The instant the time encodings were computed for.
    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Neutral PW estimate for lag / rolling columns.
    pub fn neutral_pw(&self) -> f64 {
        self.neutral_pw
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.values.keys().copied()
    }
}

/// A feature vector in a model's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub columns: Vec<String>,
    pub values: Vec<f64>,
    /// Columns that were not derivable and received a neutral fill value.
    pub filled: Vec<String>,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Turns [`ObservationRecord`]s into [`FeatureVector`]s.
///
/// The engineer is a pure function of the record, its defaults, the optional
/// station encoder and the reference time. Pin the reference time with
/// [`FeatureEngineer::at`] to make output reproducible; otherwise absent date
/// components are read from the wall clock.
#[derive(Debug, Clone, Default)]
pub struct FeatureEngineer<'a> {
    defaults: FeatureDefaults,
    reference_time: Option<NaiveDateTime>,
    encoder: Option<&'a StationEncoder>,
}

impl<'a> FeatureEngineer<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// An engineer whose "now" is fixed to `reference_time`.
    pub fn at(reference_time: NaiveDateTime) -> Self {
        Self {
            reference_time: Some(reference_time),
            ..Self::default()
        }
    }

    pub fn with_defaults(mut self, defaults: FeatureDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Enables the `station_encoded` feature.
    pub fn with_encoder(mut self, encoder: &'a StationEncoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    fn now(&self) -> NaiveDateTime {
        self.reference_time.unwrap_or_else(|| Utc::now().naive_utc())
    }

    /// Derives every named feature the record supports.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::NonNumeric`] when a location, meteorological, ZWD or
    /// satellite field is present but not a number. Malformed date components are
    /// not an error; they resolve to the reference time instead.
    pub fn engineer(&self, record: &ObservationRecord) -> Result<EngineeredFeatures, FeatureError> {
        let d = &self.defaults;
        let lat = record.number_or(field::LATITUDE, d.latitude)?;
        let lon = record.number_or(field::LONGITUDE, d.longitude)?;
        let elev = record.number_or(field::ELEVATION, d.elevation_m)?;
        let temp = record.number_or(field::TEMPERATURE, d.temperature_c)?;
        let pressure = record.number_or(field::PRESSURE, d.pressure_hpa)?;
        let humidity = match (record.number(field::HUMIDITY)?, record.number(field::DEWPOINT)?) {
            (Some(rh), _) => rh,
            (None, Some(dewpoint)) => physics::relative_humidity_from_dewpoint(temp, dewpoint),
            (None, None) => d.humidity_pct,
        };
        let zwd = match record.number(field::ZWD)? {
            Some(zwd) => Some(zwd),
            None => record
                .number(field::ZTD)?
                .map(|ztd| physics::zenith_wet_delay(ztd, pressure, lat, elev)),
        };
        let sat_azimuth = record.number(field::SATELLITE_AZIMUTH)?;
        let sat_elevation = record.number(field::SATELLITE_ELEVATION)?;

        let mut values = BTreeMap::new();
        values.insert("lat", lat);
        values.insert("lon", lon);
        values.insert("elev", elev);
        values.insert("temp", temp);
        values.insert("pressure", pressure);
        values.insert("humidity", humidity);
        values.insert(
            "saturation_vapor_pressure",
            physics::saturation_vapor_pressure_hpa(temp),
        );
        values.insert("vapor_pressure", physics::vapor_pressure_hpa(temp, humidity));

        if let Some(zwd) = zwd {
            values.insert("zwd", zwd);
            values.insert("zwd_mm", zwd * physics::MM_PER_M);
            values.insert("pw_physics", physics::bevis_pw_mm(zwd, temp));
        }
        if let Some(az) = sat_azimuth {
            values.insert("sat_azimuth", az);
        }
        if let Some(el) = sat_elevation {
            values.insert("sat_elevation", el);
        }

        let timestamp = self.resolve_time(record);
        let hour = timestamp.hour() as f64;
        let (hour_sin, hour_cos) = cyclical::encode(hour, HOURS_PER_DAY);
        let (doy_sin, doy_cos) = cyclical::encode(timestamp.ordinal() as f64, DAYS_PER_YEAR);
        let (month_sin, month_cos) = cyclical::encode(timestamp.month() as f64, MONTHS_PER_YEAR);
        let day_of_week = timestamp.weekday().num_days_from_monday();
        values.insert("hour_sin", hour_sin);
        values.insert("hour_cos", hour_cos);
        values.insert("doy_sin", doy_sin);
        values.insert("doy_cos", doy_cos);
        values.insert("month_sin", month_sin);
        values.insert("month_cos", month_cos);
        values.insert("day_of_week", day_of_week as f64);
        values.insert("is_weekend", if day_of_week >= 5 { 1.0 } else { 0.0 });

        if let (Some(encoder), Some(id)) = (self.encoder, record.text(field::STATION_ID)) {
            match encoder.transform(&id) {
                Some(code) => {
                    values.insert("station_encoded", code as f64);
                }
                None => debug!("Station '{}' unknown to the encoder, treated as missing", id),
            }
        }

        let neutral_pw = zwd.map_or(d.neutral_pw_mm, physics::fallback_conversion_pw);

        Ok(EngineeredFeatures {
            values,
            neutral_pw,
            timestamp,
        })
    }

    /// Builds the vector for `columns`, in that order.
    ///
    /// Columns the engineer cannot derive are filled: lag and rolling statistics
    /// with the neutral PW estimate, other cyclical encodings with 0, anything else
    /// with 0 and a warning.
    ///
    /// # Errors
    ///
    /// Propagates [`FeatureEngineer::engineer`] errors and returns
    /// [`FeatureError::NoColumns`] for an empty column list.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use vapourcast::features::engineer::{FeatureEngineer, DEFAULT_FEATURE_COLUMNS};
    /// use vapourcast::types::observation::ObservationRecord;
    ///
    /// let now = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(6, 0, 0).unwrap();
    /// let record = ObservationRecord::from_pairs([("temperature", 20.0)]);
    /// let v = FeatureEngineer::at(now).vector(&record, &DEFAULT_FEATURE_COLUMNS).unwrap();
    ///
    /// assert_eq!(v.columns.len(), 10);
    /// assert_eq!(v.values[3], 20.0); // temp
    /// assert!((v.values[6] - 1.0).abs() < 1e-12); // hour_sin at 06:00
    /// ```
    pub fn vector<S: AsRef<str>>(
        &self,
        record: &ObservationRecord,
        columns: &[S],
    ) -> Result<FeatureVector, FeatureError> {
        if columns.is_empty() {
            return Err(FeatureError::NoColumns);
        }
        let features = self.engineer(record)?;
        Ok(layout(&features, columns))
    }
}

/// Lays engineered features out in column order, filling the gaps.
pub fn layout<S: AsRef<str>>(features: &EngineeredFeatures, columns: &[S]) -> FeatureVector {
    let mut values = Vec::with_capacity(columns.len());
    let mut filled = Vec::new();
    for column in columns {
        let column = column.as_ref();
        let value = match features.get(column) {
            Some(v) => v,
            None => {
                filled.push(column.to_string());
                missing_column_value(column, features.neutral_pw)
            }
        };
        values.push(value);
    }
    FeatureVector {
        columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        values,
        filled,
    }
}

fn missing_column_value(column: &str, neutral_pw: f64) -> f64 {
    let lower = column.to_ascii_lowercase();
    if lower.contains("lag") || lower.contains("rolling") {
        neutral_pw
    } else if lower.ends_with("_sin") || lower.ends_with("_cos") {
        0.0
    } else {
        warn!("Feature column '{}' cannot be derived, filling with 0", column);
        0.0
    }
}

/// Maps dataset-style column headers onto the engineer's canonical names.
fn canonical_name(column: &str) -> &str {
    match column {
        "Station Latitude" | "latitude" | "stationLatitude" => "lat",
        "Station Longitude" | "longitude" | "stationLongitude" => "lon",
        "Station Elevation" | "elevation" | "stationElevation" => "elev",
        "Temperature (°C)" | "temperature" => "temp",
        "Pressure (hPa)" => "pressure",
        "Humidity (%)" => "humidity",
        "ZWD Observation" | "zwdObservation" => "zwd",
        "Satellite Azimuth" | "satelliteAzimuth" => "sat_azimuth",
        "Satellite Elevation" | "satelliteElevation" => "sat_elevation",
        "PW_physics" => "pw_physics",
        other => other,
    }
}

impl FeatureEngineer<'_> {
    /// Resolves the observation instant.
    ///
    /// Explicit `year`/`month`/`day`/`hour` components take precedence, missing
    /// ones are taken from the reference time. Without any component an ISO
    /// timestamp is used. An impossible date resolves to the reference time.
    fn resolve_time(&self, record: &ObservationRecord) -> NaiveDateTime {
        let now = self.now();
        let has_components = [field::YEAR, field::MONTH, field::DAY, field::HOUR]
            .iter()
            .any(|aliases| record.has_any(aliases));

        if !has_components {
            if let Some(raw) = record.text(field::TIMESTAMP) {
                match parse_timestamp(&raw) {
                    Some(ts) => return ts,
                    None => warn!("Unparseable timestamp '{}', using current time", raw),
                }
            }
            return now;
        }

        let component = |aliases: &[&'static str], current: i64| -> Option<i64> {
            match record.number(aliases) {
                Ok(Some(v)) => Some(v.trunc() as i64),
                Ok(None) => Some(current),
                Err(e) => {
                    warn!("{}", e);
                    None
                }
            }
        };
        let resolved = (|| {
            let year = i32::try_from(component(field::YEAR, now.year() as i64)?).ok()?;
            let month = u32::try_from(component(field::MONTH, now.month() as i64)?).ok()?;
            let day = u32::try_from(component(field::DAY, now.day() as i64)?).ok()?;
            let hour = u32::try_from(component(field::HOUR, now.hour() as i64)?).ok()?;
            NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)
        })();

        resolved.unwrap_or_else(|| {
            warn!("Invalid date components, using current time");
            now
        })
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
