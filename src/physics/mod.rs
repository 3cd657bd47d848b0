//! Closed-form tropospheric physics used throughout the crate.
//!
//! This module holds the deterministic conversions that do not depend on any trained
//! model: the Saastamoinen hydrostatic delay, the Bevis wet-delay to precipitable-water
//! conversion, the Tetens vapour pressure approximation and the empirical constant used
//! by the deployed fallback path.
//!
//! Units are part of every function name or argument name on purpose. ZWD arrives in
//! **meters**, the Bevis conversion works in **millimeters**, and pressures are **hPa**.

/// Saastamoinen hydrostatic coefficient [m/hPa].
pub const SAASTAMOINEN_COEFFICIENT: f64 = 0.0022768;

/// Latitude term of the Saastamoinen gravity correction.
pub const SAASTAMOINEN_LATITUDE_TERM: f64 = 0.00266;

/// Height term of the Saastamoinen gravity correction [1/km].
pub const SAASTAMOINEN_HEIGHT_TERM: f64 = 0.00028;

/// Constant part of the Bevis PW/ZWD ratio [-].
pub const BEVIS_RATIO_OFFSET: f64 = 0.15;

/// Temperature slope of the Bevis PW/ZWD ratio [1/°C].
pub const BEVIS_RATIO_SLOPE: f64 = 0.0005;

/// Empirical multiplier of the deployed fallback conversion, applied to ZWD as received.
///
/// Not interchangeable with the Bevis form: this one skips the meter to millimeter
/// conversion and the temperature dependence entirely.
pub const FALLBACK_ZWD_TO_PW: f64 = 0.16;

/// Meters to millimeters.
pub const MM_PER_M: f64 = 1000.0;

/// Tetens saturation vapour pressure at 0 °C [hPa].
pub const TETENS_E0_HPA: f64 = 6.1078;

/// Tetens numerator coefficient [-].
pub const TETENS_A: f64 = 7.5;

/// Tetens denominator offset [°C].
pub const TETENS_B_C: f64 = 237.3;

/// Magnus coefficients used when deriving relative humidity from dew point.
pub const MAGNUS_A: f64 = 17.27;
pub const MAGNUS_B_C: f64 = 237.7;

/// Physical sanity window applied to training observations.
pub const VALID_TEMPERATURE_C: (f64, f64) = (-50.0, 60.0);
pub const VALID_PRESSURE_HPA: (f64, f64) = (800.0, 1100.0);
pub const VALID_HUMIDITY_PCT: (f64, f64) = (0.0, 100.0);

/// Clamps a precipitable water value to the physically valid range.
///
/// Negative PW has no physical meaning and must never leave the crate. `NaN`
/// is also mapped to zero.
///
/// # Examples
///
/// ```
/// use vapourcast::physics::enforce_physical_pw;
///
/// assert_eq!(enforce_physical_pw(-3.2), 0.0);
/// assert_eq!(enforce_physical_pw(12.5), 12.5);
/// ```
pub fn enforce_physical_pw(pw: f64) -> f64 {
    if pw.is_nan() {
        0.0
    } else {
        pw.max(0.0)
    }
}

/// Zenith hydrostatic delay [m] from the Saastamoinen model.
///
/// # Arguments
///
/// * `pressure_hpa` - Surface pressure in hPa.
/// * `latitude_deg` - Station latitude in decimal degrees.
/// * `elevation_m` - Station height in meters.
pub fn zenith_hydrostatic_delay(pressure_hpa: f64, latitude_deg: f64, elevation_m: f64) -> f64 {
    let phi = latitude_deg.to_radians();
    let h_km = elevation_m / 1000.0;
    SAASTAMOINEN_COEFFICIENT * pressure_hpa
        / (1.0 - SAASTAMOINEN_LATITUDE_TERM * (2.0 * phi).cos() - SAASTAMOINEN_HEIGHT_TERM * h_km)
}

/// Splits a total zenith delay into its wet component: `ztd - zhd` [m].
pub fn zenith_wet_delay(ztd_m: f64, pressure_hpa: f64, latitude_deg: f64, elevation_m: f64) -> f64 {
    ztd_m - zenith_hydrostatic_delay(pressure_hpa, latitude_deg, elevation_m)
}

/// Converts ZWD to precipitable water with the temperature-dependent Bevis ratio.
///
/// ZWD is given in meters and converted to millimeters before the ratio
/// `0.15 + 0.0005·T` is applied. The result is clipped at zero.
///
/// # Examples
///
/// ```
/// use vapourcast::physics::bevis_pw_mm;
///
/// // 0.2 m of wet delay at 20 °C
/// let pw = bevis_pw_mm(0.2, 20.0);
/// assert!((pw - 32.0).abs() < 1e-9);
/// ```
pub fn bevis_pw_mm(zwd_m: f64, temperature_c: f64) -> f64 {
    let zwd_mm = zwd_m * MM_PER_M;
    enforce_physical_pw((BEVIS_RATIO_OFFSET + BEVIS_RATIO_SLOPE * temperature_c) * zwd_mm)
}

/// The deployed constant conversion, `ZWD · 0.16`, applied without unit conversion.
pub fn fallback_conversion_pw(zwd: f64) -> f64 {
    enforce_physical_pw(zwd * FALLBACK_ZWD_TO_PW)
}

/// Saturation vapour pressure [hPa] from the Tetens approximation.
///
/// Uses the base-10 form `6.1078 · 10^(7.5·T / (T + 237.3))`.
pub fn saturation_vapor_pressure_hpa(temperature_c: f64) -> f64 {
    TETENS_E0_HPA * 10f64.powf(TETENS_A * temperature_c / (temperature_c + TETENS_B_C))
}

/// Actual vapour pressure [hPa]: saturation pressure scaled by the humidity fraction.
pub fn vapor_pressure_hpa(temperature_c: f64, relative_humidity_pct: f64) -> f64 {
    saturation_vapor_pressure_hpa(temperature_c) * (relative_humidity_pct / 100.0)
}

/// Relative humidity [%] from temperature and dew point (Magnus form).
///
/// A dew point above the air temperature is clamped to the temperature, and the
/// result is clamped to `[0, 100]`.
pub fn relative_humidity_from_dewpoint(temperature_c: f64, dewpoint_c: f64) -> f64 {
    let td = dewpoint_c.min(temperature_c);
    let rh = 100.0
        * (MAGNUS_A * td / (MAGNUS_B_C + td) - MAGNUS_A * temperature_c / (MAGNUS_B_C + temperature_c))
            .exp();
    rh.clamp(0.0, 100.0)
}

/// Returns `true` if the meteorological values fall inside the training sanity window.
pub fn is_physically_plausible(zwd_m: f64, temperature_c: f64, pressure_hpa: f64, humidity_pct: f64) -> bool {
    let within = |v: f64, (lo, hi): (f64, f64)| v >= lo && v <= hi;
    zwd_m > 0.0
        && within(temperature_c, VALID_TEMPERATURE_C)
        && within(pressure_hpa, VALID_PRESSURE_HPA)
        && within(humidity_pct, VALID_HUMIDITY_PCT)
}
