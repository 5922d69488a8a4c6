//! Normalizer: validates an untrusted [`Payload`] and reshapes it into a
//! [`TelemetryRecord`].
//!
//! Checks run in a fixed order: required-field presence, coordinate
//! coercion and range, optional numeric fields, optional text fields,
//! device timestamp. The first failure wins and no record is built.
//!
//! The normalizer is a pure function of its input and the supplied clock.
//! It performs no I/O and holds no state, so it can be called from any number
//! of request tasks at once.

use crate::types::{Payload, PayloadValue, TelemetryRecord};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

// ---------------------------------------------------------------------------
// Field names and limits
// ---------------------------------------------------------------------------

pub const DEVICE_ID: &str = "deviceId";
pub const MESSAGE_UUID: &str = "messageUUID";
pub const LATITUDE: &str = "Latitude";
pub const LONGITUDE: &str = "Longitude";
pub const ACCURACY: &str = "Accuracy";
pub const BATTERY_VOLTAGE: &str = "batteryVoltage";
pub const INPUT_VOLTAGE: &str = "inputVoltage";
pub const CPU_TEMP: &str = "cpuTemp";
pub const AMBIENT_TEMP: &str = "ambientTemp";
pub const TIME_STAMP: &str = "timeStamp";

const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;
const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a payload could not be normalised.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required fields")]
    MissingRequiredField { field: &'static str },

    #[error("invalid range")]
    OutOfRangeCoordinate { field: &'static str, value: f64 },

    #[error("invalid coordinate: {field} is not numeric")]
    InvalidCoordinate { field: &'static str },

    #[error("invalid timestamp: {value}")]
    InvalidTimestamp { value: String },
}

impl ValidationError {
    /// Stable machine-readable name, used as the `kind` in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredField { .. } => "missing-required-field",
            ValidationError::OutOfRangeCoordinate { .. } => "out-of-range-coordinate",
            ValidationError::InvalidCoordinate { .. } => "invalid-coordinate",
            ValidationError::InvalidTimestamp { .. } => "invalid-timestamp",
        }
    }

    /// The payload field that failed, when the error is tied to one.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredField { field }
            | ValidationError::OutOfRangeCoordinate { field, .. }
            | ValidationError::InvalidCoordinate { field } => *field,
            ValidationError::InvalidTimestamp { .. } => TIME_STAMP,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Normalise `payload`, stamping `serverReceivedAt` with the current time.
pub fn normalize(payload: &Payload) -> Result<TelemetryRecord, ValidationError> {
    normalize_at(payload, Utc::now())
}

/// Normalise `payload` using `now` as the server receive time.
pub fn normalize_at(
    payload: &Payload,
    now: DateTime<Utc>,
) -> Result<TelemetryRecord, ValidationError> {
    // Presence of all four required fields is checked before any coercion so
    // that a payload missing one of them always reports the missing field.
    let device_id = required_text(payload, DEVICE_ID)?;
    let message_uuid = required_text(payload, MESSAGE_UUID)?;
    let raw_latitude = required(payload, LATITUDE)?;
    let raw_longitude = required(payload, LONGITUDE)?;

    let latitude = coordinate(LATITUDE, raw_latitude)?;
    let longitude = coordinate(LONGITUDE, raw_longitude)?;
    check_range(LATITUDE, latitude, &LATITUDE_RANGE)?;
    check_range(LONGITUDE, longitude, &LONGITUDE_RANGE)?;

    Ok(TelemetryRecord {
        device_id,
        message_uuid,
        latitude,
        longitude,
        accuracy: optional_number(payload, ACCURACY),
        battery_voltage: optional_number(payload, BATTERY_VOLTAGE),
        input_voltage: optional_number(payload, INPUT_VOLTAGE),
        cpu_temp: optional_text(payload, CPU_TEMP),
        ambient_temp: optional_text(payload, AMBIENT_TEMP),
        time_stamp: optional_timestamp(payload)?,
        server_received_at: now,
        raw: payload.clone(),
    })
}

// ---------------------------------------------------------------------------
// Required fields
// ---------------------------------------------------------------------------

/// A present, non-null value. `null` counts as missing.
fn required<'a>(
    payload: &'a Payload,
    field: &'static str,
) -> Result<&'a PayloadValue, ValidationError> {
    match payload.get(field) {
        None | Some(PayloadValue::Null) => Err(ValidationError::MissingRequiredField { field }),
        Some(value) => Ok(value),
    }
}

/// Identifiers must be non-blank text; numbers are accepted and rendered.
fn required_text(payload: &Payload, field: &'static str) -> Result<String, ValidationError> {
    let missing = ValidationError::MissingRequiredField { field };
    match required(payload, field)? {
        PayloadValue::Text(s) if !s.trim().is_empty() => Ok(s.clone()),
        PayloadValue::Number(n) => Ok(n.to_string()),
        PayloadValue::Text(_)
        | PayloadValue::Null
        | PayloadValue::Bool(_)
        | PayloadValue::List(_)
        | PayloadValue::Object(_) => Err(missing),
    }
}

fn coordinate(field: &'static str, value: &PayloadValue) -> Result<f64, ValidationError> {
    as_number(value).ok_or(ValidationError::InvalidCoordinate { field })
}

fn check_range(
    field: &'static str,
    value: f64,
    range: &std::ops::RangeInclusive<f64>,
) -> Result<(), ValidationError> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRangeCoordinate { field, value })
    }
}

// ---------------------------------------------------------------------------
// Coercions
// ---------------------------------------------------------------------------

/// Numeric view of a value: numbers as-is, text parsed after trimming.
/// Non-finite results are rejected.
fn as_number(value: &PayloadValue) -> Option<f64> {
    let n = match value {
        PayloadValue::Number(n) => n.as_f64()?,
        PayloadValue::Text(s) => s.trim().parse::<f64>().ok()?,
        PayloadValue::Null
        | PayloadValue::Bool(_)
        | PayloadValue::List(_)
        | PayloadValue::Object(_) => return None,
    };
    n.is_finite().then_some(n)
}

fn optional_number(payload: &Payload, field: &str) -> Option<f64> {
    payload.get(field).and_then(as_number)
}

fn optional_text(payload: &Payload, field: &str) -> Option<String> {
    match payload.get(field)? {
        PayloadValue::Null => None,
        PayloadValue::Text(s) => Some(s.clone()),
        PayloadValue::Number(n) => Some(n.to_string()),
        PayloadValue::Bool(b) => Some(b.to_string()),
        nested @ (PayloadValue::List(_) | PayloadValue::Object(_)) => {
            serde_json::to_string(nested).ok()
        }
    }
}

fn optional_timestamp(payload: &Payload) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let value = match payload.get(TIME_STAMP) {
        None | Some(PayloadValue::Null) => return Ok(None),
        Some(value) => value,
    };
    let invalid = || ValidationError::InvalidTimestamp {
        value: render(value),
    };
    match value {
        PayloadValue::Text(s) => parse_timestamp(s.trim()).map(Some).ok_or_else(invalid),
        PayloadValue::Number(n) => from_epoch_millis(n).map(Some).ok_or_else(invalid),
        PayloadValue::Null
        | PayloadValue::Bool(_)
        | PayloadValue::List(_)
        | PayloadValue::Object(_) => Err(invalid()),
    }
}

/// Unix epoch milliseconds; a fractional part is kept to the microsecond.
fn from_epoch_millis(n: &serde_json::Number) -> Option<DateTime<Utc>> {
    if let Some(ms) = n.as_i64() {
        return DateTime::from_timestamp_millis(ms);
    }
    let ms = n.as_f64().filter(|ms| ms.is_finite())?;
    DateTime::from_timestamp_micros((ms * 1000.0).round() as i64)
}

/// Parse an ISO-8601 style timestamp. Offsets are honoured; naive times and
/// bare dates are read as UTC.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn render(value: &PayloadValue) -> String {
    match value {
        PayloadValue::Text(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.type_name().to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
