//! Core types for geotrace-core.
//!
//! This module defines the untrusted inbound [`Payload`] handed to the
//! normalizer by the request layer, the closed set of [`PayloadValue`]
//! variants it may contain, and the normalised [`TelemetryRecord`] that the
//! normalizer produces and the store persists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Untrusted input
// ---------------------------------------------------------------------------

/// A single value inside an untrusted [`Payload`].
///
/// Numbers keep their original [`serde_json::Number`] so a payload serialises
/// back to exactly what the client sent (`45` stays `45`, not `45.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
    List(Vec<PayloadValue>),
    Object(Payload),
}

impl PayloadValue {
    /// Short name of the variant, used in log lines and error details.
    pub fn type_name(&self) -> &'static str {
        match self {
            PayloadValue::Null => "null",
            PayloadValue::Bool(_) => "boolean",
            PayloadValue::Number(_) => "number",
            PayloadValue::Text(_) => "text",
            PayloadValue::List(_) => "list",
            PayloadValue::Object(_) => "object",
        }
    }
}

impl From<serde_json::Value> for PayloadValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => PayloadValue::Null,
            Value::Bool(b) => PayloadValue::Bool(b),
            Value::Number(n) => PayloadValue::Number(n),
            Value::String(s) => PayloadValue::Text(s),
            Value::Array(items) => {
                PayloadValue::List(items.into_iter().map(PayloadValue::from).collect())
            }
            Value::Object(map) => PayloadValue::Object(Payload::from(map)),
        }
    }
}

impl From<PayloadValue> for serde_json::Value {
    fn from(value: PayloadValue) -> Self {
        use serde_json::Value;
        match value {
            PayloadValue::Null => Value::Null,
            PayloadValue::Bool(b) => Value::Bool(b),
            PayloadValue::Number(n) => Value::Number(n),
            PayloadValue::Text(s) => Value::String(s),
            PayloadValue::List(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            PayloadValue::Object(payload) => Value::from(payload),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(s: &str) -> Self {
        PayloadValue::Text(s.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(s: String) -> Self {
        PayloadValue::Text(s)
    }
}

impl From<bool> for PayloadValue {
    fn from(b: bool) -> Self {
        PayloadValue::Bool(b)
    }
}

impl From<i64> for PayloadValue {
    fn from(n: i64) -> Self {
        PayloadValue::Number(n.into())
    }
}

/// Non-finite floats have no JSON representation and become [`PayloadValue::Null`].
impl From<f64> for PayloadValue {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(PayloadValue::Number)
            .unwrap_or(PayloadValue::Null)
    }
}

/// An untrusted inbound telemetry payload: field name to loosely-typed value.
///
/// Constructed from a JSON object body; anything that is not an object is
/// rejected by [`Payload::try_from`] before normalisation is attempted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, PayloadValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PayloadValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PayloadValue)> {
        self.0.iter()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Payload {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Payload(
            map.into_iter()
                .map(|(k, v)| (k, PayloadValue::from(v)))
                .collect(),
        )
    }
}

impl From<Payload> for serde_json::Value {
    fn from(payload: Payload) -> Self {
        serde_json::Value::Object(
            payload
                .0
                .into_iter()
                .map(|(k, v)| (k, serde_json::Value::from(v)))
                .collect(),
        )
    }
}

impl TryFrom<serde_json::Value> for Payload {
    type Error = NotAnObject;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::Object(map) => Ok(Payload::from(map)),
            other => Err(NotAnObject {
                found: PayloadValue::from(other).type_name(),
            }),
        }
    }
}

impl<K: Into<String>, V: Into<PayloadValue>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Payload(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Returned when a request body is valid JSON but not a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("payload must be a JSON object, found {found}")]
pub struct NotAnObject {
    pub found: &'static str,
}

// ---------------------------------------------------------------------------
// Normalised output
// ---------------------------------------------------------------------------

/// A validated telemetry record, ready to be handed to a
/// [`TelemetryStore`](crate::store::TelemetryStore).
///
/// Optional fields use `None` as the absent marker, serialised as `null`.
/// Serialised field names match the wire names clients send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "messageUUID")]
    pub message_uuid: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Accuracy")]
    pub accuracy: Option<f64>,
    #[serde(rename = "batteryVoltage")]
    pub battery_voltage: Option<f64>,
    #[serde(rename = "inputVoltage")]
    pub input_voltage: Option<f64>,
    #[serde(rename = "cpuTemp")]
    pub cpu_temp: Option<String>,
    #[serde(rename = "ambientTemp")]
    pub ambient_temp: Option<String>,
    /// Device-reported time of the fix, if the payload carried one.
    #[serde(rename = "timeStamp")]
    pub time_stamp: Option<DateTime<Utc>>,
    /// When the normalizer accepted the payload. Stores order by this field.
    #[serde(rename = "serverReceivedAt")]
    pub server_received_at: DateTime<Utc>,
    /// The payload exactly as received, kept for audit.
    pub raw: Payload,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn payload_preserves_integer_numbers() {
        let body = json!({"deviceId": "d1", "Latitude": 45, "Longitude": -122.5});
        let payload = Payload::try_from(body.clone()).unwrap();
        assert_eq!(serde_json::Value::from(payload), body);
    }

    #[test]
    fn payload_deserializes_nested_values() {
        let text = r#"{"a":null,"b":true,"c":[1,"x"],"d":{"e":2.5}}"#;
        let payload: Payload = serde_json::from_str(text).unwrap();
        assert_eq!(payload.get("a"), Some(&PayloadValue::Null));
        assert_eq!(payload.get("b"), Some(&PayloadValue::Bool(true)));
        assert!(matches!(payload.get("c"), Some(PayloadValue::List(items)) if items.len() == 2));
        assert!(matches!(payload.get("d"), Some(PayloadValue::Object(_))));
        assert_eq!(serde_json::to_string(&payload).unwrap(), text);
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = Payload::try_from(json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.found, "list");
        assert_eq!(err.to_string(), "payload must be a JSON object, found list");
    }

    #[test]
    fn non_finite_float_becomes_null() {
        assert_eq!(PayloadValue::from(f64::NAN), PayloadValue::Null);
    }
}
