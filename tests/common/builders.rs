//! Test builders: ergonomic constructors for payloads and records.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use chrono::{DateTime, Utc};
use geotrace_core::{normalize_at, Payload, PayloadValue, TelemetryRecord};

// ---------------------------------------------------------------------------
// PayloadBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for inbound [`Payload`] fixtures.
///
/// Starts from the minimal valid payload
/// `{deviceId:"d1", messageUUID:"m1", Latitude:45, Longitude:-122}`.
///
/// # Example
///
/// ```rust
/// let payload = PayloadBuilder::new()
///     .device("tracker-7")
///     .field("batteryVoltage", 3.9)
///     .without("messageUUID")
///     .build();
/// ```
pub struct PayloadBuilder {
    payload: Payload,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        let mut payload = Payload::new();
        payload.insert("deviceId", "d1");
        payload.insert("messageUUID", "m1");
        payload.insert("Latitude", 45_i64);
        payload.insert("Longitude", -122_i64);
        Self { payload }
    }

    /// An empty payload with none of the required fields.
    pub fn empty() -> Self {
        Self {
            payload: Payload::new(),
        }
    }

    pub fn device(self, device_id: &str) -> Self {
        self.field("deviceId", device_id)
    }

    pub fn message(self, message_uuid: &str) -> Self {
        self.field("messageUUID", message_uuid)
    }

    pub fn position(self, latitude: f64, longitude: f64) -> Self {
        self.field("Latitude", latitude).field("Longitude", longitude)
    }

    pub fn field(mut self, key: &str, value: impl Into<PayloadValue>) -> Self {
        self.payload.insert(key, value);
        self
    }

    pub fn without(self, key: &str) -> Self {
        Self {
            payload: self
                .payload
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn build(self) -> Payload {
        self.payload
    }

    pub fn to_json(self) -> serde_json::Value {
        serde_json::Value::from(self.payload)
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

/// Parse a JSON object literal into a [`Payload`].
pub fn payload_from_json(json: &str) -> Payload {
    let value: serde_json::Value = serde_json::from_str(json).expect("fixture must be valid JSON");
    Payload::try_from(value).expect("fixture must be a JSON object")
}

/// Normalise a valid payload for `device` received at `at`.
pub fn record_at(device: &str, message: &str, at: DateTime<Utc>) -> TelemetryRecord {
    let payload = PayloadBuilder::new().device(device).message(message).build();
    normalize_at(&payload, at).expect("builder payload must normalise")
}
