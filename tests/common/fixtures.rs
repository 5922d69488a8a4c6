//! Static payload corpora used across harnesses.
//!
//! Each corpus is a `&'static [&'static str]` of JSON request bodies as a
//! device would send them.

use chrono::{DateTime, TimeZone, Utc};

/// Payloads that must normalise successfully.
pub const CORPUS_VALID: &[&str] = &[
    r#"{"deviceId":"d1","messageUUID":"m1","Latitude":45,"Longitude":-122}"#,
    r#"{"deviceId":"tracker-7","messageUUID":"6f1c2a9e-0b7d-4e8f-9a41-3c5d2e7f8a10","Latitude":51.5007,"Longitude":-0.1246,"Accuracy":4.8,"batteryVoltage":3.91,"inputVoltage":12.2,"cpuTemp":"48.3","ambientTemp":"19.0","timeStamp":"2024-01-15T10:00:00Z"}"#,
    r#"{"deviceId":"boat-3","messageUUID":"m-0001","Latitude":"-33.8568","Longitude":"151.2153","timeStamp":1705312800000}"#,
    r#"{"deviceId":"null-island","messageUUID":"m0","Latitude":0,"Longitude":0}"#,
    r#"{"deviceId":"pole","messageUUID":"m90","Latitude":90,"Longitude":180,"extra":{"firmware":"1.4.2","sats":[3,7,12]}}"#,
    r#"{"deviceId":"south","messageUUID":"m-90","Latitude":-90,"Longitude":-180,"Accuracy":null}"#,
];

/// Payloads that must be rejected, paired with the expected error kind.
pub const CORPUS_INVALID: &[(&str, &str)] = &[
    (
        r#"{"deviceId":"d1","Latitude":45,"Longitude":-122}"#,
        "missing-required-field",
    ),
    (
        r#"{"messageUUID":"m1","Latitude":45,"Longitude":-122}"#,
        "missing-required-field",
    ),
    (
        r#"{"deviceId":"d1","messageUUID":"m1","Longitude":-122}"#,
        "missing-required-field",
    ),
    (
        r#"{"deviceId":"d1","messageUUID":"m1","Latitude":45}"#,
        "missing-required-field",
    ),
    (
        r#"{"deviceId":"","messageUUID":"m1","Latitude":45,"Longitude":-122}"#,
        "missing-required-field",
    ),
    (
        r#"{"deviceId":"d1","messageUUID":"m1","Latitude":95,"Longitude":-122}"#,
        "out-of-range-coordinate",
    ),
    (
        r#"{"deviceId":"d1","messageUUID":"m1","Latitude":45,"Longitude":-180.01}"#,
        "out-of-range-coordinate",
    ),
    (
        r#"{"deviceId":"d1","messageUUID":"m1","Latitude":"abc","Longitude":-122}"#,
        "invalid-coordinate",
    ),
    (
        r#"{"deviceId":"d1","messageUUID":"m1","Latitude":45,"Longitude":-122,"timeStamp":"not a date"}"#,
        "invalid-timestamp",
    ),
];

/// A fixed instant used wherever a test needs a deterministic clock.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}
