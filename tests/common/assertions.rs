//! Domain-specific assertion macros for geotrace harnesses.
//!
//! These add context-rich failure messages that make it clear *which*
//! normalisation or API invariant was violated.

use geotrace_core::TelemetryRecord;

// ---------------------------------------------------------------------------
// Normalizer assertions
// ---------------------------------------------------------------------------

/// Assert that a normalisation result is an error of the given kind.
///
/// ```rust
/// assert_rejected!(normalize(&payload), "missing-required-field");
/// ```
#[macro_export]
macro_rules! assert_rejected {
    ($result:expr, $kind:expr) => {{
        let result: Result<geotrace_core::TelemetryRecord, geotrace_core::ValidationError> =
            $result;
        let expected: &str = $kind;
        match result {
            Err(e) if e.kind() == expected => {}
            Err(e) => panic!(
                "assert_rejected! failed:\n  expected kind: {}\n  actual kind:   {} ({})",
                expected,
                e.kind(),
                e
            ),
            Ok(record) => panic!(
                "assert_rejected! failed: payload was accepted.\n  expected kind: {}\n  raw: {:?}",
                expected, record.raw
            ),
        }
    }};
}

/// Assert that an HTTP JSON error body carries the expected `kind`.
///
/// ```rust
/// assert_error_kind!(body, "invalid-body");
/// ```
#[macro_export]
macro_rules! assert_error_kind {
    ($body:expr, $kind:expr) => {{
        let body: &serde_json::Value = &$body;
        let expected: &str = $kind;
        match body.get("kind").and_then(|k| k.as_str()) {
            Some(actual) if actual == expected => {}
            Some(actual) => panic!(
                "assert_error_kind! failed:\n  expected: {}\n  actual:   {}\n  body: {}",
                expected, actual, body
            ),
            None => panic!("assert_error_kind! failed: no `kind` in body {}", body),
        }
    }};
}

/// Assert that every optional field of a record carries the absent marker.
pub fn assert_optionals_absent(record: &TelemetryRecord) {
    assert!(record.accuracy.is_none(), "Accuracy should be absent: {record:?}");
    assert!(
        record.battery_voltage.is_none(),
        "batteryVoltage should be absent: {record:?}"
    );
    assert!(
        record.input_voltage.is_none(),
        "inputVoltage should be absent: {record:?}"
    );
    assert!(record.cpu_temp.is_none(), "cpuTemp should be absent: {record:?}");
    assert!(
        record.ambient_temp.is_none(),
        "ambientTemp should be absent: {record:?}"
    );
    assert!(record.time_stamp.is_none(), "timeStamp should be absent: {record:?}");
}

/// Assert that stored records are ordered newest first by `serverReceivedAt`.
pub fn assert_newest_first(records: &[geotrace_core::StoredRecord]) {
    for pair in records.windows(2) {
        assert!(
            pair[0].record.server_received_at >= pair[1].record.server_received_at,
            "records out of order: {} before {}",
            pair[0].record.server_received_at,
            pair[1].record.server_received_at
        );
    }
}
