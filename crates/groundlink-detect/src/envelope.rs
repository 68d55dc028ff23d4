//! Per-field operating envelopes.
//!
//! The envelope values are operational policy, reproduced exactly as
//! flown. Note the deliberate asymmetry: temperature, battery and
//! altitude have a one-sided hard limit (only high temperature, low
//! battery and low altitude trigger the acute path) while the normal
//! band is two-sided. Do not regularise this without sign-off from the
//! flight operations owner.

use chrono::{DateTime, Utc};
use groundlink_proto::TelemetryPayload;

const TEMPERATURE_RANGE: &str = "20.0°C - 30.0°C";
const BATTERY_RANGE: &str = "70% - 100%";
const ALTITUDE_RANGE: &str = "500km - 550km";
const SIGNAL_RANGE: &str = "-60dB to -40dB";

/// One detected out-of-envelope condition for one field of one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// Detection time (evaluation wall clock, not the sensor timestamp).
    pub timestamp: DateTime<Utc>,
    /// Classification of the anomaly.
    pub anomaly_type: &'static str,
    /// The offending measurement value.
    pub value: f32,
    /// Human-readable description of the expected operating range.
    pub expected_range: &'static str,
}

fn check_temperature(value: f32) -> Option<&'static str> {
    if value > 35.0 {
        return Some("High temperature anomaly");
    }
    if value < 20.0 || value > 30.0 {
        return Some("Temperature out of normal range");
    }
    None
}

fn check_battery(value: f32) -> Option<&'static str> {
    if value < 40.0 {
        return Some("Low battery anomaly");
    }
    if value < 70.0 || value > 100.0 {
        return Some("Battery out of normal range");
    }
    None
}

fn check_altitude(value: f32) -> Option<&'static str> {
    if value < 400.0 {
        return Some("Low altitude anomaly");
    }
    if value < 500.0 || value > 550.0 {
        return Some("Altitude out of normal range");
    }
    None
}

fn check_signal(value: f32) -> Option<&'static str> {
    if value < -80.0 {
        return Some("Weak signal anomaly");
    }
    if value < -60.0 || value > -40.0 {
        return Some("Signal strength out of normal range");
    }
    None
}

/// Evaluates a payload against all four envelopes.
///
/// Findings come back in field order [temperature, battery, altitude,
/// signal], restricted to the fields that tripped a check, so that
/// multi-anomaly frames report deterministically. All findings from one
/// call share a single detection timestamp.
#[must_use]
pub fn evaluate(payload: &TelemetryPayload) -> Vec<Finding> {
    let now = Utc::now();
    let mut findings = Vec::new();

    let checks: [(fn(f32) -> Option<&'static str>, f32, &'static str); 4] = [
        (check_temperature, payload.temperature, TEMPERATURE_RANGE),
        (check_battery, payload.battery, BATTERY_RANGE),
        (check_altitude, payload.altitude, ALTITUDE_RANGE),
        (check_signal, payload.signal, SIGNAL_RANGE),
    ];

    for (check, value, expected_range) in checks {
        if let Some(anomaly_type) = check(value) {
            findings.push(Finding {
                timestamp: now,
                anomaly_type,
                value,
                expected_range,
            });
        }
    }

    findings
}
