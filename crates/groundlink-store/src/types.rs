//! Row types and query parameters.

use chrono::{DateTime, Utc};

/// One telemetry row, created once per successfully decoded frame.
///
/// Immutable after creation; written exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    /// Sensor sample time from the frame's secondary header.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the producing subsystem.
    pub subsystem_id: u16,
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Battery charge in percent.
    pub battery: f32,
    /// Altitude in kilometres.
    pub altitude: f32,
    /// Signal strength in dB.
    pub signal: f32,
    /// True iff at least one anomaly row was written with this record.
    pub has_anomaly: bool,
}

/// One anomaly row, attached to exactly one telemetry record.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    /// Detection time (evaluation wall clock, not the sensor timestamp).
    pub timestamp: DateTime<Utc>,
    /// Subsystem that produced the offending frame.
    pub subsystem_id: u16,
    /// Classification of the anomaly.
    pub anomaly_type: String,
    /// The offending measurement value.
    pub value: f32,
    /// Human-readable description of the expected operating range.
    pub expected_range: String,
}

/// Time-range query over telemetry rows for one subsystem, paginated.
#[derive(Debug, Clone)]
pub struct TelemetryQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub subsystem_id: u16,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl TelemetryQuery {
    /// Row offset implied by the page number.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Time-range query over anomaly rows, optionally per subsystem, paginated.
#[derive(Debug, Clone)]
pub struct AnomalyQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Restrict to one subsystem, or all subsystems when `None`.
    pub subsystem_id: Option<u16>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl AnomalyQuery {
    /// Row offset implied by the page number.
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// Temperature statistics for one subsystem within one time bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureAggregate {
    /// Start of the bucket.
    pub bucket: DateTime<Utc>,
    pub subsystem_id: u16,
    pub min_temperature: f32,
    pub max_temperature: f32,
    pub avg_temperature: f64,
    pub sample_count: i64,
}
