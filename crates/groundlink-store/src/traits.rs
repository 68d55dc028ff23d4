use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::types::{Anomaly, AnomalyQuery, TelemetryQuery, TelemetryRecord, TemperatureAggregate};

/// Backend-agnostic store for telemetry rows and their anomaly rows.
///
/// Writers use [`store_frame`](Self::store_frame) so that a record and
/// its anomalies commit as one unit. The narrower `store_telemetry` /
/// `store_anomalies` operations remain as the building blocks for
/// callers that only touch one row set.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// Inserts exactly one telemetry row.
    async fn store_telemetry(&self, record: &TelemetryRecord) -> Result<(), StoreError>;

    /// Inserts a batch of anomaly rows in one transaction.
    ///
    /// All-or-nothing: a failure on any row rolls back the whole batch.
    /// An empty batch is a no-op success and opens no transaction.
    async fn store_anomalies(&self, anomalies: &[Anomaly]) -> Result<(), StoreError>;

    /// Inserts a telemetry row and its anomaly rows in ONE transaction.
    ///
    /// Guarantees the record/anomaly invariant: a record with
    /// `has_anomaly == true` is never visible without its anomaly rows,
    /// and vice versa.
    async fn store_frame(
        &self,
        record: &TelemetryRecord,
        anomalies: &[Anomaly],
    ) -> Result<(), StoreError>;

    /// Returns the most recent telemetry row by timestamp.
    ///
    /// Fails with [`StoreError::NotFound`] when the store is empty.
    async fn current_telemetry(&self) -> Result<TelemetryRecord, StoreError>;

    /// Returns telemetry rows in a time range for one subsystem,
    /// newest first, paginated, together with the total match count.
    async fn telemetry_in_range(
        &self,
        query: &TelemetryQuery,
    ) -> Result<(Vec<TelemetryRecord>, u64), StoreError>;

    /// Returns anomaly rows in a time range, newest first, paginated,
    /// together with the total match count.
    async fn anomalies_in_range(
        &self,
        query: &AnomalyQuery,
    ) -> Result<(Vec<Anomaly>, u64), StoreError>;

    /// Returns per-subsystem temperature min/max/avg/count over fixed
    /// time buckets, ordered by bucket then subsystem.
    async fn temperature_aggregates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: Duration,
    ) -> Result<Vec<TemperatureAggregate>, StoreError>;
}
