//! In-memory store backend.
//!
//! Mirrors the Postgres backend's semantics closely enough to stand in
//! for it in tests, including batch atomicity. Supports injected write
//! faults so the all-or-nothing property is testable without a database.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::traits::TelemetryStore;
use crate::types::{Anomaly, AnomalyQuery, TelemetryQuery, TelemetryRecord, TemperatureAggregate};

#[derive(Debug, Default)]
struct Inner {
    telemetry: Vec<TelemetryRecord>,
    anomalies: Vec<Anomaly>,
    /// When set, the next anomaly batch fails at this row index.
    anomaly_fault: Option<usize>,
}

/// In-memory [`TelemetryStore`] backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next anomaly batch fail when it reaches row `index`.
    ///
    /// The fault fires once and clears itself. Test hook.
    pub async fn fail_anomaly_insert_at(&self, index: usize) {
        let mut inner = self.inner.write().await;
        inner.anomaly_fault = Some(index);
    }

    /// Number of telemetry rows currently stored.
    pub async fn telemetry_count(&self) -> usize {
        self.inner.read().await.telemetry.len()
    }

    /// Number of anomaly rows currently stored.
    pub async fn anomaly_count(&self) -> usize {
        self.inner.read().await.anomalies.len()
    }

    /// All anomaly rows in insertion order. Test helper.
    pub async fn anomalies(&self) -> Vec<Anomaly> {
        self.inner.read().await.anomalies.clone()
    }
}

/// Checks the injected fault against a batch about to be written.
///
/// Consumes the fault if it would fire within `batch_len` rows.
fn take_fault(inner: &mut Inner, batch_len: usize) -> Result<(), StoreError> {
    if let Some(index) = inner.anomaly_fault {
        if index < batch_len {
            inner.anomaly_fault = None;
            return Err(StoreError::Query(format!(
                "injected fault at anomaly row {index}"
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl TelemetryStore for MemoryStore {
    async fn store_telemetry(&self, record: &TelemetryRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.telemetry.push(record.clone());
        Ok(())
    }

    async fn store_anomalies(&self, anomalies: &[Anomaly]) -> Result<(), StoreError> {
        if anomalies.is_empty() {
            return Ok(());
        }

        let mut inner = self.inner.write().await;
        // The fault check precedes any visible write, so a failed batch
        // leaves the store untouched, like a rolled-back transaction.
        take_fault(&mut inner, anomalies.len())?;
        inner.anomalies.extend_from_slice(anomalies);
        Ok(())
    }

    async fn store_frame(
        &self,
        record: &TelemetryRecord,
        anomalies: &[Anomaly],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        take_fault(&mut inner, anomalies.len())?;
        inner.telemetry.push(record.clone());
        inner.anomalies.extend_from_slice(anomalies);
        Ok(())
    }

    async fn current_telemetry(&self) -> Result<TelemetryRecord, StoreError> {
        let inner = self.inner.read().await;
        let mut newest: Option<&TelemetryRecord> = None;
        for record in &inner.telemetry {
            // `>=` so ties resolve to the latest insert.
            if newest.is_none_or(|n| record.timestamp >= n.timestamp) {
                newest = Some(record);
            }
        }
        newest.cloned().ok_or(StoreError::NotFound)
    }

    async fn telemetry_in_range(
        &self,
        query: &TelemetryQuery,
    ) -> Result<(Vec<TelemetryRecord>, u64), StoreError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<TelemetryRecord> = inner
            .telemetry
            .iter()
            .filter(|r| {
                r.subsystem_id == query.subsystem_id
                    && r.timestamp >= query.start
                    && r.timestamp <= query.end
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matches.len() as u64;
        let page = paginate(matches, query.offset(), query.page_size);
        Ok((page, total))
    }

    async fn anomalies_in_range(
        &self,
        query: &AnomalyQuery,
    ) -> Result<(Vec<Anomaly>, u64), StoreError> {
        let inner = self.inner.read().await;
        let mut matches: Vec<Anomaly> = inner
            .anomalies
            .iter()
            .filter(|a| {
                query.subsystem_id.is_none_or(|id| a.subsystem_id == id)
                    && a.timestamp >= query.start
                    && a.timestamp <= query.end
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let total = matches.len() as u64;
        let page = paginate(matches, query.offset(), query.page_size);
        Ok((page, total))
    }

    async fn temperature_aggregates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: Duration,
    ) -> Result<Vec<TemperatureAggregate>, StoreError> {
        let width = i64::try_from(bucket.as_secs())
            .ok()
            .filter(|w| *w > 0)
            .ok_or_else(|| StoreError::Query("invalid bucket width".to_string()))?;

        struct Acc {
            min: f32,
            max: f32,
            sum: f64,
            count: i64,
        }

        let inner = self.inner.read().await;
        let mut buckets: BTreeMap<(i64, u16), Acc> = BTreeMap::new();
        for record in &inner.telemetry {
            if record.timestamp < start || record.timestamp > end {
                continue;
            }
            let bucket_start = record.timestamp.timestamp().div_euclid(width) * width;
            let acc = buckets
                .entry((bucket_start, record.subsystem_id))
                .or_insert(Acc {
                    min: record.temperature,
                    max: record.temperature,
                    sum: 0.0,
                    count: 0,
                });
            acc.min = acc.min.min(record.temperature);
            acc.max = acc.max.max(record.temperature);
            acc.sum += f64::from(record.temperature);
            acc.count += 1;
        }

        let mut aggregates = Vec::with_capacity(buckets.len());
        for ((bucket_start, subsystem_id), acc) in buckets {
            let bucket = DateTime::from_timestamp(bucket_start, 0)
                .ok_or_else(|| StoreError::Query("bucket out of range".to_string()))?;
            aggregates.push(TemperatureAggregate {
                bucket,
                subsystem_id,
                min_temperature: acc.min,
                max_temperature: acc.max,
                avg_temperature: acc.sum / acc.count as f64,
                sample_count: acc.count,
            });
        }
        Ok(aggregates)
    }
}

fn paginate<T>(rows: Vec<T>, offset: u64, page_size: u32) -> Vec<T> {
    rows.into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(page_size as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(secs: i64, subsystem_id: u16, temperature: f32) -> TelemetryRecord {
        TelemetryRecord {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            subsystem_id,
            temperature,
            battery: 90.0,
            altitude: 520.0,
            signal: -50.0,
            has_anomaly: false,
        }
    }

    fn anomaly(secs: i64, subsystem_id: u16, anomaly_type: &str) -> Anomaly {
        Anomaly {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            subsystem_id,
            anomaly_type: anomaly_type.to_string(),
            value: 36.0,
            expected_range: "20.0°C - 30.0°C".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_anomaly_batch_is_a_noop() {
        let store = MemoryStore::new();
        store.store_anomalies(&[]).await.unwrap();
        assert_eq!(store.anomaly_count().await, 0);
    }

    #[tokio::test]
    async fn anomaly_batch_is_atomic_under_fault() {
        let store = MemoryStore::new();
        let batch = vec![
            anomaly(100, 1, "High temperature anomaly"),
            anomaly(100, 1, "Low battery anomaly"),
            anomaly(100, 1, "Weak signal anomaly"),
        ];

        // Fail on the second of three rows: no row from the batch lands.
        store.fail_anomaly_insert_at(1).await;
        let err = store.store_anomalies(&batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Query(_)));
        assert_eq!(store.anomaly_count().await, 0);

        // The fault fires once; the retried batch succeeds in full.
        store.store_anomalies(&batch).await.unwrap();
        assert_eq!(store.anomaly_count().await, 3);
    }

    #[tokio::test]
    async fn store_frame_commits_record_and_anomalies_together() {
        let store = MemoryStore::new();
        let mut rec = record(100, 7, 36.0);
        rec.has_anomaly = true;
        let batch = vec![anomaly(100, 7, "High temperature anomaly")];

        store.fail_anomaly_insert_at(0).await;
        store.store_frame(&rec, &batch).await.unwrap_err();
        assert_eq!(store.telemetry_count().await, 0);
        assert_eq!(store.anomaly_count().await, 0);

        store.store_frame(&rec, &batch).await.unwrap();
        assert_eq!(store.telemetry_count().await, 1);
        assert_eq!(store.anomaly_count().await, 1);
    }

    #[tokio::test]
    async fn current_telemetry_returns_newest() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.current_telemetry().await,
            Err(StoreError::NotFound)
        ));

        store.store_telemetry(&record(100, 1, 21.0)).await.unwrap();
        store.store_telemetry(&record(300, 2, 22.0)).await.unwrap();
        store.store_telemetry(&record(200, 3, 23.0)).await.unwrap();

        let newest = store.current_telemetry().await.unwrap();
        assert_eq!(newest.subsystem_id, 2);
    }

    #[tokio::test]
    async fn telemetry_range_query_filters_and_paginates() {
        let store = MemoryStore::new();
        for secs in 0..10 {
            store
                .store_telemetry(&record(secs * 100, 1, 25.0))
                .await
                .unwrap();
        }
        // A different subsystem must not leak into the result.
        store.store_telemetry(&record(450, 2, 25.0)).await.unwrap();

        let query = TelemetryQuery {
            start: Utc.timestamp_opt(100, 0).unwrap(),
            end: Utc.timestamp_opt(800, 0).unwrap(),
            subsystem_id: 1,
            page: 2,
            page_size: 3,
        };
        let (page, total) = store.telemetry_in_range(&query).await.unwrap();

        assert_eq!(total, 8);
        assert_eq!(page.len(), 3);
        // Newest first: page 2 of size 3 starts at the 4th newest (t=500).
        assert_eq!(page[0].timestamp.timestamp(), 500);
        assert_eq!(page[2].timestamp.timestamp(), 300);
    }

    #[tokio::test]
    async fn anomaly_range_query_with_optional_subsystem() {
        let store = MemoryStore::new();
        store
            .store_anomalies(&[
                anomaly(100, 1, "High temperature anomaly"),
                anomaly(200, 2, "Low battery anomaly"),
                anomaly(300, 1, "Weak signal anomaly"),
            ])
            .await
            .unwrap();

        let mut query = AnomalyQuery {
            start: Utc.timestamp_opt(0, 0).unwrap(),
            end: Utc.timestamp_opt(1000, 0).unwrap(),
            subsystem_id: None,
            page: 1,
            page_size: 10,
        };
        let (all, total) = store.anomalies_in_range(&query).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(all[0].anomaly_type, "Weak signal anomaly");

        query.subsystem_id = Some(2);
        let (filtered, total) = store.anomalies_in_range(&query).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(filtered[0].anomaly_type, "Low battery anomaly");
    }

    #[tokio::test]
    async fn temperature_aggregates_bucket_per_subsystem() {
        let store = MemoryStore::new();
        // Two subsystems, two 60-second buckets.
        store.store_telemetry(&record(10, 1, 20.0)).await.unwrap();
        store.store_telemetry(&record(20, 1, 30.0)).await.unwrap();
        store.store_telemetry(&record(30, 2, 25.0)).await.unwrap();
        store.store_telemetry(&record(70, 1, 40.0)).await.unwrap();

        let aggregates = store
            .temperature_aggregates(
                Utc.timestamp_opt(0, 0).unwrap(),
                Utc.timestamp_opt(1000, 0).unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        assert_eq!(aggregates.len(), 3);

        let first = &aggregates[0];
        assert_eq!(first.bucket.timestamp(), 0);
        assert_eq!(first.subsystem_id, 1);
        assert_eq!(first.min_temperature, 20.0);
        assert_eq!(first.max_temperature, 30.0);
        assert_eq!(first.avg_temperature, 25.0);
        assert_eq!(first.sample_count, 2);

        assert_eq!(aggregates[1].subsystem_id, 2);
        assert_eq!(aggregates[2].bucket.timestamp(), 60);
        assert_eq!(aggregates[2].sample_count, 1);
    }
}
