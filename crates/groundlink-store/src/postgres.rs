//! PostgreSQL store backend.
//!
//! Uses runtime-checked queries against two append-only tables,
//! `telemetry` and `anomalies`, both indexed by timestamp descending so
//! the newest-first and range queries the read side needs stay cheap.
//! Subsystem IDs are stored as `INTEGER` so the full u16 range fits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};

use crate::error::StoreError;
use crate::traits::TelemetryStore;
use crate::types::{Anomaly, AnomalyQuery, TelemetryQuery, TelemetryRecord, TemperatureAggregate};

const INSERT_TELEMETRY: &str = r#"
    INSERT INTO telemetry (
        timestamp, subsystem_id, temperature, battery, altitude, signal, has_anomaly
    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
"#;

const INSERT_ANOMALY: &str = r#"
    INSERT INTO anomalies (
        timestamp, subsystem_id, anomaly_type, value, expected_range
    ) VALUES ($1, $2, $3, $4, $5)
"#;

/// PostgreSQL [`TelemetryStore`] backend.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connects to the database and bootstraps the schema.
    ///
    /// Failure here is fatal to the service: ingestion must not start
    /// without a reachable store.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Creates the tables and indexes if they don't exist.
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS telemetry (
                timestamp TIMESTAMPTZ NOT NULL,
                subsystem_id INTEGER NOT NULL,
                temperature REAL NOT NULL,
                battery REAL NOT NULL,
                altitude REAL NOT NULL,
                signal REAL NOT NULL,
                has_anomaly BOOLEAN NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_telemetry_timestamp
            ON telemetry (timestamp DESC)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS anomalies (
                timestamp TIMESTAMPTZ NOT NULL,
                subsystem_id INTEGER NOT NULL,
                anomaly_type TEXT NOT NULL,
                value REAL NOT NULL,
                expected_range TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_anomalies_timestamp
            ON anomalies (timestamp DESC)
            "#,
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(store_err)?;
        }
        Ok(())
    }

    /// Closes the connection pool. Call on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn insert_anomalies_tx(
        tx: &mut Transaction<'_, Postgres>,
        anomalies: &[Anomaly],
    ) -> Result<(), StoreError> {
        for anomaly in anomalies {
            sqlx::query(INSERT_ANOMALY)
                .bind(anomaly.timestamp)
                .bind(i32::from(anomaly.subsystem_id))
                .bind(&anomaly.anomaly_type)
                .bind(anomaly.value)
                .bind(&anomaly.expected_range)
                .execute(&mut **tx)
                .await
                .map_err(store_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl TelemetryStore for PostgresStore {
    async fn store_telemetry(&self, record: &TelemetryRecord) -> Result<(), StoreError> {
        sqlx::query(INSERT_TELEMETRY)
            .bind(record.timestamp)
            .bind(i32::from(record.subsystem_id))
            .bind(record.temperature)
            .bind(record.battery)
            .bind(record.altitude)
            .bind(record.signal)
            .bind(record.has_anomaly)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn store_anomalies(&self, anomalies: &[Anomaly]) -> Result<(), StoreError> {
        if anomalies.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        Self::insert_anomalies_tx(&mut tx, anomalies).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    async fn store_frame(
        &self,
        record: &TelemetryRecord,
        anomalies: &[Anomaly],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))?;

        sqlx::query(INSERT_TELEMETRY)
            .bind(record.timestamp)
            .bind(i32::from(record.subsystem_id))
            .bind(record.temperature)
            .bind(record.battery)
            .bind(record.altitude)
            .bind(record.signal)
            .bind(record.has_anomaly)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        Self::insert_anomalies_tx(&mut tx, anomalies).await?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(e.to_string()))
    }

    async fn current_telemetry(&self) -> Result<TelemetryRecord, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT timestamp, subsystem_id, temperature, battery, altitude, signal, has_anomaly
            FROM telemetry
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(StoreError::NotFound),
        }
    }

    async fn telemetry_in_range(
        &self,
        query: &TelemetryQuery,
    ) -> Result<(Vec<TelemetryRecord>, u64), StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT timestamp, subsystem_id, temperature, battery, altitude, signal, has_anomaly,
                   COUNT(*) OVER() AS total_count
            FROM telemetry
            WHERE timestamp BETWEEN $1 AND $2 AND subsystem_id = $3
            ORDER BY timestamp DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(query.start)
        .bind(query.end)
        .bind(i32::from(query.subsystem_id))
        .bind(i64::from(query.page_size))
        .bind(offset_i64(query.offset())?)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut total = 0u64;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            total = total_from_row(row)?;
            records.push(record_from_row(row)?);
        }
        Ok((records, total))
    }

    async fn anomalies_in_range(
        &self,
        query: &AnomalyQuery,
    ) -> Result<(Vec<Anomaly>, u64), StoreError> {
        let mut sql = String::from(
            r#"
            SELECT timestamp, subsystem_id, anomaly_type, value, expected_range,
                   COUNT(*) OVER() AS total_count
            FROM anomalies
            WHERE timestamp BETWEEN $1 AND $2
            "#,
        );
        if query.subsystem_id.is_some() {
            sql.push_str(" AND subsystem_id = $3 ORDER BY timestamp DESC LIMIT $4 OFFSET $5");
        } else {
            sql.push_str(" ORDER BY timestamp DESC LIMIT $3 OFFSET $4");
        }

        let mut q = sqlx::query(&sql).bind(query.start).bind(query.end);
        if let Some(subsystem_id) = query.subsystem_id {
            q = q.bind(i32::from(subsystem_id));
        }
        let rows = q
            .bind(i64::from(query.page_size))
            .bind(offset_i64(query.offset())?)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        let mut total = 0u64;
        let mut anomalies = Vec::with_capacity(rows.len());
        for row in &rows {
            total = total_from_row(row)?;
            anomalies.push(anomaly_from_row(row)?);
        }
        Ok((anomalies, total))
    }

    async fn temperature_aggregates(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        bucket: Duration,
    ) -> Result<Vec<TemperatureAggregate>, StoreError> {
        let width = bucket.as_secs_f64();
        if width <= 0.0 {
            return Err(StoreError::Query("invalid bucket width".to_string()));
        }

        let rows = sqlx::query(
            r#"
            SELECT to_timestamp(floor(extract(epoch FROM timestamp)::float8 / $3) * $3) AS bucket,
                   subsystem_id,
                   MIN(temperature) AS min_temperature,
                   MAX(temperature) AS max_temperature,
                   AVG(temperature) AS avg_temperature,
                   COUNT(*) AS sample_count
            FROM telemetry
            WHERE timestamp BETWEEN $1 AND $2
            GROUP BY bucket, subsystem_id
            ORDER BY bucket ASC, subsystem_id ASC
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(width)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut aggregates = Vec::with_capacity(rows.len());
        for row in &rows {
            aggregates.push(TemperatureAggregate {
                bucket: row.try_get("bucket").map_err(store_err)?,
                subsystem_id: subsystem_from_row(row)?,
                min_temperature: row.try_get("min_temperature").map_err(store_err)?,
                max_temperature: row.try_get("max_temperature").map_err(store_err)?,
                avg_temperature: row.try_get("avg_temperature").map_err(store_err)?,
                sample_count: row.try_get("sample_count").map_err(store_err)?,
            });
        }
        Ok(aggregates)
    }
}

fn store_err(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StoreError::Connection(e.to_string())
        }
        other => StoreError::Query(other.to_string()),
    }
}

fn offset_i64(offset: u64) -> Result<i64, StoreError> {
    i64::try_from(offset).map_err(|_| StoreError::Query("page offset too large".to_string()))
}

fn subsystem_from_row(row: &PgRow) -> Result<u16, StoreError> {
    let raw: i32 = row.try_get("subsystem_id").map_err(store_err)?;
    u16::try_from(raw).map_err(|_| StoreError::Query(format!("subsystem id out of range: {raw}")))
}

fn total_from_row(row: &PgRow) -> Result<u64, StoreError> {
    let raw: i64 = row.try_get("total_count").map_err(store_err)?;
    u64::try_from(raw).map_err(|_| StoreError::Query(format!("negative row count: {raw}")))
}

fn record_from_row(row: &PgRow) -> Result<TelemetryRecord, StoreError> {
    Ok(TelemetryRecord {
        timestamp: row.try_get("timestamp").map_err(store_err)?,
        subsystem_id: subsystem_from_row(row)?,
        temperature: row.try_get("temperature").map_err(store_err)?,
        battery: row.try_get("battery").map_err(store_err)?,
        altitude: row.try_get("altitude").map_err(store_err)?,
        signal: row.try_get("signal").map_err(store_err)?,
        has_anomaly: row.try_get("has_anomaly").map_err(store_err)?,
    })
}

fn anomaly_from_row(row: &PgRow) -> Result<Anomaly, StoreError> {
    Ok(Anomaly {
        timestamp: row.try_get("timestamp").map_err(store_err)?,
        subsystem_id: subsystem_from_row(row)?,
        anomaly_type: row.try_get("anomaly_type").map_err(store_err)?,
        value: row.try_get("value").map_err(store_err)?,
        expected_range: row.try_get("expected_range").map_err(store_err)?,
    })
}
