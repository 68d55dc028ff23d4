//! Durable storage for Groundlink telemetry records and anomalies.
//!
//! The store keeps two append-only, timestamp-indexed row sets: one
//! telemetry row per ingested frame, and zero or more anomaly rows per
//! frame. A flagged record and its anomaly rows are written in a single
//! transaction so neither can be observed without the other.
//!
//! Two backends implement [`TelemetryStore`]: [`PostgresStore`] for
//! production and [`MemoryStore`] for tests.

mod error;
mod memory;
mod postgres;
mod traits;
mod types;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use traits::TelemetryStore;
pub use types::{Anomaly, AnomalyQuery, TelemetryQuery, TelemetryRecord, TemperatureAggregate};
