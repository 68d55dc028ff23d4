//! The UDP reception loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use groundlink_detect::Finding;
use groundlink_proto::{Frame, FrameError};
use groundlink_store::{Anomaly, StoreError, TelemetryRecord, TelemetryStore};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::IngestConfig;

/// Per-datagram pipeline errors.
///
/// None of these escape the reception loop; they are logged and the
/// next datagram is processed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("frame timestamp not representable: {0}")]
    Timestamp(u64),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("store call exceeded {0:?}")]
    StoreTimeout(Duration),
}

/// Receiver tunables, split out of [`IngestConfig`] so tests can build
/// them directly.
#[derive(Debug, Clone)]
pub struct ReceiverSettings {
    /// Receive buffer size in bytes.
    pub buffer_size: usize,
    /// Bound on a single store call.
    pub store_timeout: Duration,
}

impl From<&IngestConfig> for ReceiverSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            buffer_size: config.server.buffer_size,
            store_timeout: Duration::from_secs(config.ingest.store_timeout_secs),
        }
    }
}

/// Sequential decode → detect → persist loop over one UDP socket.
///
/// Strictly one datagram at a time: each frame is fully persisted before
/// the next is read, so store latency bounds intake. That is acceptable
/// because the transport is lossy by nature, and it keeps same-subsystem
/// record/anomaly writes trivially ordered. The store timeout keeps a
/// hung store from stalling the loop forever.
pub struct PacketReceiver {
    socket: UdpSocket,
    store: Arc<dyn TelemetryStore>,
    settings: ReceiverSettings,
}

impl PacketReceiver {
    /// Binds the UDP socket.
    ///
    /// A bind failure is fatal to the service, like a store connection
    /// failure at startup.
    pub async fn bind(
        addr: SocketAddr,
        settings: ReceiverSettings,
        store: Arc<dyn TelemetryStore>,
    ) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            store,
            settings,
        })
    }

    /// The bound socket address. Useful when binding to port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Runs the reception loop until `cancel` fires.
    ///
    /// At-most-once, best-effort: a failed datagram is logged and
    /// dropped, never retried.
    pub async fn run(self, cancel: CancellationToken) {
        let local = self
            .socket
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "<unknown>".to_string());
        info!(addr = %local, "Telemetry ingestion listening");

        let mut buf = vec![0u8; self.settings.buffer_size];
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Reception loop stopping");
                    break;
                }
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, peer)) => {
                            if let Err(e) = self.process_datagram(&buf[..len]).await {
                                warn!(error = %e, %peer, len, "Datagram discarded");
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "UDP receive error");
                        }
                    }
                }
            }
        }
    }

    /// Decodes, evaluates and persists one datagram.
    async fn process_datagram(&self, data: &[u8]) -> Result<(), IngestError> {
        let frame = Frame::decode(data)?;
        let subsystem_id = frame.secondary.subsystem_id;

        let timestamp = frame_timestamp(frame.secondary.timestamp)?;
        let findings = groundlink_detect::evaluate(&frame.payload);

        let record = TelemetryRecord {
            timestamp,
            subsystem_id,
            temperature: frame.payload.temperature,
            battery: frame.payload.battery,
            altitude: frame.payload.altitude,
            signal: frame.payload.signal,
            has_anomaly: !findings.is_empty(),
        };

        for finding in &findings {
            warn!(
                subsystem_id,
                anomaly_type = finding.anomaly_type,
                value = finding.value,
                expected_range = finding.expected_range,
                "Telemetry anomaly detected"
            );
        }

        let anomalies: Vec<Anomaly> = findings
            .into_iter()
            .map(|f| stamp_subsystem(f, subsystem_id))
            .collect();

        // Record and anomalies commit as one transaction, so the
        // has_anomaly flag can never be observed without its rows.
        tokio::time::timeout(
            self.settings.store_timeout,
            self.store.store_frame(&record, &anomalies),
        )
        .await
        .map_err(|_| IngestError::StoreTimeout(self.settings.store_timeout))??;

        debug!(
            subsystem_id,
            timestamp = %record.timestamp,
            anomalies = anomalies.len(),
            "Frame stored"
        );
        Ok(())
    }
}

/// Converts a frame's Unix-seconds timestamp to `DateTime<Utc>`.
fn frame_timestamp(seconds: u64) -> Result<DateTime<Utc>, IngestError> {
    i64::try_from(seconds)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .ok_or(IngestError::Timestamp(seconds))
}

/// Attaches the frame's subsystem ID to a detector finding.
///
/// The detector is subsystem-agnostic; the receiver stamps the ID from
/// the same frame's secondary header.
fn stamp_subsystem(finding: Finding, subsystem_id: u16) -> Anomaly {
    Anomaly {
        timestamp: finding.timestamp,
        subsystem_id,
        anomaly_type: finding.anomaly_type.to_string(),
        value: finding.value,
        expected_range: finding.expected_range.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use groundlink_store::{AnomalyQuery, TelemetryQuery, TemperatureAggregate};

    #[test]
    fn timestamp_conversion_rejects_unrepresentable_values() {
        assert!(frame_timestamp(1_700_000_000).is_ok());
        assert!(matches!(
            frame_timestamp(u64::MAX),
            Err(IngestError::Timestamp(_))
        ));
    }

    /// Store whose writes never complete, for exercising the timeout.
    struct StalledStore;

    #[async_trait]
    impl TelemetryStore for StalledStore {
        async fn store_telemetry(&self, _: &TelemetryRecord) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn store_anomalies(&self, _: &[Anomaly]) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn store_frame(
            &self,
            _: &TelemetryRecord,
            _: &[Anomaly],
        ) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn current_telemetry(&self) -> Result<TelemetryRecord, StoreError> {
            Err(StoreError::NotFound)
        }

        async fn telemetry_in_range(
            &self,
            _: &TelemetryQuery,
        ) -> Result<(Vec<TelemetryRecord>, u64), StoreError> {
            Ok((Vec::new(), 0))
        }

        async fn anomalies_in_range(
            &self,
            _: &AnomalyQuery,
        ) -> Result<(Vec<Anomaly>, u64), StoreError> {
            Ok((Vec::new(), 0))
        }

        async fn temperature_aggregates(
            &self,
            _: DateTime<Utc>,
            _: DateTime<Utc>,
            _: Duration,
        ) -> Result<Vec<TemperatureAggregate>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_call_is_bounded() {
        use groundlink_proto::{PrimaryHeader, SecondaryHeader, TelemetryPayload};

        let settings = ReceiverSettings {
            buffer_size: 1024,
            store_timeout: Duration::from_secs(1),
        };
        let receiver = PacketReceiver::bind(
            "127.0.0.1:0".parse().unwrap(),
            settings,
            Arc::new(StalledStore),
        )
        .await
        .unwrap();

        let frame = Frame {
            primary: PrimaryHeader {
                packet_id: 0,
                sequence_control: 0,
                packet_length: 25,
            },
            secondary: SecondaryHeader {
                timestamp: 1_700_000_000,
                subsystem_id: 1,
            },
            payload: TelemetryPayload {
                temperature: 25.0,
                battery: 90.0,
                altitude: 520.0,
                signal: -50.0,
            },
        };

        let err = receiver.process_datagram(&frame.encode()).await.unwrap_err();
        assert!(matches!(err, IngestError::StoreTimeout(_)));
    }
}
