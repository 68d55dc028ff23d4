//! UDP telemetry ingestion service.
//!
//! Pulls datagrams off a single UDP socket and runs each one through
//! decode → detect → persist. Failures are contained per datagram: a
//! malformed frame or an unreachable store never stops the loop.

pub mod config;
pub mod receiver;

pub use config::{ConfigError, IngestConfig};
pub use receiver::{PacketReceiver, ReceiverSettings};
