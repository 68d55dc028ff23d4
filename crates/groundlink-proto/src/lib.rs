//! Wire format for Groundlink telemetry frames.
//!
//! Satellite subsystems emit one fixed-layout 32-byte frame per sensor
//! sample, delivered as a single UDP datagram. The frame is a CCSDS-style
//! three-layer structure:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │            Primary Header (6 bytes, fixed)               │
//! ├──────────────┬───────────────────┬───────────────────────┤
//! │ Packet ID (2)│ Sequence Ctrl (2) │   Packet Length (2)   │
//! ├──────────────┴───────────────────┴───────────────────────┤
//! │           Secondary Header (10 bytes, fixed)             │
//! ├──────────────────────────────┬───────────────────────────┤
//! │     Unix Timestamp (8)       │     Subsystem ID (2)      │
//! ├──────────────────────────────┴───────────────────────────┤
//! │           Telemetry Payload (16 bytes, fixed)            │
//! ├─────────────┬────────────┬─────────────┬─────────────────┤
//! │ Temp f32 (4)│ Batt f32(4)│ Alt f32 (4) │  Signal f32 (4) │
//! └─────────────┴────────────┴─────────────┴─────────────────┘
//! ```
//!
//! All multi-byte fields are big-endian. There is no checksum and no
//! version negotiation; a frame either decodes in full or fails with
//! [`FrameError::TooShort`]. Semantic validation of the decoded values
//! (operating envelopes) is the detector's job, not the decoder's.

mod error;
mod frame;

pub use error::{FrameError, FrameLayer};
pub use frame::{
    Frame, PrimaryHeader, SecondaryHeader, TelemetryPayload, FRAME_LEN, PAYLOAD_LEN,
    PRIMARY_HEADER_LEN, SECONDARY_HEADER_LEN,
};
