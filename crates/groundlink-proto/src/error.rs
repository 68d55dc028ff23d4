//! Error types for frame decoding.

use thiserror::Error;

/// The layer of the frame at which decoding stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameLayer {
    /// 6-byte primary header.
    PrimaryHeader,
    /// 10-byte secondary header.
    SecondaryHeader,
    /// 16-byte telemetry payload.
    Payload,
}

impl std::fmt::Display for FrameLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PrimaryHeader => write!(f, "primary header"),
            Self::SecondaryHeader => write!(f, "secondary header"),
            Self::Payload => write!(f, "payload"),
        }
    }
}

/// Frame decoding errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Input ended before the named layer could be decoded in full.
    ///
    /// `got` counts the bytes remaining when the layer was reached, not
    /// the total datagram length.
    #[error("frame too short at {layer}: need {needed} bytes, got {got}")]
    TooShort {
        layer: FrameLayer,
        needed: usize,
        got: usize,
    },
}
