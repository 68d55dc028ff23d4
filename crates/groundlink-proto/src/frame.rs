//! Fixed-layout frame decoding and encoding.

use crate::error::{FrameError, FrameLayer};

/// Primary header size in bytes.
pub const PRIMARY_HEADER_LEN: usize = 6;

/// Secondary header size in bytes.
pub const SECONDARY_HEADER_LEN: usize = 10;

/// Telemetry payload size in bytes.
pub const PAYLOAD_LEN: usize = 16;

/// Total frame size in bytes.
pub const FRAME_LEN: usize = PRIMARY_HEADER_LEN + SECONDARY_HEADER_LEN + PAYLOAD_LEN;

/// CCSDS-style primary header.
///
/// Wire format (6 bytes, big-endian):
/// - Bytes 0-1: packet identifier word (version, type flag, secondary
///   header flag and APID packed into 16 bits)
/// - Bytes 2-3: sequence control word (sequence flags + sequence count)
/// - Bytes 4-5: total packet length
///
/// The sub-fields are kept packed: downstream logic only needs the header
/// to decode cleanly, it does not interpret them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrimaryHeader {
    /// Packet identifier word.
    pub packet_id: u16,
    /// Sequence control word.
    pub sequence_control: u16,
    /// Total packet length field.
    pub packet_length: u16,
}

impl PrimaryHeader {
    /// Decodes a primary header from the front of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < PRIMARY_HEADER_LEN {
            return Err(FrameError::TooShort {
                layer: FrameLayer::PrimaryHeader,
                needed: PRIMARY_HEADER_LEN,
                got: bytes.len(),
            });
        }

        Ok(Self {
            packet_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            sequence_control: u16::from_be_bytes([bytes[2], bytes[3]]),
            packet_length: u16::from_be_bytes([bytes[4], bytes[5]]),
        })
    }

    /// Encodes the primary header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; PRIMARY_HEADER_LEN] {
        let mut buf = [0u8; PRIMARY_HEADER_LEN];
        buf[0..2].copy_from_slice(&self.packet_id.to_be_bytes());
        buf[2..4].copy_from_slice(&self.sequence_control.to_be_bytes());
        buf[4..6].copy_from_slice(&self.packet_length.to_be_bytes());
        buf
    }
}

/// Secondary header: when the sample was taken and by which subsystem.
///
/// Wire format (10 bytes, big-endian):
/// - Bytes 0-7: Unix timestamp in seconds (u64)
/// - Bytes 8-9: subsystem identifier (u16)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecondaryHeader {
    /// Sensor sample time, Unix seconds.
    pub timestamp: u64,
    /// Identifier of the producing subsystem.
    pub subsystem_id: u16,
}

impl SecondaryHeader {
    /// Decodes a secondary header from the front of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < SECONDARY_HEADER_LEN {
            return Err(FrameError::TooShort {
                layer: FrameLayer::SecondaryHeader,
                needed: SECONDARY_HEADER_LEN,
                got: bytes.len(),
            });
        }

        Ok(Self {
            timestamp: u64::from_be_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
            subsystem_id: u16::from_be_bytes([bytes[8], bytes[9]]),
        })
    }

    /// Encodes the secondary header to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; SECONDARY_HEADER_LEN] {
        let mut buf = [0u8; SECONDARY_HEADER_LEN];
        buf[0..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..10].copy_from_slice(&self.subsystem_id.to_be_bytes());
        buf
    }
}

/// The measurement vector carried by one frame.
///
/// Wire format (16 bytes): four big-endian IEEE-754 f32 values in field
/// order temperature, battery, altitude, signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryPayload {
    /// Temperature in degrees Celsius.
    pub temperature: f32,
    /// Battery charge in percent.
    pub battery: f32,
    /// Altitude in kilometres.
    pub altitude: f32,
    /// Signal strength in dB.
    pub signal: f32,
}

impl TelemetryPayload {
    /// Decodes a payload from the front of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < PAYLOAD_LEN {
            return Err(FrameError::TooShort {
                layer: FrameLayer::Payload,
                needed: PAYLOAD_LEN,
                got: bytes.len(),
            });
        }

        Ok(Self {
            temperature: f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            battery: f32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            altitude: f32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            signal: f32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
        })
    }

    /// Encodes the payload to bytes.
    #[must_use]
    pub fn encode(&self) -> [u8; PAYLOAD_LEN] {
        let mut buf = [0u8; PAYLOAD_LEN];
        buf[0..4].copy_from_slice(&self.temperature.to_be_bytes());
        buf[4..8].copy_from_slice(&self.battery.to_be_bytes());
        buf[8..12].copy_from_slice(&self.altitude.to_be_bytes());
        buf[12..16].copy_from_slice(&self.signal.to_be_bytes());
        buf
    }
}

/// One fully decoded telemetry frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    /// Primary header, consumed for framing validity only.
    pub primary: PrimaryHeader,
    /// Secondary header.
    pub secondary: SecondaryHeader,
    /// Measurement payload.
    pub payload: TelemetryPayload,
}

impl Frame {
    /// Decodes a frame from the front of `bytes`, layer by layer.
    ///
    /// Consumes exactly [`FRAME_LEN`] bytes; trailing bytes are ignored.
    /// Fails with [`FrameError::TooShort`] naming the layer at which the
    /// input ran out, without producing a partial frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let primary = PrimaryHeader::decode(bytes)?;
        let rest = &bytes[PRIMARY_HEADER_LEN..];

        let secondary = SecondaryHeader::decode(rest)?;
        let rest = &rest[SECONDARY_HEADER_LEN..];

        let payload = TelemetryPayload::decode(rest)?;

        Ok(Self {
            primary,
            secondary,
            payload,
        })
    }

    /// Encodes the frame to its 32-byte wire form.
    #[must_use]
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut buf = [0u8; FRAME_LEN];
        buf[..PRIMARY_HEADER_LEN].copy_from_slice(&self.primary.encode());
        buf[PRIMARY_HEADER_LEN..PRIMARY_HEADER_LEN + SECONDARY_HEADER_LEN]
            .copy_from_slice(&self.secondary.encode());
        buf[PRIMARY_HEADER_LEN + SECONDARY_HEADER_LEN..].copy_from_slice(&self.payload.encode());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame {
            primary: PrimaryHeader {
                packet_id: 0x0801,
                sequence_control: 0xC042,
                packet_length: 0x0019,
            },
            secondary: SecondaryHeader {
                timestamp: 1_700_000_000,
                subsystem_id: 7,
            },
            payload: TelemetryPayload {
                temperature: 25.5,
                battery: 88.0,
                altitude: 525.0,
                signal: -52.5,
            },
        }
    }

    #[test]
    fn frame_roundtrip() {
        let frame = sample_frame();
        let bytes = frame.encode();
        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(frame, decoded);

        // Re-encoding the decoded frame reproduces the original bytes.
        assert_eq!(bytes, decoded.encode());
    }

    #[test]
    fn decode_is_big_endian() {
        let mut bytes = [0u8; FRAME_LEN];
        // packet_id = 0x1234
        bytes[0] = 0x12;
        bytes[1] = 0x34;
        // timestamp = 2 (most significant bytes zero)
        bytes[13] = 0x02;
        // subsystem_id = 0x0102
        bytes[14] = 0x01;
        bytes[15] = 0x02;
        // temperature = 1.0f32 = 0x3F800000
        bytes[16] = 0x3F;
        bytes[17] = 0x80;

        let frame = Frame::decode(&bytes).unwrap();
        assert_eq!(frame.primary.packet_id, 0x1234);
        assert_eq!(frame.secondary.timestamp, 2);
        assert_eq!(frame.secondary.subsystem_id, 0x0102);
        assert_eq!(frame.payload.temperature, 1.0);
        assert_eq!(frame.payload.battery, 0.0);
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        let frame = sample_frame();
        let mut bytes = frame.encode().to_vec();
        bytes.extend_from_slice(&[0xFF; 8]);

        let decoded = Frame::decode(&bytes).unwrap();
        assert_eq!(frame, decoded);
    }

    #[test]
    fn too_short_at_primary_header() {
        let err = Frame::decode(&[0u8; 3]).unwrap_err();
        assert_eq!(
            err,
            FrameError::TooShort {
                layer: FrameLayer::PrimaryHeader,
                needed: PRIMARY_HEADER_LEN,
                got: 3,
            }
        );
    }

    #[test]
    fn too_short_at_secondary_header() {
        // 10 bytes: enough for the primary header, 4 left for the secondary.
        let err = Frame::decode(&[0u8; 10]).unwrap_err();
        assert_eq!(
            err,
            FrameError::TooShort {
                layer: FrameLayer::SecondaryHeader,
                needed: SECONDARY_HEADER_LEN,
                got: 4,
            }
        );
    }

    #[test]
    fn too_short_at_payload() {
        let err = Frame::decode(&[0u8; 20]).unwrap_err();
        assert_eq!(
            err,
            FrameError::TooShort {
                layer: FrameLayer::Payload,
                needed: PAYLOAD_LEN,
                got: 4,
            }
        );
    }

    #[test]
    fn empty_input() {
        let err = Frame::decode(&[]).unwrap_err();
        assert_eq!(
            err,
            FrameError::TooShort {
                layer: FrameLayer::PrimaryHeader,
                needed: PRIMARY_HEADER_LEN,
                got: 0,
            }
        );
    }

    #[test]
    fn decoder_does_no_semantic_validation() {
        // An implausible timestamp and out-of-envelope values still decode:
        // range policy belongs to the detector.
        let frame = Frame {
            primary: PrimaryHeader {
                packet_id: 0,
                sequence_control: 0,
                packet_length: 0,
            },
            secondary: SecondaryHeader {
                timestamp: u64::MAX,
                subsystem_id: u16::MAX,
            },
            payload: TelemetryPayload {
                temperature: 9000.0,
                battery: -12.0,
                altitude: f32::NAN,
                signal: f32::INFINITY,
            },
        };

        let decoded = Frame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.secondary.timestamp, u64::MAX);
        assert!(decoded.payload.altitude.is_nan());
    }
}
