use bytes::{BufMut, Bytes, BytesMut};
use sbpwire_prims::crc16;
use sbpwire_schema::{payload, DescriptorSource, Record, SchemaError, MAX_PAYLOAD_LEN};

use crate::error::{FrameError, Result};

/// Start-of-frame marker.
pub const PREAMBLE: u8 = 0x55;

/// Header after the preamble: msg type (2) + sender (2) + length (1) = 5 bytes.
pub const HEADER_SIZE: usize = 5;

/// Trailing CRC-16.
pub const CRC_SIZE: usize = 2;

/// Bytes a frame adds around its payload: preamble + header + CRC.
pub const FRAME_OVERHEAD: usize = 1 + HEADER_SIZE + CRC_SIZE;

/// Largest payload the one-byte length field can describe.
pub const MAX_PAYLOAD: usize = MAX_PAYLOAD_LEN;

/// A validated frame: routing header plus raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Message type, selects the payload descriptor.
    pub msg_type: u16,
    /// Sender identifier, opaque to the codec.
    pub sender: u16,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(msg_type: u16, sender: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type,
            sender,
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// Encode a frame into the wire format.
///
/// Wire format (all little-endian):
/// ```text
/// ┌──────────┬──────────┬──────────┬────────┬─────────────┬──────────┐
/// │ Preamble │ Msg type │ Sender   │ Length │ Payload     │ CRC-16   │
/// │ 0x55     │ (2B)     │ (2B)     │ (1B)   │ (Length B)  │ (2B)     │
/// └──────────┴──────────┴──────────┴────────┴─────────────┴──────────┘
/// ```
/// The CRC covers msg type, sender, length and payload.
pub fn encode_frame(msg_type: u16, sender: u16, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let Ok(len) = u8::try_from(payload.len()) else {
        return Err(FrameError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    };

    dst.reserve(FRAME_OVERHEAD + payload.len());
    dst.put_u8(PREAMBLE);
    let start = dst.len();
    dst.put_u16_le(msg_type);
    dst.put_u16_le(sender);
    dst.put_u8(len);
    dst.put_slice(payload);
    let crc = crc16(&dst[start..], 0);
    dst.put_u16_le(crc);
    Ok(())
}

/// Encode a record with its registered descriptor, then frame it.
pub fn encode_message<S: DescriptorSource + ?Sized>(
    source: &S,
    msg_type: u16,
    sender: u16,
    record: &Record,
    dst: &mut BytesMut,
) -> Result<()> {
    let descriptor = source
        .lookup(msg_type)
        .ok_or(SchemaError::UnknownMessage(msg_type))?;
    let payload = payload::encode(&descriptor, record)?;
    encode_frame(msg_type, sender, &payload, dst)
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum payload size in bytes, at most 255. Default: 255.
    pub max_payload_size: usize,
    /// Decode payloads through the registry. When false, every intact frame
    /// is surfaced raw. Default: true.
    pub decode_payloads: bool,
    /// Only surface frames from this sender. Default: all senders.
    pub sender_filter: Option<u16>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD,
            decode_payloads: true,
            sender_filter: None,
        }
    }
}
