//! Preamble-synchronized, CRC-checked framing for SBP byte streams.
//!
//! Every message on the wire is framed as:
//! - A 1-byte preamble (`0x55`) for stream synchronization
//! - A 2-byte little-endian message type and 2-byte little-endian sender id
//! - A 1-byte payload length, then the payload
//! - A 2-byte little-endian CRC-16/XMODEM over everything after the preamble
//!
//! [`FrameDecoder`] scans arbitrary chunks of a noisy stream, resynchronizes
//! after corruption and dispatches intact frames through a
//! [`DescriptorSource`](sbpwire_schema::DescriptorSource).

pub mod codec;
pub mod decoder;
pub mod error;
#[cfg(feature = "async")]
pub mod framed;
pub mod reader;
pub mod writer;

pub use codec::{
    encode_frame, encode_message, Frame, FrameConfig, CRC_SIZE, FRAME_OVERHEAD, HEADER_SIZE,
    MAX_PAYLOAD, PREAMBLE,
};
pub use decoder::{DecodedMessage, DecoderStats, FrameDecoder, Outcome};
pub use error::{FrameError, Result};
#[cfg(feature = "async")]
pub use framed::FrameEncoder;
pub use reader::FrameReader;
pub use writer::FrameWriter;
