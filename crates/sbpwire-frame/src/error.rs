use sbpwire_schema::SchemaError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The received CRC does not match the header and payload.
    #[error(
        "CRC mismatch for message type {msg_type:#06x} from sender {sender:#06x} \
         (computed {expected:#06x}, received {actual:#06x})"
    )]
    CrcMismatch {
        msg_type: u16,
        sender: u16,
        expected: u16,
        actual: u16,
    },

    /// The frame was intact but its payload does not fit the registered descriptor.
    #[error("failed to decode message type {msg_type:#06x} from sender {sender:#06x}: {source}")]
    Payload {
        msg_type: u16,
        sender: u16,
        source: SchemaError,
    },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A record could not be encoded.
    #[error("failed to encode payload: {0}")]
    Schema(#[from] SchemaError),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
