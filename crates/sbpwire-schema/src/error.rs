use sbpwire_prims::WireError;

/// Errors that can occur while describing, encoding or decoding payloads.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// A fixed-offset field extends past the end of the payload.
    #[error("field {field} at offset {offset} (width {width}) exceeds payload length {len}")]
    FieldOutOfBounds {
        field: String,
        offset: usize,
        width: usize,
        len: usize,
    },

    /// The payload length disagrees with the length its layout implies.
    #[error("field {field}: layout implies {expected} payload bytes, got {actual}")]
    LengthMismatch {
        field: String,
        expected: usize,
        actual: usize,
    },

    /// A field required by the descriptor is absent from the record.
    #[error("record is missing required field {field}")]
    RecordIncomplete { field: String },

    /// A record value does not match the kind its field declares.
    #[error("field {field}: expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A record value does not fit the width its field declares.
    #[error("field {field}: value {value} does not fit in {bits} bits")]
    ValueOutOfRange { field: String, value: i128, bits: u32 },

    /// The encoded payload exceeds what a frame can carry.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The descriptor itself is malformed.
    #[error("invalid descriptor {name}: {reason}")]
    InvalidDescriptor { name: String, reason: String },

    /// No descriptor is registered for the message type.
    #[error("no descriptor registered for message type {0:#06x}")]
    UnknownMessage(u16),

    /// A descriptor is already registered and replacement is disabled.
    #[error("message type {0:#06x} is already registered")]
    AlreadyRegistered(u16),

    /// Descriptor JSON could not be parsed.
    #[error("descriptor is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A descriptor file could not be loaded.
    #[error("failed to load descriptor: {0}")]
    LoadFailed(String),

    /// A primitive could not be packed or unpacked.
    #[error(transparent)]
    Wire(#[from] WireError),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
