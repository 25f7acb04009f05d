/// Errors that can occur while packing or unpacking wire primitives.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// Not enough bytes remain to read the requested value.
    ///
    /// This is recoverable: supply more input and retry.
    #[error("truncated input (needed {needed} bytes, {remaining} remaining)")]
    TruncatedInput { needed: usize, remaining: usize },

    /// A value does not fit in the width it is being packed into.
    #[error("value {value} out of range for a {bits}-bit {what}")]
    ValueOutOfRange {
        what: &'static str,
        value: i128,
        bits: u32,
    },

    /// A fixed-point format with unsupported widths.
    #[error("invalid fixed-point format Q{int_bits}.{frac_bits}")]
    InvalidFormat { int_bits: u32, frac_bits: u32 },
}

pub type Result<T> = std::result::Result<T, WireError>;
