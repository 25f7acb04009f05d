//! Codec core for SBP, a framed binary GNSS telemetry protocol.
//!
//! sbpwire turns a raw receiver byte stream into validated, typed messages
//! and encodes messages back into frames. Message layouts are data, so new
//! message types can be registered at runtime from JSON descriptors.
//!
//! # Crate Structure
//!
//! - [`prims`]: little-endian primitives, Q32.8 fixed-point and CRC-16
//! - [`schema`]: payload descriptors, the `Record` value model and the message registry
//! - [`frame`]: preamble-synchronized framing, stream decoder and I/O adapters
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use sbpwire::frame::{encode_message, FrameDecoder, Outcome};
//! use sbpwire::schema::{catalog, MessageRegistry, Record, Value};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(MessageRegistry::builtin()?);
//! let heartbeat = Record::new().with("flags", Value::U32(0));
//!
//! let mut wire = bytes::BytesMut::new();
//! encode_message(&registry, catalog::MSG_HEARTBEAT, 0x0042, &heartbeat, &mut wire)?;
//!
//! let mut decoder = FrameDecoder::new(Arc::clone(&registry));
//! for outcome in decoder.feed(&wire) {
//!     if let Outcome::Message(message) = outcome {
//!         assert_eq!(message.name(), "MSG_HEARTBEAT");
//!         assert_eq!(message.record, heartbeat);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Re-export primitive codec types.
pub mod prims {
    pub use sbpwire_prims::*;
}

/// Re-export descriptor, value and registry types.
pub mod schema {
    pub use sbpwire_schema::*;
}

/// Re-export frame codec types.
pub mod frame {
    pub use sbpwire_frame::*;
}
