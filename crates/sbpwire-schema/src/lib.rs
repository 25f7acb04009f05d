//! Data-driven payload descriptors, payload codec and message registry.
//!
//! A [`MessageDescriptor`] describes one message type's packed field layout.
//! The [`payload`] codec walks that layout to turn payload bytes into an owned
//! [`Record`] and back. The [`MessageRegistry`] maps message type ids to
//! descriptors and is what the frame decoder dispatches through.
//!
//! Descriptors are plain data: they can be built in code (see [`catalog`]),
//! or loaded from JSON at runtime without recompiling.

pub mod catalog;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod gnss;
pub mod payload;
pub mod registry;
pub mod value;

pub use config::RegistryConfig;
pub use descriptor::{ArrayLen, Field, FieldKind, FieldSpec, MessageDescriptor, MAX_PAYLOAD_LEN};
pub use error::{Result, SchemaError};
pub use gnss::{CarrierPhase, GpsTime, SignalId, WireFormat};
pub use registry::{global, DescriptorSource, MessageRegistry, SharedRegistry};
pub use value::{Record, Value};
