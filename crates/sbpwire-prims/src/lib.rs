//! Little-endian primitive, fixed-point and CRC-16 codecs for the SBP wire format.
//!
//! This is the lowest layer of sbpwire. Every multi-byte quantity on the wire
//! is little-endian, and every structure is packed with no alignment padding,
//! so fields are written one at a time through the helpers here rather than
//! relying on native struct layout.
//!
//! - [`prims`]: fixed-width integers and IEEE floats
//! - [`fixed`]: signed whole / unsigned fraction fixed-point values (Q32.8 and friends)
//! - [`crc`]: CRC-16/XMODEM used for frame integrity

pub mod crc;
pub mod error;
pub mod fixed;
pub mod prims;

pub use crc::{checksum, crc16, Crc16};
pub use error::{Result, WireError};
pub use fixed::{read_fixed, read_q32_8, write_fixed, write_q32_8, QFormat};
pub use prims::*;
