//! Fixed-width little-endian integers and floats.
//!
//! Writers append to any [`BufMut`] and cannot fail. Readers consume from any
//! [`Buf`] and return [`WireError::TruncatedInput`] without consuming anything
//! when the value does not fit in what remains.

use bytes::{Buf, BufMut};

use crate::error::{Result, WireError};

/// Fail with `TruncatedInput` unless `needed` bytes are available.
#[inline]
pub fn ensure_remaining<B: Buf>(buf: &B, needed: usize) -> Result<()> {
    let remaining = buf.remaining();
    if remaining < needed {
        return Err(WireError::TruncatedInput { needed, remaining });
    }
    Ok(())
}

macro_rules! primitive {
    ($read:ident, $write:ident, $ty:ty, $get:ident, $put:ident) => {
        #[doc = concat!("Append a little-endian `", stringify!($ty), "`.")]
        #[inline]
        pub fn $write<B: BufMut>(buf: &mut B, value: $ty) {
            buf.$put(value);
        }

        #[doc = concat!("Consume a little-endian `", stringify!($ty), "`.")]
        #[inline]
        pub fn $read<B: Buf>(buf: &mut B) -> Result<$ty> {
            ensure_remaining(buf, std::mem::size_of::<$ty>())?;
            Ok(buf.$get())
        }
    };
}

primitive!(read_u8, write_u8, u8, get_u8, put_u8);
primitive!(read_u16, write_u16, u16, get_u16_le, put_u16_le);
primitive!(read_u32, write_u32, u32, get_u32_le, put_u32_le);
primitive!(read_u64, write_u64, u64, get_u64_le, put_u64_le);
primitive!(read_s8, write_s8, i8, get_i8, put_i8);
primitive!(read_s16, write_s16, i16, get_i16_le, put_i16_le);
primitive!(read_s32, write_s32, i32, get_i32_le, put_i32_le);
primitive!(read_s64, write_s64, i64, get_i64_le, put_i64_le);
primitive!(read_f32, write_f32, f32, get_f32_le, put_f32_le);
primitive!(read_f64, write_f64, f64, get_f64_le, put_f64_le);

/// Consume exactly `len` raw bytes.
pub fn read_bytes<B: Buf>(buf: &mut B, len: usize) -> Result<Vec<u8>> {
    ensure_remaining(buf, len)?;
    let mut out = vec![0u8; len];
    buf.copy_to_slice(&mut out);
    Ok(out)
}
