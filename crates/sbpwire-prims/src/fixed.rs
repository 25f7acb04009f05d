//! Packed fixed-point quantities.
//!
//! A value in `Q{int}.{frac}` format is stored as a signed two's-complement
//! whole part of `int` bits followed by an unsigned fractional part of `frac`
//! bits, both little-endian. The fractional unit is `1 / 2^frac`. Carrier phase
//! uses Q32.8: five bytes, whole cycles then 1/256 cycles.

use bytes::{Buf, BufMut};

use crate::error::{Result, WireError};
use crate::prims::ensure_remaining;

/// Widths of a byte-aligned fixed-point layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QFormat {
    int_bits: u32,
    frac_bits: u32,
}

impl QFormat {
    /// 32 whole bits, 8 fractional bits (carrier phase).
    pub const Q32_8: QFormat = QFormat {
        int_bits: 32,
        frac_bits: 8,
    };

    /// Create a format. Both widths must be whole bytes; the whole part
    /// takes 8..=64 bits and the fraction 0..=64 bits.
    pub fn new(int_bits: u32, frac_bits: u32) -> Result<Self> {
        let valid = int_bits % 8 == 0
            && frac_bits % 8 == 0
            && (8..=64).contains(&int_bits)
            && frac_bits <= 64;
        if !valid {
            return Err(WireError::InvalidFormat {
                int_bits,
                frac_bits,
            });
        }
        Ok(Self {
            int_bits,
            frac_bits,
        })
    }

    pub fn int_bits(&self) -> u32 {
        self.int_bits
    }

    pub fn frac_bits(&self) -> u32 {
        self.frac_bits
    }

    /// Total encoded width in bytes.
    pub fn width(&self) -> usize {
        ((self.int_bits + self.frac_bits) / 8) as usize
    }

    fn int_bytes(&self) -> usize {
        (self.int_bits / 8) as usize
    }

    fn frac_bytes(&self) -> usize {
        (self.frac_bits / 8) as usize
    }

    /// Convert a (whole, fraction) pair to a float. The fraction always adds
    /// to the whole part: `(-1, 128)` in Q32.8 is `-0.5`.
    pub fn to_f64(&self, whole: i64, frac: u64) -> f64 {
        whole as f64 + frac as f64 / 2f64.powi(self.frac_bits as i32)
    }
}

impl Default for QFormat {
    fn default() -> Self {
        Self::Q32_8
    }
}

/// Append a fixed-point value.
///
/// Fails with [`WireError::ValueOutOfRange`] when either part does not fit
/// its declared width; nothing is written in that case.
pub fn write_fixed<B: BufMut>(buf: &mut B, format: QFormat, whole: i64, frac: u64) -> Result<()> {
    let int_bits = format.int_bits;
    if int_bits < 64 {
        let min = -(1i64 << (int_bits - 1));
        let max = (1i64 << (int_bits - 1)) - 1;
        if whole < min || whole > max {
            return Err(WireError::ValueOutOfRange {
                what: "fixed-point whole part",
                value: whole as i128,
                bits: int_bits,
            });
        }
    }
    let frac_bits = format.frac_bits;
    if frac_bits < 64 && frac >> frac_bits != 0 {
        return Err(WireError::ValueOutOfRange {
            what: "fixed-point fraction",
            value: frac as i128,
            bits: frac_bits,
        });
    }

    buf.put_int_le(whole, format.int_bytes());
    if format.frac_bytes() > 0 {
        buf.put_uint_le(frac, format.frac_bytes());
    }
    Ok(())
}

/// Consume a fixed-point value, sign-extending the whole part.
pub fn read_fixed<B: Buf>(buf: &mut B, format: QFormat) -> Result<(i64, u64)> {
    ensure_remaining(buf, format.width())?;
    let raw = buf.get_uint_le(format.int_bytes());
    let shift = 64 - format.int_bits;
    let whole = ((raw << shift) as i64) >> shift;
    let frac = if format.frac_bytes() > 0 {
        buf.get_uint_le(format.frac_bytes())
    } else {
        0
    };
    Ok((whole, frac))
}

/// Append a Q32.8 value (5 bytes).
pub fn write_q32_8<B: BufMut>(buf: &mut B, whole: i32, frac: u8) {
    buf.put_i32_le(whole);
    buf.put_u8(frac);
}

/// Consume a Q32.8 value (5 bytes).
pub fn read_q32_8<B: Buf>(buf: &mut B) -> Result<(i32, u8)> {
    ensure_remaining(buf, QFormat::Q32_8.width())?;
    Ok((buf.get_i32_le(), buf.get_u8()))
}
