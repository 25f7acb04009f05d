//! Typed GNSS wire structs.
//!
//! These mirror the built-in catalog structs but are packed and unpacked
//! directly, without going through a descriptor.

use bytes::{Buf, BufMut};
use sbpwire_prims::{self as prims, QFormat, Result as WireResult};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::value::{Record, Value};

/// A fixed-size packed wire struct.
pub trait WireFormat: Sized {
    /// Encoded size in bytes.
    const WIRE_LEN: usize;

    /// Append the packed representation.
    fn write<B: BufMut>(&self, buf: &mut B);

    /// Consume the packed representation.
    fn parse<B: Buf>(buf: &mut B) -> WireResult<Self>;

    /// Dynamic form, matching the built-in catalog layout.
    fn to_value(&self) -> Value;

    /// Build from the dynamic form.
    fn from_value(value: &Value) -> Result<Self>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(Self::WIRE_LEN);
        self.write(&mut out);
        out
    }
}

/// Signal identifier: satellite, signal code, reserved byte.
///
/// `reserved` carries no documented meaning and is passed through verbatim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SignalId {
    pub sat: u16,
    pub code: u8,
    pub reserved: u8,
}

impl SignalId {
    pub fn new(sat: u16, code: u8) -> Self {
        Self {
            sat,
            code,
            reserved: 0,
        }
    }
}

impl WireFormat for SignalId {
    const WIRE_LEN: usize = 4;

    fn write<B: BufMut>(&self, buf: &mut B) {
        prims::write_u16(buf, self.sat);
        prims::write_u8(buf, self.code);
        prims::write_u8(buf, self.reserved);
    }

    fn parse<B: Buf>(buf: &mut B) -> WireResult<Self> {
        prims::ensure_remaining(buf, Self::WIRE_LEN)?;
        Ok(Self {
            sat: prims::read_u16(buf)?,
            code: prims::read_u8(buf)?,
            reserved: prims::read_u8(buf)?,
        })
    }

    fn to_value(&self) -> Value {
        Value::Struct(
            Record::new()
                .with("sat", Value::U16(self.sat))
                .with("code", Value::U8(self.code))
                .with("reserved", Value::U8(self.reserved)),
        )
    }

    fn from_value(value: &Value) -> Result<Self> {
        let record = struct_of(value, "gnss_signal")?;
        Ok(Self {
            sat: field(record, "sat", |v| match v {
                Value::U16(x) => Some(*x),
                _ => None,
            })?,
            code: field(record, "code", u8_of)?,
            reserved: field(record, "reserved", u8_of)?,
        })
    }
}

/// Millisecond-accurate GPS time.
///
/// `tow` is bounded by one week of milliseconds in practice; the codec does
/// not enforce it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GpsTime {
    /// Milliseconds since the start of the GPS week.
    pub tow: u32,
    /// GPS week number.
    pub wn: u16,
}

impl WireFormat for GpsTime {
    const WIRE_LEN: usize = 6;

    fn write<B: BufMut>(&self, buf: &mut B) {
        prims::write_u32(buf, self.tow);
        prims::write_u16(buf, self.wn);
    }

    fn parse<B: Buf>(buf: &mut B) -> WireResult<Self> {
        prims::ensure_remaining(buf, Self::WIRE_LEN)?;
        Ok(Self {
            tow: prims::read_u32(buf)?,
            wn: prims::read_u16(buf)?,
        })
    }

    fn to_value(&self) -> Value {
        Value::Struct(
            Record::new()
                .with("tow", Value::U32(self.tow))
                .with("wn", Value::U16(self.wn)),
        )
    }

    fn from_value(value: &Value) -> Result<Self> {
        let record = struct_of(value, "gps_time")?;
        Ok(Self {
            tow: field(record, "tow", |v| match v {
                Value::U32(x) => Some(*x),
                _ => None,
            })?,
            wn: field(record, "wn", |v| match v {
                Value::U16(x) => Some(*x),
                _ => None,
            })?,
        })
    }
}

/// Carrier phase in Q32.8 cycles.
///
/// Shares its sign with the pseudorange it accompanies; that relationship is
/// preserved but not checked here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CarrierPhase {
    /// Whole cycles.
    pub i: i32,
    /// Fractional part in 1/256 cycles.
    pub f: u8,
}

impl CarrierPhase {
    /// Phase in cycles as a float.
    pub fn cycles(&self) -> f64 {
        QFormat::Q32_8.to_f64(i64::from(self.i), u64::from(self.f))
    }
}

impl WireFormat for CarrierPhase {
    const WIRE_LEN: usize = 5;

    fn write<B: BufMut>(&self, buf: &mut B) {
        prims::write_q32_8(buf, self.i, self.f);
    }

    fn parse<B: Buf>(buf: &mut B) -> WireResult<Self> {
        let (i, f) = prims::read_q32_8(buf)?;
        Ok(Self { i, f })
    }

    fn to_value(&self) -> Value {
        Value::Fixed {
            whole: i64::from(self.i),
            frac: u64::from(self.f),
        }
    }

    fn from_value(value: &Value) -> Result<Self> {
        let (whole, frac) = value.as_fixed().ok_or_else(|| SchemaError::TypeMismatch {
            field: "carrier_phase".to_string(),
            expected: "fixed",
            actual: value.kind_name(),
        })?;
        let out_of_range = |value: i128, bits| SchemaError::ValueOutOfRange {
            field: "carrier_phase".to_string(),
            value,
            bits,
        };
        Ok(Self {
            i: i32::try_from(whole).map_err(|_| out_of_range(i128::from(whole), 32))?,
            f: u8::try_from(frac).map_err(|_| out_of_range(i128::from(frac), 8))?,
        })
    }
}

fn struct_of<'a>(value: &'a Value, name: &str) -> Result<&'a Record> {
    value.as_struct().ok_or_else(|| SchemaError::TypeMismatch {
        field: name.to_string(),
        expected: "struct",
        actual: value.kind_name(),
    })
}

fn u8_of(value: &Value) -> Option<u8> {
    match value {
        Value::U8(x) => Some(*x),
        _ => None,
    }
}

fn field<T>(record: &Record, name: &str, extract: impl Fn(&Value) -> Option<T>) -> Result<T> {
    let value = record.get(name).ok_or_else(|| SchemaError::RecordIncomplete {
        field: name.to_string(),
    })?;
    extract(value).ok_or_else(|| SchemaError::TypeMismatch {
        field: name.to_string(),
        expected: std::any::type_name::<T>(),
        actual: value.kind_name(),
    })
}
