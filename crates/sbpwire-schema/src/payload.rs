//! Struct-level payload encode/decode driven by a [`MessageDescriptor`].

use bytes::{Buf, BufMut};
use sbpwire_prims::{self as prims, QFormat, WireError};

use crate::descriptor::{ArrayLen, FieldKind, MessageDescriptor, MAX_PAYLOAD_LEN};
use crate::error::{Result, SchemaError};
use crate::value::{Record, Value};

/// Decode a payload into an owned record.
///
/// Each fixed field is read at its declared offset. A trailing
/// variable-length array must account for every remaining byte.
pub fn decode(desc: &MessageDescriptor, bytes: &[u8]) -> Result<Record> {
    let mut record = Record::new();

    for field in desc.fields() {
        let offset = field.offset();
        match (field.kind(), field.width()) {
            (kind, Some(width)) => {
                let end = offset + width;
                if end > bytes.len() {
                    return Err(SchemaError::FieldOutOfBounds {
                        field: field.name().to_string(),
                        offset,
                        width,
                        len: bytes.len(),
                    });
                }
                let mut buf = &bytes[offset..end];
                let value = read_value(&mut buf, kind)?;
                record.insert(field.name(), value);
            }
            (FieldKind::Array { element, len }, None) => {
                let value = decode_tail(field.name(), offset, element, len, &record, bytes)?;
                record.insert(field.name(), value);
            }
            (kind, None) => {
                return Err(SchemaError::InvalidDescriptor {
                    name: desc.name().to_string(),
                    reason: format!("field {} ({}) has no width", field.name(), kind.kind_name()),
                })
            }
        }
    }

    if desc.tail().is_none() && bytes.len() != desc.fixed_len() {
        return Err(SchemaError::LengthMismatch {
            field: desc.name().to_string(),
            expected: desc.fixed_len(),
            actual: bytes.len(),
        });
    }

    Ok(record)
}

fn decode_tail(
    name: &str,
    offset: usize,
    element: &FieldKind,
    len: &ArrayLen,
    record: &Record,
    bytes: &[u8],
) -> Result<Value> {
    let element_width = element.fixed_width().unwrap_or(0);
    if element_width == 0 || offset > bytes.len() {
        return Err(SchemaError::FieldOutOfBounds {
            field: name.to_string(),
            offset,
            width: element_width,
            len: bytes.len(),
        });
    }

    let remaining = bytes.len() - offset;
    let count = match len {
        ArrayLen::Fill => remaining / element_width,
        ArrayLen::CountField(counter) => record
            .get(counter)
            .and_then(Value::as_u64)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| SchemaError::RecordIncomplete {
                field: counter.clone(),
            })?,
        ArrayLen::Fixed(n) => *n,
    };

    let expected = count
        .checked_mul(element_width)
        .and_then(|n| n.checked_add(offset))
        .unwrap_or(usize::MAX);
    if expected != bytes.len() {
        return Err(SchemaError::LengthMismatch {
            field: name.to_string(),
            expected,
            actual: bytes.len(),
        });
    }

    let mut buf = &bytes[offset..];
    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(read_value(&mut buf, element)?);
    }
    Ok(Value::Array(items))
}

fn read_value<B: Buf>(buf: &mut B, kind: &FieldKind) -> Result<Value> {
    let value = match kind {
        FieldKind::U8 => Value::U8(prims::read_u8(buf)?),
        FieldKind::U16 => Value::U16(prims::read_u16(buf)?),
        FieldKind::U32 => Value::U32(prims::read_u32(buf)?),
        FieldKind::U64 => Value::U64(prims::read_u64(buf)?),
        FieldKind::S8 => Value::S8(prims::read_s8(buf)?),
        FieldKind::S16 => Value::S16(prims::read_s16(buf)?),
        FieldKind::S32 => Value::S32(prims::read_s32(buf)?),
        FieldKind::S64 => Value::S64(prims::read_s64(buf)?),
        FieldKind::F32 => Value::F32(prims::read_f32(buf)?),
        FieldKind::F64 => Value::F64(prims::read_f64(buf)?),
        FieldKind::Fixed {
            int_bits,
            frac_bits,
        } => {
            let format = QFormat::new(*int_bits, *frac_bits)?;
            let (whole, frac) = prims::read_fixed(buf, format)?;
            Value::Fixed { whole, frac }
        }
        FieldKind::Struct { fields, .. } => {
            let mut nested = Record::new();
            for field in fields {
                nested.insert(field.name.as_str(), read_value(buf, &field.kind)?);
            }
            Value::Struct(nested)
        }
        FieldKind::Array {
            element,
            len: ArrayLen::Fixed(n),
        } => {
            let mut items = Vec::with_capacity(*n);
            for _ in 0..*n {
                items.push(read_value(buf, element)?);
            }
            Value::Array(items)
        }
        FieldKind::Array { .. } => {
            return Err(SchemaError::InvalidDescriptor {
                name: kind.kind_name().to_string(),
                reason: "variable-length array inside a fixed-width layout".to_string(),
            })
        }
    };
    Ok(value)
}

/// Encode a record into a payload.
///
/// Every field the descriptor names must be present. A count field for the
/// trailing array may be omitted; it is then derived from the array length.
pub fn encode(desc: &MessageDescriptor, record: &Record) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(desc.fixed_len());

    let tail_count = match desc.tail().map(|f| (f, f.kind())) {
        Some((
            tail,
            FieldKind::Array {
                len: ArrayLen::CountField(counter),
                ..
            },
        )) => {
            let items = required(record, tail.name())?;
            let items = items.as_array().ok_or_else(|| SchemaError::TypeMismatch {
                field: tail.name().to_string(),
                expected: "array",
                actual: items.kind_name(),
            })?;
            Some((counter.as_str(), items.len()))
        }
        _ => None,
    };

    for field in desc.fields() {
        let name = field.name();
        match field.kind() {
            FieldKind::Array {
                element,
                len: ArrayLen::Fill | ArrayLen::CountField(_),
            } => {
                let items = required(record, name)?;
                let items = items.as_array().ok_or_else(|| SchemaError::TypeMismatch {
                    field: name.to_string(),
                    expected: "array",
                    actual: items.kind_name(),
                })?;
                for (i, item) in items.iter().enumerate() {
                    write_value(&mut out, element, item, &format!("{name}[{i}]"))?;
                }
            }
            kind => match tail_count {
                Some((counter, count)) if counter == name => {
                    let derived = count_value(kind, count, name)?;
                    if let Some(value) = record.get(name) {
                        if std::mem::discriminant(value) != std::mem::discriminant(&derived) {
                            return Err(SchemaError::TypeMismatch {
                                field: name.to_string(),
                                expected: kind.kind_name(),
                                actual: value.kind_name(),
                            });
                        }
                        if *value != derived {
                            return Err(SchemaError::LengthMismatch {
                                field: name.to_string(),
                                expected: count,
                                actual: value
                                    .as_u64()
                                    .and_then(|n| usize::try_from(n).ok())
                                    .unwrap_or(usize::MAX),
                            });
                        }
                    }
                    write_value(&mut out, kind, &derived, name)?;
                }
                _ => write_value(&mut out, kind, required(record, name)?, name)?,
            },
        }
    }

    if out.len() > MAX_PAYLOAD_LEN {
        return Err(SchemaError::PayloadTooLarge {
            size: out.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }
    Ok(out)
}

fn required<'a>(record: &'a Record, name: &str) -> Result<&'a Value> {
    record
        .get(name)
        .ok_or_else(|| SchemaError::RecordIncomplete {
            field: name.to_string(),
        })
}

fn write_value<B: BufMut>(buf: &mut B, kind: &FieldKind, value: &Value, path: &str) -> Result<()> {
    let mismatch = || SchemaError::TypeMismatch {
        field: path.to_string(),
        expected: kind.kind_name(),
        actual: value.kind_name(),
    };

    match (kind, value) {
        (FieldKind::U8, Value::U8(x)) => prims::write_u8(buf, *x),
        (FieldKind::U16, Value::U16(x)) => prims::write_u16(buf, *x),
        (FieldKind::U32, Value::U32(x)) => prims::write_u32(buf, *x),
        (FieldKind::U64, Value::U64(x)) => prims::write_u64(buf, *x),
        (FieldKind::S8, Value::S8(x)) => prims::write_s8(buf, *x),
        (FieldKind::S16, Value::S16(x)) => prims::write_s16(buf, *x),
        (FieldKind::S32, Value::S32(x)) => prims::write_s32(buf, *x),
        (FieldKind::S64, Value::S64(x)) => prims::write_s64(buf, *x),
        (FieldKind::F32, Value::F32(x)) => prims::write_f32(buf, *x),
        (FieldKind::F64, Value::F64(x)) => prims::write_f64(buf, *x),
        (FieldKind::Fixed { .. }, _) => {
            let (whole, frac) = value.as_fixed().ok_or_else(mismatch)?;
            let format = kind.q_format().ok_or_else(mismatch)?;
            prims::write_fixed(buf, format, whole, frac).map_err(|err| match err {
                WireError::ValueOutOfRange { value, bits, .. } => SchemaError::ValueOutOfRange {
                    field: path.to_string(),
                    value,
                    bits,
                },
                other => SchemaError::Wire(other),
            })?;
        }
        (FieldKind::Struct { fields, .. }, _) => {
            let nested = value.as_struct().ok_or_else(mismatch)?;
            for field in fields {
                let child = format!("{path}.{}", field.name);
                let child_value = nested
                    .get(&field.name)
                    .ok_or_else(|| SchemaError::RecordIncomplete {
                        field: child.clone(),
                    })?;
                write_value(buf, &field.kind, child_value, &child)?;
            }
        }
        (FieldKind::Array { element, len }, _) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            if let ArrayLen::Fixed(n) = len {
                if items.len() != *n {
                    return Err(SchemaError::LengthMismatch {
                        field: path.to_string(),
                        expected: *n,
                        actual: items.len(),
                    });
                }
            }
            for (i, item) in items.iter().enumerate() {
                write_value(buf, element, item, &format!("{path}[{i}]"))?;
            }
        }
        _ => return Err(mismatch()),
    }
    Ok(())
}

/// Count of a trailing array in the count field's declared kind.
fn count_value(kind: &FieldKind, count: usize, path: &str) -> Result<Value> {
    let out_of_range = |bits| SchemaError::ValueOutOfRange {
        field: path.to_string(),
        value: count as i128,
        bits,
    };
    match kind {
        FieldKind::U8 => u8::try_from(count).map(Value::U8).map_err(|_| out_of_range(8)),
        FieldKind::U16 => u16::try_from(count).map(Value::U16).map_err(|_| out_of_range(16)),
        FieldKind::U32 => u32::try_from(count).map(Value::U32).map_err(|_| out_of_range(32)),
        FieldKind::U64 => Ok(Value::U64(count as u64)),
        other => Err(SchemaError::TypeMismatch {
            field: path.to_string(),
            expected: "unsigned integer",
            actual: other.kind_name(),
        }),
    }
}
