//! Payload descriptors: the data-driven layout of each message type.
//!
//! A descriptor is an ordered list of fields. Layout is packed: each field
//! starts where the previous one ends, and a descriptor's fixed size is the sum
//! of its field widths. At most one variable-length array is allowed, and only
//! as the last top-level field.
//!
//! Descriptors deserialize from JSON, so message types can be added at runtime:
//!
//! ```json
//! {
//!   "id": 258,
//!   "name": "MSG_EXAMPLE",
//!   "fields": [
//!     { "name": "tow", "type": "u32" },
//!     { "name": "L", "type": "fixed", "int_bits": 32, "frac_bits": 8 },
//!     { "name": "sids", "type": "array", "len": "fill",
//!       "element": { "type": "struct", "struct": "gnss_signal", "fields": [
//!         { "name": "sat", "type": "u16" },
//!         { "name": "code", "type": "u8" },
//!         { "name": "reserved", "type": "u8" } ] } }
//!   ]
//! }
//! ```

use std::collections::HashSet;

use sbpwire_prims::QFormat;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};

/// Largest payload a frame can carry.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;

/// How many elements an array holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayLen {
    /// A constant element count.
    Fixed(usize),
    /// As many elements as fill the rest of the payload.
    Fill,
    /// Count taken from an earlier unsigned integer field.
    CountField(String),
}

/// The kind of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
    /// Signed whole part followed by an unsigned fraction.
    Fixed { int_bits: u32, frac_bits: u32 },
    /// Nested packed struct.
    Struct {
        #[serde(rename = "struct")]
        type_name: String,
        fields: Vec<FieldSpec>,
    },
    Array { element: Box<FieldKind>, len: ArrayLen },
}

impl FieldKind {
    /// Q32.8 carrier-phase layout.
    pub fn q32_8() -> Self {
        FieldKind::Fixed {
            int_bits: 32,
            frac_bits: 8,
        }
    }

    pub fn structure(type_name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        FieldKind::Struct {
            type_name: type_name.into(),
            fields,
        }
    }

    pub fn array(element: FieldKind, len: ArrayLen) -> Self {
        FieldKind::Array {
            element: Box::new(element),
            len,
        }
    }

    /// Encoded width in bytes, or `None` for variable-length arrays.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            FieldKind::U8 | FieldKind::S8 => Some(1),
            FieldKind::U16 | FieldKind::S16 => Some(2),
            FieldKind::U32 | FieldKind::S32 | FieldKind::F32 => Some(4),
            FieldKind::U64 | FieldKind::S64 | FieldKind::F64 => Some(8),
            FieldKind::Fixed {
                int_bits,
                frac_bits,
            } => Some((int_bits.checked_add(*frac_bits)? / 8) as usize),
            FieldKind::Struct { fields, .. } => fields
                .iter()
                .try_fold(0usize, |acc, f| acc.checked_add(f.kind.fixed_width()?)),
            FieldKind::Array {
                element,
                len: ArrayLen::Fixed(n),
            } => element.fixed_width()?.checked_mul(*n),
            FieldKind::Array { .. } => None,
        }
    }

    /// Short name of the kind, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldKind::U8 => "u8",
            FieldKind::U16 => "u16",
            FieldKind::U32 => "u32",
            FieldKind::U64 => "u64",
            FieldKind::S8 => "s8",
            FieldKind::S16 => "s16",
            FieldKind::S32 => "s32",
            FieldKind::S64 => "s64",
            FieldKind::F32 => "f32",
            FieldKind::F64 => "f64",
            FieldKind::Fixed { .. } => "fixed",
            FieldKind::Struct { .. } => "struct",
            FieldKind::Array { .. } => "array",
        }
    }

    pub(crate) fn is_unsigned(&self) -> bool {
        matches!(
            self,
            FieldKind::U8 | FieldKind::U16 | FieldKind::U32 | FieldKind::U64
        )
    }

    pub(crate) fn q_format(&self) -> Option<QFormat> {
        match *self {
            FieldKind::Fixed {
                int_bits,
                frac_bits,
            } => QFormat::new(int_bits, frac_bits).ok(),
            _ => None,
        }
    }
}

/// A named field as written in a descriptor, before layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A top-level field with its resolved byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    offset: usize,
    kind: FieldKind,
}

impl Field {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Width in bytes, `None` for the trailing variable-length array.
    pub fn width(&self) -> Option<usize> {
        self.kind.fixed_width()
    }
}

/// Validated, laid-out description of one message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MessageSpec", into = "MessageSpec")]
pub struct MessageDescriptor {
    id: u16,
    name: String,
    fields: Vec<Field>,
    fixed_len: usize,
}

impl MessageDescriptor {
    /// Lay out and validate a descriptor.
    pub fn new(id: u16, name: impl Into<String>, specs: Vec<FieldSpec>) -> Result<Self> {
        let name = name.into();
        let invalid = |reason: String| SchemaError::InvalidDescriptor {
            name: name.clone(),
            reason,
        };

        let mut seen = HashSet::new();
        let mut fields: Vec<Field> = Vec::with_capacity(specs.len());
        let mut offset = 0usize;
        let count = specs.len();

        for (index, spec) in specs.into_iter().enumerate() {
            if !seen.insert(spec.name.clone()) {
                return Err(invalid(format!("duplicate field {}", spec.name)));
            }

            let width = match &spec.kind {
                FieldKind::Array {
                    element,
                    len: len @ (ArrayLen::Fill | ArrayLen::CountField(_)),
                } => {
                    if index + 1 != count {
                        return Err(invalid(format!(
                            "variable-length array {} must be the last field",
                            spec.name
                        )));
                    }
                    let element_width = validate_fixed(element, &spec.name).map_err(invalid)?;
                    if element_width == 0 {
                        return Err(invalid(format!(
                            "array {} has zero-width elements",
                            spec.name
                        )));
                    }
                    if let ArrayLen::CountField(counter) = len {
                        let valid = fields
                            .iter()
                            .any(|f| &f.name == counter && f.kind.is_unsigned());
                        if !valid {
                            return Err(invalid(format!(
                                "array {} counts from {counter}, which is not an earlier unsigned field",
                                spec.name
                            )));
                        }
                    }
                    0
                }
                kind => validate_fixed(kind, &spec.name).map_err(invalid)?,
            };

            let end = offset
                .checked_add(width)
                .filter(|end| *end <= MAX_PAYLOAD_LEN)
                .ok_or_else(|| {
                    invalid(format!(
                        "fixed part exceeds {MAX_PAYLOAD_LEN} bytes at field {}",
                        spec.name
                    ))
                })?;
            fields.push(Field {
                name: spec.name,
                offset,
                kind: spec.kind,
            });
            offset = end;
        }

        Ok(Self {
            id,
            name,
            fields,
            fixed_len: offset,
        })
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Combined width of all fixed-width fields.
    pub fn fixed_len(&self) -> usize {
        self.fixed_len
    }

    /// The trailing variable-length array, if the descriptor has one.
    pub fn tail(&self) -> Option<&Field> {
        self.fields.last().filter(|f| f.width().is_none())
    }

    /// Same layout under a different message type.
    pub fn with_id(mut self, id: u16) -> Self {
        self.id = id;
        self
    }
}

/// Returns the width of a fixed-width kind, or why it is not valid.
fn validate_fixed(kind: &FieldKind, path: &str) -> std::result::Result<usize, String> {
    match kind {
        FieldKind::Fixed {
            int_bits,
            frac_bits,
        } => QFormat::new(*int_bits, *frac_bits)
            .map(|q| q.width())
            .map_err(|err| format!("field {path}: {err}")),
        FieldKind::Struct { fields, .. } => {
            let mut seen = HashSet::new();
            let mut width = 0usize;
            for field in fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(format!("duplicate field {path}.{}", field.name));
                }
                let child = validate_fixed(&field.kind, &format!("{path}.{}", field.name))?;
                width = within_payload(width.checked_add(child), path)?;
            }
            Ok(width)
        }
        FieldKind::Array {
            element,
            len: ArrayLen::Fixed(n),
        } => {
            let element_width = validate_fixed(element, &format!("{path}[]"))?;
            if element_width == 0 {
                return Err(format!("array {path} has zero-width elements"));
            }
            within_payload(element_width.checked_mul(*n), path)
        }
        FieldKind::Array { .. } => Err(format!(
            "variable-length array {path} is only allowed as the last top-level field"
        )),
        primitive => primitive
            .fixed_width()
            .ok_or_else(|| format!("field {path} has no fixed width")),
    }
}

fn within_payload(width: Option<usize>, path: &str) -> std::result::Result<usize, String> {
    width
        .filter(|w| *w <= MAX_PAYLOAD_LEN)
        .ok_or_else(|| format!("field {path} is wider than {MAX_PAYLOAD_LEN} bytes"))
}

/// Serialized form of a [`MessageDescriptor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSpec {
    pub id: u16,
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

impl TryFrom<MessageSpec> for MessageDescriptor {
    type Error = SchemaError;

    fn try_from(spec: MessageSpec) -> Result<Self> {
        MessageDescriptor::new(spec.id, spec.name, spec.fields)
    }
}

impl From<MessageDescriptor> for MessageSpec {
    fn from(desc: MessageDescriptor) -> Self {
        MessageSpec {
            id: desc.id,
            name: desc.name,
            fields: desc
                .fields
                .into_iter()
                .map(|f| FieldSpec::new(f.name, f.kind))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal() -> FieldKind {
        FieldKind::structure(
            "gnss_signal",
            vec![
                FieldSpec::new("sat", FieldKind::U16),
                FieldSpec::new("code", FieldKind::U8),
                FieldSpec::new("reserved", FieldKind::U8),
            ],
        )
    }

    #[test]
    fn offsets_are_packed() {
        let desc = MessageDescriptor::new(
            1,
            "packed",
            vec![
                FieldSpec::new("a", FieldKind::U8),
                FieldSpec::new("b", FieldKind::U32),
                FieldSpec::new("L", FieldKind::q32_8()),
                FieldSpec::new("sid", signal()),
                FieldSpec::new("c", FieldKind::F64),
            ],
        )
        .unwrap();

        let offsets: Vec<_> = desc.fields().iter().map(Field::offset).collect();
        assert_eq!(offsets, vec![0, 1, 5, 10, 14]);
        assert_eq!(desc.fixed_len(), 22);
        assert!(desc.tail().is_none());
    }

    #[test]
    fn trailing_array_has_offset_but_no_width() {
        let desc = MessageDescriptor::new(
            2,
            "tail",
            vec![
                FieldSpec::new("n", FieldKind::U8),
                FieldSpec::new(
                    "sids",
                    FieldKind::array(signal(), ArrayLen::CountField("n".into())),
                ),
            ],
        )
        .unwrap();

        let tail = desc.tail().unwrap();
        assert_eq!(tail.name(), "sids");
        assert_eq!(tail.offset(), 1);
        assert_eq!(tail.width(), None);
        assert_eq!(desc.fixed_len(), 1);
    }

    #[test]
    fn rejects_variable_array_before_last_field() {
        let err = MessageDescriptor::new(
            3,
            "bad",
            vec![
                FieldSpec::new("xs", FieldKind::array(FieldKind::U8, ArrayLen::Fill)),
                FieldSpec::new("after", FieldKind::U8),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDescriptor { .. }));
    }

    #[test]
    fn rejects_nested_variable_array() {
        let nested = FieldKind::structure(
            "inner",
            vec![FieldSpec::new(
                "xs",
                FieldKind::array(FieldKind::U8, ArrayLen::Fill),
            )],
        );
        assert!(MessageDescriptor::new(4, "bad", vec![FieldSpec::new("s", nested)]).is_err());
    }

    #[test]
    fn rejects_bad_count_field() {
        let missing = MessageDescriptor::new(
            5,
            "bad",
            vec![FieldSpec::new(
                "xs",
                FieldKind::array(FieldKind::U8, ArrayLen::CountField("n".into())),
            )],
        );
        assert!(missing.is_err());

        let signed = MessageDescriptor::new(
            5,
            "bad",
            vec![
                FieldSpec::new("n", FieldKind::S8),
                FieldSpec::new(
                    "xs",
                    FieldKind::array(FieldKind::U8, ArrayLen::CountField("n".into())),
                ),
            ],
        );
        assert!(signed.is_err());
    }

    #[test]
    fn rejects_duplicates_and_bad_formats() {
        assert!(MessageDescriptor::new(
            6,
            "dup",
            vec![
                FieldSpec::new("a", FieldKind::U8),
                FieldSpec::new("a", FieldKind::U16),
            ],
        )
        .is_err());

        assert!(MessageDescriptor::new(
            6,
            "q",
            vec![FieldSpec::new(
                "q",
                FieldKind::Fixed {
                    int_bits: 12,
                    frac_bits: 4
                }
            )],
        )
        .is_err());

        assert!(MessageDescriptor::new(
            6,
            "empty",
            vec![FieldSpec::new(
                "xs",
                FieldKind::array(FieldKind::structure("none", vec![]), ArrayLen::Fill)
            )],
        )
        .is_err());
    }

    #[test]
    fn rejects_oversized_fixed_part() {
        let err = MessageDescriptor::new(
            7,
            "huge",
            vec![FieldSpec::new(
                "xs",
                FieldKind::array(FieldKind::U64, ArrayLen::Fixed(40)),
            )],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDescriptor { .. }));
    }

    #[test]
    fn huge_fixed_counts_are_rejected_without_overflow() {
        let err = MessageDescriptor::new(
            8,
            "overflow",
            vec![FieldSpec::new(
                "xs",
                FieldKind::array(FieldKind::U16, ArrayLen::Fixed(usize::MAX / 2 + 1)),
            )],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDescriptor { .. }));

        let nested = FieldKind::structure(
            "pair",
            vec![
                FieldSpec::new("a", FieldKind::array(FieldKind::U64, ArrayLen::Fixed(30))),
                FieldSpec::new("b", FieldKind::array(FieldKind::U64, ArrayLen::Fixed(usize::MAX))),
            ],
        );
        assert!(MessageDescriptor::new(8, "nested", vec![FieldSpec::new("p", nested)]).is_err());

        let spread = MessageDescriptor::new(
            8,
            "spread",
            vec![
                FieldSpec::new("a", FieldKind::array(FieldKind::U8, ArrayLen::Fixed(200))),
                FieldSpec::new("b", FieldKind::array(FieldKind::U8, ArrayLen::Fixed(usize::MAX))),
            ],
        );
        assert!(spread.is_err());
        assert_eq!(
            FieldKind::array(FieldKind::U16, ArrayLen::Fixed(usize::MAX)).fixed_width(),
            None
        );
    }

    #[test]
    fn zero_width_fixed_array_is_rejected() {
        let empty = FieldKind::structure("empty", Vec::new());
        let err = MessageDescriptor::new(
            9,
            "zero",
            vec![FieldSpec::new("xs", FieldKind::array(empty.clone(), ArrayLen::Fixed(usize::MAX)))],
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDescriptor { ref reason, .. } if reason.contains("zero-width")));

        // A bare empty struct carries no count and stays valid.
        let desc = MessageDescriptor::new(9, "marker", vec![FieldSpec::new("m", empty)]).unwrap();
        assert_eq!(desc.fixed_len(), 0);
    }

    #[test]
    fn json_descriptor() {
        let json = r#"{
            "id": 258,
            "name": "MSG_EXAMPLE",
            "fields": [
                { "name": "tow", "type": "u32" },
                { "name": "L", "type": "fixed", "int_bits": 32, "frac_bits": 8 },
                { "name": "sids", "type": "array", "len": "fill",
                  "element": { "type": "struct", "struct": "gnss_signal", "fields": [
                    { "name": "sat", "type": "u16" },
                    { "name": "code", "type": "u8" },
                    { "name": "reserved", "type": "u8" } ] } }
            ]
        }"#;

        let desc: MessageDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(desc.id(), 258);
        assert_eq!(desc.name(), "MSG_EXAMPLE");
        assert_eq!(desc.fixed_len(), 9);
        assert_eq!(desc.tail().unwrap().offset(), 9);
        assert_eq!(desc.field("L").unwrap().kind(), &FieldKind::q32_8());

        let again: MessageDescriptor =
            serde_json::from_str(&serde_json::to_string(&desc).unwrap()).unwrap();
        assert_eq!(again, desc);
    }

    #[test]
    fn json_descriptor_is_validated() {
        let json = r#"{ "id": 1, "name": "bad", "fields": [
            { "name": "xs", "type": "array", "len": "fill", "element": { "type": "u8" } },
            { "name": "y", "type": "u8" }
        ] }"#;
        assert!(serde_json::from_str::<MessageDescriptor>(json).is_err());
    }
}
