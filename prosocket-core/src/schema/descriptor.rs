//! Flattened type and field descriptors.

use prost_reflect::{Kind, MessageDescriptor};
use serde_json::Value;

use base64::Engine;

/// Wire type of a field, spelled the way the schema language spells it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireType {
    String,
    Bool,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Float,
    Double,
    Bytes,
    /// Reference to another message type by qualified name.
    Message(String),
    /// Reference to an enum type by qualified name.
    Enum(String),
    /// Map field with its key and value types.
    Map { key: Box<WireType>, value: Box<WireType> },
}

impl WireType {
    /// Schema-language spelling of the type.
    pub fn as_str(&self) -> &str {
        match self {
            WireType::String => "string",
            WireType::Bool => "bool",
            WireType::Int32 => "int32",
            WireType::Int64 => "int64",
            WireType::Uint32 => "uint32",
            WireType::Uint64 => "uint64",
            WireType::Sint32 => "sint32",
            WireType::Sint64 => "sint64",
            WireType::Fixed32 => "fixed32",
            WireType::Fixed64 => "fixed64",
            WireType::Sfixed32 => "sfixed32",
            WireType::Sfixed64 => "sfixed64",
            WireType::Float => "float",
            WireType::Double => "double",
            WireType::Bytes => "bytes",
            WireType::Message(name) | WireType::Enum(name) => name,
            WireType::Map { .. } => "map",
        }
    }

    /// Whether the type is one of the 64-bit integer families.
    pub fn is_64_bit(&self) -> bool {
        matches!(
            self,
            WireType::Int64
                | WireType::Uint64
                | WireType::Sint64
                | WireType::Fixed64
                | WireType::Sfixed64
        )
    }

    fn from_kind(kind: &Kind) -> Self {
        match kind {
            Kind::Double => WireType::Double,
            Kind::Float => WireType::Float,
            Kind::Int32 => WireType::Int32,
            Kind::Int64 => WireType::Int64,
            Kind::Uint32 => WireType::Uint32,
            Kind::Uint64 => WireType::Uint64,
            Kind::Sint32 => WireType::Sint32,
            Kind::Sint64 => WireType::Sint64,
            Kind::Fixed32 => WireType::Fixed32,
            Kind::Fixed64 => WireType::Fixed64,
            Kind::Sfixed32 => WireType::Sfixed32,
            Kind::Sfixed64 => WireType::Sfixed64,
            Kind::Bool => WireType::Bool,
            Kind::String => WireType::String,
            Kind::Bytes => WireType::Bytes,
            Kind::Message(message) => WireType::Message(message.full_name().to_owned()),
            Kind::Enum(enumeration) => WireType::Enum(enumeration.full_name().to_owned()),
        }
    }
}

impl std::fmt::Display for WireType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireType::Map { key, value } => write!(f, "map<{key}, {value}>"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Field cardinality.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cardinality {
    Optional,
    Required,
    Repeated,
}

impl Cardinality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cardinality::Optional => "optional",
            Cardinality::Required => "required",
            Cardinality::Repeated => "repeated",
        }
    }
}

/// A single field of a message type.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    name: String,
    wire_type: WireType,
    cardinality: Cardinality,
    number: u32,
    declared_default: Option<Value>,
}

impl FieldDescriptor {
    pub(crate) fn from_field(field: &prost_reflect::FieldDescriptor) -> Self {
        let wire_type = match field.kind() {
            Kind::Message(entry) if field.is_map() => WireType::Map {
                key: Box::new(WireType::from_kind(&entry.map_entry_key_field().kind())),
                value: Box::new(WireType::from_kind(&entry.map_entry_value_field().kind())),
            },
            kind => WireType::from_kind(&kind),
        };

        let cardinality = match field.cardinality() {
            prost_reflect::Cardinality::Optional => Cardinality::Optional,
            prost_reflect::Cardinality::Required => Cardinality::Required,
            prost_reflect::Cardinality::Repeated => Cardinality::Repeated,
        };

        let declared_default = field
            .field_descriptor_proto()
            .default_value
            .as_deref()
            .and_then(|raw| parse_declared_default(&wire_type, raw));

        Self {
            name: field.name().to_owned(),
            wire_type,
            cardinality,
            number: field.number(),
            declared_default,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wire_type(&self) -> &WireType {
        &self.wire_type
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Field number, unique within the owning type.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Default declared in the schema, rendered the way decode renders values.
    pub fn declared_default(&self) -> Option<&Value> {
        self.declared_default.as_ref()
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.cardinality == Cardinality::Required
    }
}

/// Proto2 keeps declared defaults as text; bring them into the decode
/// rendering (64-bit as strings, bytes as base64, enums by name).
fn parse_declared_default(wire_type: &WireType, raw: &str) -> Option<Value> {
    match wire_type {
        WireType::String | WireType::Enum(_) => Some(Value::String(raw.to_owned())),
        WireType::Bytes => Some(Value::String(
            base64::engine::general_purpose::STANDARD.encode(unescape_bytes(raw)),
        )),
        WireType::Bool => raw.parse::<bool>().ok().map(Value::Bool),
        WireType::Float | WireType::Double => match raw {
            "inf" => Some(Value::String("Infinity".into())),
            "-inf" => Some(Value::String("-Infinity".into())),
            "nan" => Some(Value::String("NaN".into())),
            _ => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
        },
        ty if ty.is_64_bit() => Some(Value::String(raw.to_owned())),
        WireType::Int32 | WireType::Sint32 | WireType::Sfixed32 => {
            raw.parse::<i32>().ok().map(Value::from)
        }
        WireType::Uint32 | WireType::Fixed32 => raw.parse::<u32>().ok().map(Value::from),
        _ => None,
    }
}

/// Undo the C-style escaping descriptors use for `bytes` defaults.
fn unescape_bytes(raw: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.bytes().peekable();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b't') => out.push(b'\t'),
            Some(d @ b'0'..=b'7') => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match bytes.peek() {
                        Some(&n @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(n - b'0');
                            bytes.next();
                        }
                        _ => break,
                    }
                }
                out.push(value as u8);
            }
            Some(other) => out.push(other),
            None => out.push(b'\\'),
        }
    }
    out
}

/// A named message type, flattened out of a schema document.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    qualified_name: String,
    fields: Vec<FieldDescriptor>,
    document: String,
    native: MessageDescriptor,
}

impl TypeDescriptor {
    /// Describe `message` under `qualified_name`, owned by `document`.
    pub fn new(
        qualified_name: impl Into<String>,
        message: MessageDescriptor,
        document: impl Into<String>,
    ) -> Self {
        let fields = message
            .fields()
            .map(|field| FieldDescriptor::from_field(&field))
            .collect();
        Self {
            qualified_name: qualified_name.into(),
            fields,
            document: document.into(),
            native: message,
        }
    }

    /// Dot-separated namespace path of the type.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Name of the document that contributed this type.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Handle into the compiled schema.
    pub fn native(&self) -> &MessageDescriptor {
        &self.native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_type_display() {
        assert_eq!(WireType::Sfixed64.to_string(), "sfixed64");
        assert_eq!(WireType::Message("pkg.User".into()).to_string(), "pkg.User");
        let map = WireType::Map {
            key: Box::new(WireType::String),
            value: Box::new(WireType::Int64),
        };
        assert_eq!(map.to_string(), "map<string, int64>");
    }

    #[test]
    fn test_wire_type_is_64_bit() {
        assert!(WireType::Int64.is_64_bit());
        assert!(WireType::Fixed64.is_64_bit());
        assert!(!WireType::Int32.is_64_bit());
        assert!(!WireType::Double.is_64_bit());
    }

    #[test]
    fn test_parse_declared_default() {
        assert_eq!(
            parse_declared_default(&WireType::Int32, "-7"),
            Some(Value::from(-7))
        );
        assert_eq!(
            parse_declared_default(&WireType::Int64, "9000000000"),
            Some(Value::String("9000000000".into()))
        );
        assert_eq!(
            parse_declared_default(&WireType::Bool, "true"),
            Some(Value::Bool(true))
        );
        assert_eq!(
            parse_declared_default(&WireType::Double, "inf"),
            Some(Value::String("Infinity".into()))
        );
        assert_eq!(
            parse_declared_default(&WireType::Enum("pkg.Mode".into()), "FAST"),
            Some(Value::String("FAST".into()))
        );
    }

    #[test]
    fn test_unescape_bytes() {
        assert_eq!(unescape_bytes("ab"), b"ab".to_vec());
        assert_eq!(unescape_bytes("\\001\\n"), vec![1, b'\n']);
        assert_eq!(unescape_bytes("\\\\"), vec![b'\\']);
    }
}
