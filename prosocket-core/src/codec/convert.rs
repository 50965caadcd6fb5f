//! JSON value → dynamic message conversion.
//!
//! Conversion doubles as structural validation: the first mismatch between
//! a value and its message type aborts with a message of the form
//! `path: <what> expected`, and nothing is encoded.

use std::collections::HashMap;

use base64::Engine;
use prost::bytes::Bytes;
use prost_reflect::{
    Cardinality, DynamicMessage, EnumDescriptor, FieldDescriptor, Kind, MapKey, MessageDescriptor,
    Value as ReflectValue,
};
use serde_json::Value;

use crate::schema::tree::qualify;

/// Convert `value` into a message of type `descriptor`.
///
/// Keys may use either the declared field name or its JSON name. Unknown keys
/// are ignored and `null` means "not set".
pub(crate) fn to_message(
    descriptor: &MessageDescriptor,
    value: &Value,
    path: &str,
) -> Result<DynamicMessage, String> {
    let object = value.as_object().ok_or_else(|| expected(path, "object"))?;
    let mut message = DynamicMessage::new(descriptor.clone());

    for field in descriptor.fields() {
        let field_path = qualify(path, field.name());
        let raw = object
            .get(field.name())
            .or_else(|| object.get(field.json_name()));

        let raw = match raw {
            None | Some(Value::Null) => {
                if field.cardinality() == Cardinality::Required {
                    return Err(format!("{field_path}: missing required field"));
                }
                continue;
            }
            Some(raw) => raw,
        };

        let converted = if field.is_map() {
            to_map(&field, raw, &field_path)?
        } else if field.is_list() {
            let items = raw.as_array().ok_or_else(|| expected(&field_path, "array"))?;
            let kind = field.kind();
            let list = items
                .iter()
                .enumerate()
                .map(|(i, item)| to_value(&kind, item, &format!("{field_path}[{i}]")))
                .collect::<Result<Vec<_>, _>>()?;
            ReflectValue::List(list)
        } else {
            to_value(&field.kind(), raw, &field_path)?
        };

        message
            .try_set_field(&field, converted)
            .map_err(|err| format!("{field_path}: {err}"))?;
    }

    Ok(message)
}

fn to_map(field: &FieldDescriptor, raw: &Value, path: &str) -> Result<ReflectValue, String> {
    let Kind::Message(entry) = field.kind() else {
        return Err(expected(path, "map"));
    };
    let object = raw.as_object().ok_or_else(|| expected(path, "object"))?;
    let key_kind = entry.map_entry_key_field().kind();
    let value_kind = entry.map_entry_value_field().kind();

    let mut map = HashMap::with_capacity(object.len());
    for (key, item) in object {
        let item_path = format!("{path}[{key:?}]");
        let map_key = to_map_key(&key_kind, key)
            .ok_or_else(|| format!("{item_path}: {} key expected", kind_name(&key_kind)))?;
        map.insert(map_key, to_value(&value_kind, item, &item_path)?);
    }
    Ok(ReflectValue::Map(map))
}

fn to_map_key(kind: &Kind, key: &str) -> Option<MapKey> {
    match kind {
        Kind::String => Some(MapKey::String(key.to_owned())),
        Kind::Bool => key.parse().ok().map(MapKey::Bool),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => key.parse().ok().map(MapKey::I32),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => key.parse().ok().map(MapKey::I64),
        Kind::Uint32 | Kind::Fixed32 => key.parse().ok().map(MapKey::U32),
        Kind::Uint64 | Kind::Fixed64 => key.parse().ok().map(MapKey::U64),
        _ => None,
    }
}

/// Convert one singular value of `kind`.
fn to_value(kind: &Kind, raw: &Value, path: &str) -> Result<ReflectValue, String> {
    match kind {
        Kind::Double => to_float(raw)
            .map(ReflectValue::F64)
            .ok_or_else(|| expected(path, "number")),
        Kind::Float => to_float(raw)
            .map(|f| ReflectValue::F32(f as f32))
            .ok_or_else(|| expected(path, "number")),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => as_signed(raw)
            .and_then(|n| i32::try_from(n).ok())
            .map(ReflectValue::I32)
            .ok_or_else(|| expected(path, "integer")),
        Kind::Uint32 | Kind::Fixed32 => as_unsigned(raw)
            .and_then(|n| u32::try_from(n).ok())
            .map(ReflectValue::U32)
            .ok_or_else(|| expected(path, "integer")),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => match raw {
            Value::String(s) => s.parse().ok(),
            other => as_signed(other),
        }
        .map(ReflectValue::I64)
        .ok_or_else(|| expected(path, "integer|Long")),
        Kind::Uint64 | Kind::Fixed64 => match raw {
            Value::String(s) => s.parse().ok(),
            other => as_unsigned(other),
        }
        .map(ReflectValue::U64)
        .ok_or_else(|| expected(path, "integer|Long")),
        Kind::Bool => raw
            .as_bool()
            .map(ReflectValue::Bool)
            .ok_or_else(|| expected(path, "boolean")),
        Kind::String => raw
            .as_str()
            .map(|s| ReflectValue::String(s.to_owned()))
            .ok_or_else(|| expected(path, "string")),
        Kind::Bytes => to_bytes(raw)
            .map(|b| ReflectValue::Bytes(Bytes::from(b)))
            .ok_or_else(|| expected(path, "buffer")),
        Kind::Enum(enumeration) => to_enum(enumeration, raw)
            .map(ReflectValue::EnumNumber)
            .ok_or_else(|| expected(path, "enum value")),
        Kind::Message(message) => to_message(message, raw, path).map(ReflectValue::Message),
    }
}

/// Integral JSON number, accepting floats with no fractional part.
fn as_signed(raw: &Value) -> Option<i64> {
    raw.as_i64().or_else(|| {
        raw.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
            .map(|f| f as i64)
    })
}

fn as_unsigned(raw: &Value) -> Option<u64> {
    raw.as_u64().or_else(|| {
        raw.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
            .map(|f| f as u64)
    })
}

fn to_float(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

/// Bytes arrive either base64 encoded or as an array of byte values.
pub(crate) fn to_bytes(raw: &Value) -> Option<Vec<u8>> {
    match raw {
        Value::String(s) => base64::engine::general_purpose::STANDARD
            .decode(s)
            .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(s))
            .ok(),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect(),
        _ => None,
    }
}

fn to_enum(enumeration: &EnumDescriptor, raw: &Value) -> Option<i32> {
    match raw {
        Value::String(name) => enumeration.get_value_by_name(name).map(|v| v.number()),
        other => other
            .as_i64()
            .and_then(|n| i32::try_from(n).ok())
            .filter(|&n| enumeration.get_value(n).is_some()),
    }
}

fn expected(path: &str, what: &str) -> String {
    if path.is_empty() {
        format!("{what} expected")
    } else {
        format!("{path}: {what} expected")
    }
}

fn kind_name(kind: &Kind) -> &'static str {
    match kind {
        Kind::Bool => "boolean",
        Kind::String => "string",
        _ => "integer",
    }
}
