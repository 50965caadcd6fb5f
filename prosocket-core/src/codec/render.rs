//! Dynamic message → JSON value rendering.
//!
//! The output policy is fixed:
//! - 64-bit integers render as decimal strings
//! - enums render by symbolic name (numbers without a name stay numeric)
//! - bytes render as standard base64
//! - every field is present; absent fields carry their default, unset
//!   singular message fields render as `null`

use base64::Engine;
use prost_reflect::{DynamicMessage, Kind, MapKey, ReflectMessage, Value as ReflectValue};
use serde_json::{Map, Number, Value};

pub(crate) fn from_message(message: &DynamicMessage) -> Value {
    let mut object = Map::new();
    for field in message.descriptor().fields() {
        let kind = field.kind();
        let singular_message =
            matches!(kind, Kind::Message(_)) && !field.is_list() && !field.is_map();
        let value = if singular_message && !message.has_field(&field) {
            Value::Null
        } else {
            from_value(&message.get_field(&field), &kind)
        };
        object.insert(field.name().to_owned(), value);
    }
    Value::Object(object)
}

fn from_value(value: &ReflectValue, kind: &Kind) -> Value {
    match value {
        ReflectValue::Bool(b) => Value::Bool(*b),
        ReflectValue::I32(n) => Value::from(*n),
        ReflectValue::U32(n) => Value::from(*n),
        ReflectValue::I64(n) => Value::String(n.to_string()),
        ReflectValue::U64(n) => Value::String(n.to_string()),
        ReflectValue::F32(f) => from_float(f64::from(*f)),
        ReflectValue::F64(f) => from_float(*f),
        ReflectValue::String(s) => Value::String(s.clone()),
        ReflectValue::Bytes(b) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(b))
        }
        ReflectValue::EnumNumber(n) => match kind {
            Kind::Enum(enumeration) => enumeration
                .get_value(*n)
                .map_or_else(|| Value::from(*n), |v| Value::String(v.name().to_owned())),
            _ => Value::from(*n),
        },
        ReflectValue::Message(message) => from_message(message),
        ReflectValue::List(items) => {
            Value::Array(items.iter().map(|item| from_value(item, kind)).collect())
        }
        ReflectValue::Map(entries) => {
            let value_kind = match kind {
                Kind::Message(entry) => entry.map_entry_value_field().kind(),
                other => other.clone(),
            };
            let object = entries
                .iter()
                .map(|(key, item)| (map_key(key), from_value(item, &value_kind)))
                .collect();
            Value::Object(object)
        }
    }
}

fn from_float(f: f64) -> Value {
    if f.is_nan() {
        Value::String("NaN".into())
    } else if f.is_infinite() {
        Value::String(if f > 0.0 { "Infinity" } else { "-Infinity" }.into())
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

fn map_key(key: &MapKey) -> String {
    match key {
        MapKey::Bool(b) => b.to_string(),
        MapKey::I32(n) => n.to_string(),
        MapKey::I64(n) => n.to_string(),
        MapKey::U32(n) => n.to_string(),
        MapKey::U64(n) => n.to_string(),
        MapKey::String(s) => s.clone(),
    }
}
