//! Example payload synthesis.

use std::collections::HashSet;

use prost_reflect::{Kind, MessageDescriptor};
use serde_json::{Map, Value, json};

use crate::schema::FieldDescriptor;

/// Build an example value for `message` with deterministic defaults.
///
/// `visiting` holds the message types on the current recursion path; a field
/// whose type is already on the path renders as `null`.
pub(crate) fn for_message(message: &MessageDescriptor, visiting: &mut HashSet<String>) -> Value {
    if !visiting.insert(message.full_name().to_owned()) {
        return Value::Null;
    }

    let mut object = Map::new();
    for field in message.fields() {
        let value = if field.is_map() {
            json!({})
        } else if field.is_list() {
            json!([])
        } else if let Some(declared) = FieldDescriptor::from_field(&field).declared_default() {
            declared.clone()
        } else {
            zero(&field.kind(), visiting)
        };
        object.insert(field.name().to_owned(), value);
    }

    visiting.remove(message.full_name());
    Value::Object(object)
}

fn zero(kind: &Kind, visiting: &mut HashSet<String>) -> Value {
    match kind {
        Kind::String => json!(""),
        Kind::Bool => json!(false),
        Kind::Float | Kind::Double => json!(0.0),
        Kind::Bytes => json!([]),
        Kind::Enum(enumeration) => enumeration
            .values()
            .next()
            .map_or(json!(0), |value| json!(value.name())),
        Kind::Message(message) => for_message(message, visiting),
        Kind::Int32
        | Kind::Int64
        | Kind::Uint32
        | Kind::Uint64
        | Kind::Sint32
        | Kind::Sint64
        | Kind::Fixed32
        | Kind::Fixed64
        | Kind::Sfixed32
        | Kind::Sfixed64 => json!(0),
    }
}
