//! Type-directed translation between JSON values and protobuf binary.
//!
//! A [`Codec`] borrows the registry and documents of a
//! [`SchemaSession`](crate::SchemaSession) and resolves every type name the
//! same way: the registry by exact name first, then each document's own
//! descriptor pool in load order. The second step reaches types the registry
//! does not classify as messages, such as types without fields.

mod convert;
mod render;
mod template;

use std::borrow::Cow;
use std::collections::HashSet;

use convert_case::{Case, Casing};
use prost::Message;
use prost_reflect::DynamicMessage;
use serde::Serialize;
use serde_json::Value;

use crate::SchemaError;
use crate::schema::{FieldDescriptor, TypeDescriptor, TypeRegistry, WireType};
use crate::session::SchemaDocument;

/// Outcome of [`Codec::validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid: bool,
    pub error: Option<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// How a field relates to other message types.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo {
    pub field: FieldDescriptor,
    /// The field is typed as a message.
    pub is_message: bool,
    /// The field is `bytes` and may carry an embedded, separately encoded message.
    pub may_embed_message: bool,
    /// Message type of the field, or the inferred type for embedding fields.
    pub resolved_type: Option<String>,
}

/// Encode, decode, validate and template messages by qualified type name.
#[derive(Clone, Copy, Debug)]
pub struct Codec<'a> {
    registry: &'a TypeRegistry,
    documents: &'a [SchemaDocument],
}

impl<'a> Codec<'a> {
    pub fn new(registry: &'a TypeRegistry, documents: &'a [SchemaDocument]) -> Self {
        Self {
            registry,
            documents,
        }
    }

    /// Resolve a qualified type name.
    pub fn resolve(&self, name: &str) -> Result<Cow<'a, TypeDescriptor>, SchemaError> {
        if let Some(descriptor) = self.registry.get(name) {
            return Ok(Cow::Borrowed(descriptor));
        }
        self.documents
            .iter()
            .find_map(|document| {
                let message = document.parsed().lookup_type(name)?;
                // Imported files share the pool; only the defining document counts.
                if message.parent_file().name() != document.name() {
                    return None;
                }
                tracing::debug!(
                    name,
                    document = document.name(),
                    "resolved through document"
                );
                Some(Cow::Owned(TypeDescriptor::new(name, message, document.name())))
            })
            .ok_or_else(|| SchemaError::unknown_type(name))
    }

    /// Encode `value` as a message of type `name`.
    ///
    /// The value is validated first; nothing is encoded if validation fails.
    pub fn encode(&self, name: &str, value: &Value) -> Result<Vec<u8>, SchemaError> {
        let descriptor = self.resolve(name)?;
        let message = convert::to_message(descriptor.native(), value, "")
            .map_err(SchemaError::Validation)?;

        let mut buf = Vec::with_capacity(message.encoded_len());
        message
            .encode(&mut buf)
            .map_err(|err| SchemaError::Encode(err.to_string()))?;
        tracing::debug!(name, len = buf.len(), "message encoded");
        Ok(buf)
    }

    /// Decode binary input as a message of type `name`.
    pub fn decode(&self, name: &str, bytes: impl AsRef<[u8]>) -> Result<Value, SchemaError> {
        let descriptor = self.resolve(name)?;
        let message = DynamicMessage::decode(descriptor.native().clone(), bytes.as_ref())
            .map_err(|err| SchemaError::Decode(err.to_string()))?;
        Ok(render::from_message(&message))
    }

    /// Decode bytes carried in a JSON value: an array of byte values or a
    /// base64 string.
    pub fn decode_value(&self, name: &str, bytes: &Value) -> Result<Value, SchemaError> {
        let bytes = convert::to_bytes(bytes).ok_or_else(|| {
            SchemaError::Decode("expected an array of byte values or a base64 string".into())
        })?;
        self.decode(name, bytes)
    }

    /// Check `value` against the structure of type `name`. Never fails.
    pub fn validate(&self, name: &str, value: &Value) -> Validation {
        let descriptor = match self.resolve(name) {
            Ok(descriptor) => descriptor,
            Err(err) => return Validation::failed(err.to_string()),
        };
        match convert::to_message(descriptor.native(), value, "") {
            Ok(_) => Validation::ok(),
            Err(error) => Validation::failed(error),
        }
    }

    /// Synthesize an example value for type `name`.
    ///
    /// Every field is present. Declared defaults are used where the schema has
    /// them, otherwise the zero value of the field's type; message fields are
    /// expanded recursively and self-references render as `null`.
    pub fn generate_template(&self, name: &str) -> Result<Value, SchemaError> {
        let descriptor = self.resolve(name)?;
        Ok(template::for_message(descriptor.native(), &mut HashSet::new()))
    }

    /// Guess the message type a field carries from the field's name.
    ///
    /// Returns the first registry entry whose lower-cased name contains the
    /// field name without underscores, or whose name ends with the field name
    /// in PascalCase.
    pub fn infer_linked_type(&self, field_name: &str) -> Option<String> {
        let needle = field_name.replace('_', "").to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let pascal = field_name.to_case(Case::Pascal);

        self.registry
            .names()
            .find(|name| name.to_lowercase().contains(&needle) || name.ends_with(&pascal))
            .map(str::to_owned)
    }

    /// Describe how each field of `name` relates to other message types.
    pub fn field_info(&self, name: &str) -> Result<Vec<FieldInfo>, SchemaError> {
        let descriptor = self.resolve(name)?;
        Ok(descriptor
            .fields()
            .iter()
            .map(|field| {
                let (is_message, may_embed_message, resolved_type) = match field.wire_type() {
                    WireType::Message(target) => (true, false, Some(target.clone())),
                    WireType::Bytes => (false, true, self.infer_linked_type(field.name())),
                    _ => (false, false, None),
                };
                FieldInfo {
                    field: field.clone(),
                    is_message,
                    may_embed_message,
                    resolved_type,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SchemaSession;
    use serde_json::json;

    const CHAT_PROTO: &str = r#"
        syntax = "proto3";
        package chat.v1;

        enum Status {
            STATUS_UNKNOWN = 0;
            STATUS_ONLINE = 1;
            STATUS_AWAY = 2;
        }

        message UserProfile {
            string name = 1;
            Status status = 2;
        }

        message ChatMessage {
            uint64 id = 1;
            string text = 2;
            int32 priority = 3;
            bool pinned = 4;
            double score = 5;
            bytes user_profile = 6;
            UserProfile author = 7;
            repeated string tags = 8;
            map<string, int64> counters = 9;
            Status status = 10;
            sint64 delta = 11;
            float ratio = 12;
        }

        message Node {
            string label = 1;
            Node parent = 2;
            repeated Node children = 3;
        }

        message Heartbeat {}
    "#;

    const LEGACY_PROTO: &str = r#"
        syntax = "proto2";
        package legacy;

        message Login {
            required string user = 1;
            optional int32 retries = 2 [default = 3];
            optional string locale = 3 [default = "en"];
        }
    "#;

    fn session() -> SchemaSession {
        let mut session = SchemaSession::new();
        session.load("chat.proto", CHAT_PROTO).unwrap();
        session.load("legacy.proto", LEGACY_PROTO).unwrap();
        session
    }

    #[test]
    fn test_encode_decode_renders_every_field() {
        let session = session();
        let codec = session.codec();

        let bytes = codec
            .encode("chat.v1.ChatMessage", &json!({ "id": 42, "text": "hi" }))
            .unwrap();
        let value = codec.decode("chat.v1.ChatMessage", &bytes).unwrap();

        assert_eq!(
            value,
            json!({
                "id": "42",
                "text": "hi",
                "priority": 0,
                "pinned": false,
                "score": 0.0,
                "user_profile": "",
                "author": null,
                "tags": [],
                "counters": {},
                "status": "STATUS_UNKNOWN",
                "delta": "0",
                "ratio": 0.0,
            })
        );
    }

    #[test]
    fn test_round_trip() {
        let session = session();
        let codec = session.codec();

        let value = json!({
            "id": "18446744073709551615",
            "text": "hello",
            "priority": -5,
            "pinned": true,
            "score": 1.5,
            "user_profile": "AAEC",
            "author": { "name": "ada", "status": "STATUS_AWAY" },
            "tags": ["a", "b"],
            "counters": { "sent": "9007199254740993" },
            "status": "STATUS_ONLINE",
            "delta": "-3",
            "ratio": 0.25,
        });

        let bytes = codec.encode("chat.v1.ChatMessage", &value).unwrap();
        assert_eq!(codec.decode("chat.v1.ChatMessage", &bytes).unwrap(), value);
    }

    #[test]
    fn test_decode_accepts_byte_containers() {
        let session = session();
        let codec = session.codec();
        let bytes = codec
            .encode("chat.v1.UserProfile", &json!({ "name": "ada" }))
            .unwrap();

        let expected = json!({ "name": "ada", "status": "STATUS_UNKNOWN" });
        assert_eq!(
            codec
                .decode("chat.v1.UserProfile", bytes.as_slice())
                .unwrap(),
            expected
        );
        assert_eq!(
            codec
                .decode(
                    "chat.v1.UserProfile",
                    prost::bytes::Bytes::from(bytes.clone()),
                )
                .unwrap(),
            expected
        );
        assert_eq!(
            codec
                .decode_value("chat.v1.UserProfile", &json!(bytes))
                .unwrap(),
            expected
        );
    }

    #[test]
    fn test_decode_value_rejects_non_bytes() {
        let session = session();
        let err = session
            .codec()
            .decode_value("chat.v1.UserProfile", &json!([1, 300]))
            .unwrap_err();
        assert!(matches!(err, SchemaError::Decode(_)));
    }

    #[test]
    fn test_decode_truncated_input() {
        let session = session();
        // Field 2 (text), length-delimited, claims 10 bytes but carries 2.
        let err = session
            .codec()
            .decode("chat.v1.ChatMessage", b"\x12\x0ahi")
            .unwrap_err();
        assert!(matches!(err, SchemaError::Decode(_)));
    }

    #[test]
    fn test_unknown_enum_number_stays_numeric() {
        let session = session();
        // Field 2 (status), varint 7.
        let value = session
            .codec()
            .decode("chat.v1.UserProfile", b"\x10\x07")
            .unwrap();
        assert_eq!(value["status"], json!(7));
    }

    #[test]
    fn test_encode_rejects_invalid_value() {
        let session = session();
        let codec = session.codec();

        let err = codec
            .encode("chat.v1.ChatMessage", &json!({ "priority": "high" }))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::Validation("priority: integer expected".into())
        );

        let err = codec
            .encode(
                "chat.v1.ChatMessage",
                &json!({ "author": { "status": "BUSY" } }),
            )
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::Validation("author.status: enum value expected".into())
        );
    }

    #[test]
    fn test_unknown_type() {
        let session = session();
        let codec = session.codec();

        assert_eq!(
            codec.encode("chat.v1.Missing", &json!({})).unwrap_err(),
            SchemaError::UnknownType("chat.v1.Missing".into())
        );
        assert!(matches!(
            codec.decode("chat.v1.Missing", b""),
            Err(SchemaError::UnknownType(_))
        ));
        assert!(matches!(
            codec.generate_template("chat.v1.Missing"),
            Err(SchemaError::UnknownType(_))
        ));
        let validation = codec.validate("chat.v1.Missing", &json!({}));
        assert!(!validation.valid);
    }

    #[test]
    fn test_validate() {
        let session = session();
        let codec = session.codec();

        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!({ "text": "x", "unknown": 1 })),
            Validation::ok()
        );
        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!({ "priority": 4294967296u64 })),
            Validation::failed("priority: integer expected")
        );
        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!({ "priority": 3.0 })),
            Validation::ok()
        );
        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!({ "id": 7.0 })),
            Validation::ok()
        );
        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!({ "priority": 3.5 })),
            Validation::failed("priority: integer expected")
        );
        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!({ "tags": "a" })),
            Validation::failed("tags: array expected")
        );
        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!({ "tags": ["a", 1] })),
            Validation::failed("tags[1]: string expected")
        );
        assert_eq!(
            codec.validate(
                "chat.v1.ChatMessage",
                &json!({ "score": "NaN", "ratio": "-Infinity" }),
            ),
            Validation::ok()
        );
        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!({ "id": "12x" })),
            Validation::failed("id: integer|Long expected")
        );
        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!({ "user_profile": [0, 255] })),
            Validation::ok()
        );
        assert_eq!(
            codec.validate("chat.v1.ChatMessage", &json!([])),
            Validation::failed("object expected")
        );
    }

    #[test]
    fn test_validate_required_fields() {
        let session = session();
        let codec = session.codec();

        assert_eq!(
            codec.validate("legacy.Login", &json!({ "retries": 1 })),
            Validation::failed("user: missing required field")
        );
        let validation = codec.validate("legacy.Login", &json!({ "user": "ada" }));
        assert!(validation.valid);
    }

    #[test]
    fn test_declared_defaults() {
        let session = session();
        let codec = session.codec();

        let bytes = codec
            .encode("legacy.Login", &json!({ "user": "ada" }))
            .unwrap();
        assert_eq!(
            codec.decode("legacy.Login", &bytes).unwrap(),
            json!({ "user": "ada", "retries": 3, "locale": "en" })
        );
        assert_eq!(
            codec.generate_template("legacy.Login").unwrap(),
            json!({ "user": "", "retries": 3, "locale": "en" })
        );
    }

    #[test]
    fn test_generate_template() {
        let session = session();
        let template = session
            .codec()
            .generate_template("chat.v1.ChatMessage")
            .unwrap();

        assert_eq!(
            template,
            json!({
                "id": 0,
                "text": "",
                "priority": 0,
                "pinned": false,
                "score": 0.0,
                "user_profile": [],
                "author": { "name": "", "status": "STATUS_UNKNOWN" },
                "tags": [],
                "counters": {},
                "status": "STATUS_UNKNOWN",
                "delta": 0,
                "ratio": 0.0,
            })
        );
    }

    #[test]
    fn test_template_law() {
        let session = session();
        let codec = session.codec();

        for name in session.registry().names() {
            let template = codec.generate_template(name).unwrap();
            assert_eq!(codec.validate(name, &template), Validation::ok(), "{name}");
            let bytes = codec.encode(name, &template).unwrap();
            codec.decode(name, &bytes).unwrap();
        }
    }

    #[test]
    fn test_template_self_reference() {
        let session = session();
        let template = session.codec().generate_template("chat.v1.Node").unwrap();
        assert_eq!(
            template,
            json!({ "label": "", "parent": null, "children": [] })
        );
    }

    #[test]
    fn test_resolve_falls_back_to_documents() {
        let session = session();
        let codec = session.codec();

        // No fields, so the registry skips it; the document still resolves it.
        assert!(!session.registry().contains("chat.v1.Heartbeat"));
        let descriptor = codec.resolve("chat.v1.Heartbeat").unwrap();
        assert_eq!(descriptor.document(), "chat.proto");
        assert_eq!(
            codec.encode("chat.v1.Heartbeat", &json!({})).unwrap(),
            Vec::<u8>::new()
        );
        assert_eq!(codec.decode("chat.v1.Heartbeat", b"").unwrap(), json!({}));
    }

    #[test]
    fn test_infer_linked_type() {
        let session = session();
        let codec = session.codec();

        assert_eq!(
            codec.infer_linked_type("user_profile").as_deref(),
            Some("chat.v1.UserProfile")
        );
        assert_eq!(
            codec.infer_linked_type("login").as_deref(),
            Some("legacy.Login")
        );
        assert_eq!(codec.infer_linked_type("weather"), None);
        assert_eq!(codec.infer_linked_type("_"), None);
    }

    #[test]
    fn test_field_info() {
        let session = session();
        let info = session.codec().field_info("chat.v1.ChatMessage").unwrap();

        let author = info.iter().find(|i| i.field.name() == "author").unwrap();
        assert!(author.is_message);
        assert_eq!(author.resolved_type.as_deref(), Some("chat.v1.UserProfile"));

        let embedded = info.iter().find(|i| i.field.name() == "user_profile");
        let embedded = embedded.unwrap();
        assert!(embedded.may_embed_message);
        assert_eq!(
            embedded.resolved_type.as_deref(),
            Some("chat.v1.UserProfile")
        );

        let text = info.iter().find(|i| i.field.name() == "text").unwrap();
        assert!(!text.is_message && !text.may_embed_message);
        assert_eq!(text.resolved_type, None);
    }
}
