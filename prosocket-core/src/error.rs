//! Schema and codec error types.
//!
//! This module provides [`SchemaError`], the error type shared by the
//! type registry, the codec and the schema session.

/// Errors raised while loading schemas or translating messages.
///
/// Every variant is local to the operation that produced it: a failed load
/// leaves the session untouched, and a failed encode or decode leaves the
/// registry untouched.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The schema compiler rejected a document.
    #[error("failed to load schema document {document}: {message}")]
    Parse { document: String, message: String },

    /// No loaded document defines the requested message type.
    #[error("message type {0} not found")]
    UnknownType(String),

    /// A value does not satisfy the structure of its message type.
    #[error("validation error: {0}")]
    Validation(String),

    /// Malformed or truncated binary input.
    #[error("decode error: {0}")]
    Decode(String),

    /// A validated value could not be serialized.
    #[error("encode error: {0}")]
    Encode(String),
}

impl SchemaError {
    /// Create a parse error for a document.
    pub fn parse<D: Into<String>, M: Into<String>>(document: D, message: M) -> Self {
        SchemaError::Parse {
            document: document.into(),
            message: message.into(),
        }
    }

    /// Create an unknown type error.
    pub fn unknown_type<S: Into<String>>(name: S) -> Self {
        SchemaError::UnknownType(name.into())
    }

    /// Get the error message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            SchemaError::Parse { message, .. } => message,
            SchemaError::UnknownType(name) => name,
            SchemaError::Validation(msg) | SchemaError::Decode(msg) | SchemaError::Encode(msg) => {
                msg
            }
        }
    }
}
