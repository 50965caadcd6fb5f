//! Schema registry and dynamic protobuf codec.
//!
//! This crate turns `.proto` schema text into a flat, queryable set of message
//! types and translates between JSON values and protobuf binary by type name.
//! It is used by the `prosocket-client` crate's consumers through the
//! `prosocket` facade.
//!
//! ## Modules
//!
//! - [`schema`]: Schema compilation, tree adapters and the [`TypeRegistry`]
//! - [`codec`]: Encode, decode, validate and template generation
//! - [`session`]: The [`SchemaSession`] that owns loaded documents

pub mod codec;
mod error;
pub mod schema;
pub mod session;

pub use codec::{Codec, FieldInfo, Validation};
pub use error::*;
pub use schema::{
    Cardinality, FieldDescriptor, KeyedNode, ListNode, ParsedSchema, ProtoxCompiler,
    SchemaCompiler, SchemaTree, Sources, TypeDescriptor, TypeRegistry, WireType,
};
pub use session::{LoadReport, SchemaDocument, SchemaSession};

pub use prost_reflect;
