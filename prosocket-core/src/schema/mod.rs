//! Schema compilation, tree adapters and the flattened type registry.
//!
//! - [`compiler`]: the [`SchemaCompiler`] contract and [`ProtoxCompiler`]
//! - [`tree`]: the [`SchemaTree`] capability with keyed and list adapters
//! - [`descriptor`]: [`TypeDescriptor`] and [`FieldDescriptor`]
//! - [`registry`]: the [`TypeRegistry`]

pub mod compiler;
pub mod descriptor;
pub mod registry;
pub mod tree;

pub use compiler::{ParsedSchema, ProtoxCompiler, SchemaCompiler, Sources};
pub use descriptor::{Cardinality, FieldDescriptor, TypeDescriptor, WireType};
pub use registry::TypeRegistry;
pub use tree::{KeyedNode, ListNode, SchemaTree};
