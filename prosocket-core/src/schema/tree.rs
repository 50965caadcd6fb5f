//! Schema tree adapters.
//!
//! Schema compilers expose their parsed trees in one of two shapes: a keyed
//! mapping from child name to child node, or an ordered list of children
//! that each carry their own name. [`SchemaTree`] is the capability both
//! shapes share, and the registry walks trees only through it:
//!
//! - [`KeyedNode`]: children addressed by key
//! - [`ListNode`]: self-named children in declaration order
//!
//! Shapes may be mixed freely at any depth.

use std::collections::BTreeMap;
use std::fmt;

use prost_reflect::MessageDescriptor;

/// A node of a parsed schema tree.
pub trait SchemaTree: fmt::Debug + Send + Sync {
    /// The node's own name, for nodes that describe themselves.
    fn name(&self) -> Option<&str> {
        None
    }

    /// Type handle, when the node is a message type.
    fn message(&self) -> Option<&MessageDescriptor>;

    /// Child nodes paired with their local names.
    fn children(&self) -> Vec<(&str, &dyn SchemaTree)>;

    /// Whether the node exposes a non-empty field collection.
    fn is_message_type(&self) -> bool {
        self.message().is_some_and(|m| m.fields().len() > 0)
    }
}

/// A node whose children are addressed through a keyed mapping.
#[derive(Debug, Default)]
pub struct KeyedNode {
    message: Option<MessageDescriptor>,
    nested: BTreeMap<String, Box<dyn SchemaTree>>,
}

impl KeyedNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node carrying a type handle.
    pub fn for_message(message: MessageDescriptor) -> Self {
        Self {
            message: Some(message),
            nested: BTreeMap::new(),
        }
    }

    /// Insert a child under `key`, replacing any previous child.
    pub fn insert(&mut self, key: impl Into<String>, child: impl SchemaTree + 'static) {
        self.nested.insert(key.into(), Box::new(child));
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, child: impl SchemaTree + 'static) -> Self {
        self.insert(key, child);
        self
    }
}

impl SchemaTree for KeyedNode {
    fn message(&self) -> Option<&MessageDescriptor> {
        self.message.as_ref()
    }

    fn children(&self) -> Vec<(&str, &dyn SchemaTree)> {
        self.nested
            .iter()
            .map(|(key, child)| (key.as_str(), child.as_ref()))
            .collect()
    }
}

/// A self-named node whose children form an ordered list.
#[derive(Debug)]
pub struct ListNode {
    name: String,
    message: Option<MessageDescriptor>,
    nested: Vec<Box<dyn SchemaTree>>,
}

impl ListNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: None,
            nested: Vec::new(),
        }
    }

    /// Create a node carrying a type handle, named after the message.
    pub fn for_message(message: MessageDescriptor) -> Self {
        Self {
            name: message.name().to_owned(),
            message: Some(message),
            nested: Vec::new(),
        }
    }

    pub fn push(&mut self, child: impl SchemaTree + 'static) {
        self.nested.push(Box::new(child));
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, child: impl SchemaTree + 'static) -> Self {
        self.push(child);
        self
    }
}

impl SchemaTree for ListNode {
    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn message(&self) -> Option<&MessageDescriptor> {
        self.message.as_ref()
    }

    // Children that do not name themselves cannot be qualified and are skipped.
    fn children(&self) -> Vec<(&str, &dyn SchemaTree)> {
        self.nested
            .iter()
            .filter_map(|child| child.name().map(|name| (name, child.as_ref())))
            .collect()
    }
}

/// Join a parent qualified name and a local name.
pub fn qualify(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_owned()
    } else {
        format!("{prefix}.{name}")
    }
}
