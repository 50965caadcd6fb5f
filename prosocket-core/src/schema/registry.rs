//! Flattened name → type mapping.
//!
//! The registry is derived state. It is never patched in place: every change
//! to the document set rebuilds it from scratch with [`TypeRegistry::flatten_all`],
//! which fills a fresh registry and swaps it in whole.

use std::collections::HashMap;

use super::compiler::ParsedSchema;
use super::descriptor::TypeDescriptor;
use super::tree::{SchemaTree, qualify};
use crate::SchemaError;
use crate::session::SchemaDocument;

/// Insertion-ordered mapping from qualified name to [`TypeDescriptor`].
///
/// When two documents define the same qualified name, the one ingested last
/// wins and the entry keeps the position of the first definition.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: Vec<TypeDescriptor>,
    index: HashMap<String, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten one document into the registry.
    ///
    /// Returns how many qualified names were not present before.
    pub fn ingest(&mut self, document: &SchemaDocument) -> usize {
        let before = self.types.len();
        let mut found = 0;
        let parsed = document.parsed();

        walk(parsed.root(), "", &mut |name, node| {
            if let Some(message) = node.message().filter(|_| node.is_message_type()) {
                self.insert(TypeDescriptor::new(name, message.clone(), document.name()));
                found += 1;
            }
        });

        if found == 0 && !parsed.root().children().is_empty() {
            tracing::debug!(
                document = document.name(),
                "tree walk found no message types, falling back to name lookup"
            );
            found = self.ingest_by_lookup(parsed, parsed.root(), "", document.name());
        }

        if found == 0 {
            tracing::warn!(document = document.name(), "no message types found");
        }

        self.types.len() - before
    }

    /// Resolve top-level names through the compiler's own lookup; names that
    /// fail to resolve are treated as namespaces and descended into.
    fn ingest_by_lookup(
        &mut self,
        parsed: &ParsedSchema,
        node: &dyn SchemaTree,
        prefix: &str,
        document: &str,
    ) -> usize {
        let mut found = 0;
        for (name, child) in node.children() {
            let qualified = qualify(prefix, name);
            match parsed.lookup_type(&qualified) {
                Some(message) => {
                    self.insert(TypeDescriptor::new(qualified, message, document));
                    found += 1;
                }
                None => found += self.ingest_by_lookup(parsed, child, &qualified, document),
            }
        }
        found
    }

    /// Rebuild from `documents` in load order and swap the result in.
    pub fn flatten_all<'a, I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = &'a SchemaDocument>,
    {
        let mut fresh = TypeRegistry::new();
        for document in documents {
            fresh.ingest(document);
        }
        tracing::debug!(types = fresh.len(), "type registry rebuilt");
        *self = fresh;
    }

    fn insert(&mut self, descriptor: TypeDescriptor) {
        match self.index.get(descriptor.qualified_name()) {
            Some(&slot) => {
                tracing::debug!(
                    name = descriptor.qualified_name(),
                    shadowed = self.types[slot].document(),
                    by = descriptor.document(),
                    "qualified name shadowed"
                );
                self.types[slot] = descriptor;
            }
            None => {
                self.index
                    .insert(descriptor.qualified_name().to_owned(), self.types.len());
                self.types.push(descriptor);
            }
        }
    }

    /// Look up a type by exact qualified name.
    pub fn lookup(&self, name: &str) -> Result<&TypeDescriptor, SchemaError> {
        self.get(name)
            .ok_or_else(|| SchemaError::unknown_type(name))
    }

    pub fn get(&self, name: &str) -> Option<&TypeDescriptor> {
        self.index.get(name).map(|&slot| &self.types[slot])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Types in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }

    /// Qualified names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(TypeDescriptor::qualified_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Depth-first walk visiting every node below `node` with its qualified name.
fn walk(node: &dyn SchemaTree, prefix: &str, visit: &mut dyn FnMut(&str, &dyn SchemaTree)) {
    for (name, child) in node.children() {
        let qualified = qualify(prefix, name);
        visit(&qualified, child);
        walk(child, &qualified, visit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::compiler::{ProtoxCompiler, SchemaCompiler, Sources};
    use crate::schema::tree::{KeyedNode, ListNode};
    use prost_reflect::DescriptorPool;

    const SHOP_PROTO: &str = r#"
        syntax = "proto3";
        package shop.v1;

        message Order {
            string id = 1;
            Item item = 2;

            message Item {
                string sku = 1;
            }
        }

        message Empty {}
    "#;

    fn pool() -> DescriptorPool {
        let sources: Sources = [("shop.proto".to_string(), SHOP_PROTO.to_string())].into();
        ProtoxCompiler
            .compile("shop.proto", &sources)
            .unwrap()
            .pool()
            .clone()
    }

    fn message(pool: &DescriptorPool, name: &str) -> prost_reflect::MessageDescriptor {
        pool.get_message_by_name(name).unwrap()
    }

    fn document(name: &str, parsed: ParsedSchema) -> SchemaDocument {
        SchemaDocument::new(name, "", parsed)
    }

    const ORDER_TYPES: [&str; 2] = ["shop.v1.Order", "shop.v1.Order.Item"];

    fn names(registry: &TypeRegistry) -> Vec<&str> {
        registry.names().collect()
    }

    fn owner<'a>(registry: &'a TypeRegistry, name: &str) -> &'a str {
        registry.lookup(name).unwrap().document()
    }

    #[test]
    fn test_ingest_keyed_tree() {
        let pool = pool();
        let root = KeyedNode::new().with(
            "shop",
            KeyedNode::new().with(
                "v1",
                KeyedNode::new().with(
                    "Order",
                    KeyedNode::for_message(message(&pool, "shop.v1.Order")).with(
                        "Item",
                        KeyedNode::for_message(message(&pool, "shop.v1.Order.Item")),
                    ),
                ),
            ),
        );

        let mut registry = TypeRegistry::new();
        let found = registry.ingest(&document("keyed", ParsedSchema::new(root, pool)));

        assert_eq!(found, 2);
        assert_eq!(names(&registry), ORDER_TYPES);
        assert_eq!(owner(&registry, "shop.v1.Order"), "keyed");
    }

    #[test]
    fn test_ingest_list_tree() {
        let pool = pool();
        let root = ListNode::new("").with(
            ListNode::new("shop").with(
                ListNode::new("v1").with(
                    ListNode::for_message(message(&pool, "shop.v1.Order"))
                        .with(ListNode::for_message(message(&pool, "shop.v1.Order.Item"))),
                ),
            ),
        );

        let mut registry = TypeRegistry::new();
        registry.ingest(&document("list", ParsedSchema::new(root, pool)));

        assert_eq!(names(&registry), ORDER_TYPES);
    }

    #[test]
    fn test_ingest_mixed_tree() {
        let sources: Sources = [("shop.proto".to_string(), SHOP_PROTO.to_string())].into();
        let parsed = ProtoxCompiler.compile("shop.proto", &sources).unwrap();

        let mut registry = TypeRegistry::new();
        registry.ingest(&document("shop.proto", parsed));

        // Empty has no fields and is not classified as a message type.
        assert_eq!(names(&registry), ORDER_TYPES);
        let order = registry.lookup("shop.v1.Order").unwrap();
        assert_eq!(order.fields().len(), 2);
    }

    #[test]
    fn test_ingest_falls_back_to_lookup() {
        let pool = pool();
        // Shell tree: names only, no type handles on any node.
        let root = KeyedNode::new().with(
            "shop",
            KeyedNode::new().with("v1", KeyedNode::new().with("Order", KeyedNode::new())),
        );

        let mut registry = TypeRegistry::new();
        let found = registry.ingest(&document("lazy", ParsedSchema::new(root, pool)));

        assert_eq!(found, 1);
        assert!(registry.contains("shop.v1.Order"));
    }

    #[test]
    fn test_ingest_empty_tree() {
        let mut registry = TypeRegistry::new();
        let found = registry.ingest(&document(
            "empty",
            ParsedSchema::new(KeyedNode::new(), DescriptorPool::new()),
        ));
        assert_eq!(found, 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_flatten_all_last_loaded_wins() {
        let compile = |name: &str| {
            let sources: Sources = [(name.to_string(), SHOP_PROTO.to_string())].into();
            ProtoxCompiler.compile(name, &sources).unwrap()
        };
        let a = document("a.proto", compile("a.proto"));
        let b = document("b.proto", compile("b.proto"));

        let mut registry = TypeRegistry::new();
        registry.flatten_all([&a, &b]);
        assert_eq!(owner(&registry, "shop.v1.Order"), "b.proto");
        assert_eq!(registry.len(), 2);

        registry.flatten_all([&b, &a]);
        assert_eq!(owner(&registry, "shop.v1.Order"), "a.proto");
    }

    #[test]
    fn test_flatten_all_is_idempotent() {
        let sources: Sources = [("shop.proto".to_string(), SHOP_PROTO.to_string())].into();
        let parsed = ProtoxCompiler.compile("shop.proto", &sources).unwrap();
        let doc = document("shop.proto", parsed);

        let mut registry = TypeRegistry::new();
        registry.flatten_all([&doc]);
        let first: Vec<_> = registry
            .iter()
            .map(|t| (t.qualified_name().to_owned(), t.fields().to_vec()))
            .collect();

        registry.flatten_all([&doc]);
        let second: Vec<_> = registry
            .iter()
            .map(|t| (t.qualified_name().to_owned(), t.fields().to_vec()))
            .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn test_lookup_unknown_type() {
        let registry = TypeRegistry::new();
        assert_eq!(
            registry.lookup("shop.v1.Missing").unwrap_err(),
            SchemaError::UnknownType("shop.v1.Missing".into())
        );
    }
}
