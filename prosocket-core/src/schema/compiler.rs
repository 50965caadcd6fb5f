//! Schema compiler contract and the `protox`-backed implementation.
//!
//! The session never parses schema text itself. It hands the text to a
//! [`SchemaCompiler`], which returns a [`ParsedSchema`]: a navigable tree
//! plus a descriptor pool that can resolve any fully-qualified type name.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use prost_reflect::{DescriptorPool, MessageDescriptor};
use protox::file::{File, FileResolver, GoogleFileResolver};

use super::tree::{KeyedNode, ListNode, SchemaTree};

/// Source texts of every document visible to a compilation, keyed by
/// document name. Used to resolve imports between loaded documents.
pub type Sources = HashMap<String, String>;

/// Turns schema text into a [`ParsedSchema`].
pub trait SchemaCompiler: Send + Sync {
    /// Compile the document named `document`, whose text is in `sources`.
    ///
    /// On failure returns a human-readable message.
    fn compile(&self, document: &str, sources: &Sources) -> Result<ParsedSchema, String>;
}

/// Output of a schema compiler: the document's tree and its type pool.
#[derive(Debug)]
pub struct ParsedSchema {
    root: Box<dyn SchemaTree>,
    pool: DescriptorPool,
}

impl ParsedSchema {
    pub fn new(root: impl SchemaTree + 'static, pool: DescriptorPool) -> Self {
        Self {
            root: Box::new(root),
            pool,
        }
    }

    pub fn root(&self) -> &dyn SchemaTree {
        self.root.as_ref()
    }

    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }

    /// Resolve a fully-qualified message name directly against the pool.
    pub fn lookup_type(&self, name: &str) -> Option<MessageDescriptor> {
        self.pool.get_message_by_name(name.trim_start_matches('.'))
    }
}

/// Compiles `.proto` text with `protox`.
///
/// Imports resolve against the other loaded documents first and the bundled
/// well-known types second. The resulting tree keys packages by segment and
/// lists messages (with their nested messages) in declaration order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtoxCompiler;

impl ProtoxCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl SchemaCompiler for ProtoxCompiler {
    fn compile(&self, document: &str, sources: &Sources) -> Result<ParsedSchema, String> {
        let resolver = SourceResolver {
            sources: sources.clone(),
            google: GoogleFileResolver::new(),
        };
        let mut compiler = protox::Compiler::with_file_resolver(resolver);
        compiler.include_imports(true);
        compiler.open_file(document).map_err(|e| e.to_string())?;
        let pool = compiler.descriptor_pool();

        let file = pool
            .get_file_by_name(document)
            .ok_or_else(|| format!("compiled pool is missing {document}"))?;

        let mut root = NamespaceBuilder::default();
        let namespace = file
            .package_name()
            .split('.')
            .filter(|segment| !segment.is_empty())
            .fold(&mut root, NamespaceBuilder::child);
        namespace.messages.extend(file.messages().map(message_node));

        tracing::debug!(
            document,
            package = file.package_name(),
            "compiled schema document"
        );
        Ok(ParsedSchema::new(root.build(), pool))
    }
}

fn message_node(message: MessageDescriptor) -> ListNode {
    let mut node = ListNode::for_message(message.clone());
    for child in message
        .child_messages()
        .filter(|child| !child.is_map_entry())
    {
        node.push(message_node(child));
    }
    node
}

#[derive(Default)]
struct NamespaceBuilder {
    namespaces: BTreeMap<String, NamespaceBuilder>,
    messages: Vec<ListNode>,
}

impl NamespaceBuilder {
    fn child<'a>(&'a mut self, name: &str) -> &'a mut NamespaceBuilder {
        self.namespaces.entry(name.to_owned()).or_default()
    }

    fn build(self) -> KeyedNode {
        let mut node = KeyedNode::new();
        for (name, namespace) in self.namespaces {
            node.insert(name, namespace.build());
        }
        for message in self.messages {
            let name = message.name().unwrap_or_default().to_owned();
            node.insert(name, message);
        }
        node
    }
}

struct SourceResolver {
    sources: Sources,
    google: GoogleFileResolver,
}

impl FileResolver for SourceResolver {
    fn resolve_path(&self, path: &Path) -> Option<String> {
        path.to_str()
            .filter(|name| self.sources.contains_key(*name))
            .map(str::to_owned)
    }

    fn open_file(&self, name: &str) -> Result<File, protox::Error> {
        match self.sources.get(name) {
            Some(source) => File::from_source(name, source),
            None => self.google.open_file(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_PROTO: &str = r#"
        syntax = "proto3";
        package example.v1;

        message User {
            int32 id = 1;
            string name = 2;

            message Address {
                string city = 1;
            }
        }

        message Empty {}
    "#;

    fn sources(entries: &[(&str, &str)]) -> Sources {
        entries
            .iter()
            .map(|(name, text)| (name.to_string(), text.to_string()))
            .collect()
    }

    #[test]
    fn test_compile_builds_package_tree() {
        let parsed = ProtoxCompiler
            .compile("user.proto", &sources(&[("user.proto", USER_PROTO)]))
            .unwrap();

        let root = parsed.root();
        let (name, example) = root.children()[0];
        assert_eq!(name, "example");
        let (name, v1) = example.children()[0];
        assert_eq!(name, "v1");

        let names: Vec<_> = v1.children().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["Empty", "User"]);

        let (_, user) = v1.children()[1];
        assert!(user.is_message_type());
        let (nested, _) = user.children()[0];
        assert_eq!(nested, "Address");
    }

    #[test]
    fn test_compile_reports_syntax_errors() {
        let err = ProtoxCompiler
            .compile("bad.proto", &sources(&[("bad.proto", "message {")]))
            .unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn test_compile_resolves_imports_between_documents() {
        let common = r#"
            syntax = "proto3";
            package common;
            message Id { string value = 1; }
        "#;
        let order = r#"
            syntax = "proto3";
            package shop;
            import "common.proto";
            message Order { common.Id id = 1; }
        "#;
        let parsed = ProtoxCompiler
            .compile(
                "order.proto",
                &sources(&[("common.proto", common), ("order.proto", order)]),
            )
            .unwrap();

        assert!(parsed.lookup_type("shop.Order").is_some());
        assert!(parsed.lookup_type("common.Id").is_some());
        // Imported types are resolvable but not part of the document's tree.
        let names: Vec<_> = parsed
            .root()
            .children()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["shop"]);
    }

    #[test]
    fn test_compile_resolves_well_known_types() {
        let text = r#"
            syntax = "proto3";
            import "google/protobuf/timestamp.proto";
            message Event { google.protobuf.Timestamp at = 1; }
        "#;
        let parsed = ProtoxCompiler
            .compile("event.proto", &sources(&[("event.proto", text)]))
            .unwrap();
        assert!(parsed.lookup_type("Event").is_some());
        assert!(parsed.lookup_type(".google.protobuf.Timestamp").is_some());
    }
}
