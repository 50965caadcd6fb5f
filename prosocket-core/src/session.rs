//! Schema session: the set of loaded documents and the registry built from them.
//!
//! A [`SchemaSession`] owns every [`SchemaDocument`] it loads, in load order.
//! Any change to that set (load, remove, reload, clear) re-flattens the
//! [`TypeRegistry`] from scratch, so a type never outlives its document.
//!
//! # Example
//!
//! ```
//! use prosocket_core::SchemaSession;
//! use serde_json::json;
//!
//! let mut session = SchemaSession::new();
//! session.load("ping.proto", r#"
//!     syntax = "proto3";
//!     package demo;
//!     message Ping { int64 seq = 1; string note = 2; }
//! "#)?;
//!
//! let codec = session.codec();
//! let bytes = codec.encode("demo.Ping", &json!({ "seq": 7 }))?;
//! let value = codec.decode("demo.Ping", &bytes)?;
//! assert_eq!(value, json!({ "seq": "7", "note": "" }));
//! # Ok::<(), prosocket_core::SchemaError>(())
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::codec::Codec;
use crate::schema::{ParsedSchema, ProtoxCompiler, SchemaCompiler, Sources, TypeRegistry};
use crate::SchemaError;

/// Namespace reported for documents without a top-level package.
const DEFAULT_NAMESPACE: &str = "default";

/// One loaded unit of schema text.
#[derive(Debug)]
pub struct SchemaDocument {
    name: String,
    source: String,
    loaded_at: DateTime<Utc>,
    parsed: ParsedSchema,
}

impl SchemaDocument {
    pub fn new(name: impl Into<String>, source: impl Into<String>, parsed: ParsedSchema) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            loaded_at: Utc::now(),
            parsed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// First top-level namespace of the document's tree, or `"default"`
    /// when the document declares its types at the top level.
    pub fn namespace(&self) -> &str {
        self.parsed
            .root()
            .children()
            .into_iter()
            .find(|(_, child)| child.message().is_none())
            .map_or(DEFAULT_NAMESPACE, |(name, _)| name)
    }

    pub fn parsed(&self) -> &ParsedSchema {
        &self.parsed
    }

    /// Whether this document's compilation pulled in `other`, directly or
    /// through another import.
    pub fn depends_on(&self, other: &str) -> bool {
        self.name != other && self.parsed.pool().get_file_by_name(other).is_some()
    }
}

/// Summary of a successful load.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct LoadReport {
    /// Name of the loaded document.
    pub document: String,
    /// Registry entries contributed by this document.
    pub types: usize,
    /// Registry size after the load.
    pub total: usize,
}

/// A set of loaded schema documents and their flattened type registry.
pub struct SchemaSession {
    compiler: Arc<dyn SchemaCompiler>,
    documents: Vec<SchemaDocument>,
    registry: TypeRegistry,
}

impl std::fmt::Debug for SchemaSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaSession")
            .field("documents", &self.documents.len())
            .field("types", &self.registry.len())
            .finish()
    }
}

impl Default for SchemaSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaSession {
    /// Create an empty session compiling `.proto` text with [`ProtoxCompiler`].
    pub fn new() -> Self {
        Self::with_compiler(Arc::new(ProtoxCompiler::new()))
    }

    /// Create an empty session with a custom schema compiler.
    pub fn with_compiler(compiler: Arc<dyn SchemaCompiler>) -> Self {
        Self {
            compiler,
            documents: Vec::new(),
            registry: TypeRegistry::new(),
        }
    }

    /// Load a document from schema text.
    ///
    /// Loading a name that is already present replaces that document and
    /// moves it to the end of the load order, so its types win collisions.
    /// Documents importing `name` are recompiled against the new text.
    /// On failure the session is left unchanged.
    pub fn load(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<LoadReport, SchemaError> {
        let name = name.into();
        let source = source.into();

        let mut sources = self.sources();
        sources.insert(name.clone(), source.clone());
        let parsed = self
            .compiler
            .compile(&name, &sources)
            .map_err(|message| SchemaError::parse(&name, message))?;

        self.documents.retain(|document| document.name != name);
        self.documents.push(SchemaDocument::new(name.clone(), source, parsed));
        self.recompile(|document| document.depends_on(&name));
        self.rebuild();

        let report = LoadReport {
            types: self.registry
                .iter()
                .filter(|t| t.document() == name)
                .count(),
            total: self.registry.len(),
            document: name,
        };
        tracing::info!(
            document = %report.document,
            types = report.types,
            total = report.total,
            "schema document loaded"
        );
        Ok(report)
    }

    /// Load several documents in order, collecting one result per document.
    pub fn load_all<I, N, S>(&mut self, files: I) -> Vec<Result<LoadReport, SchemaError>>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        files
            .into_iter()
            .map(|(name, source)| self.load(name, source))
            .collect()
    }

    /// Remove a document and every type it contributed.
    ///
    /// Documents importing it are recompiled; those that no longer compile
    /// keep their previous compilation until the import is loaded again.
    ///
    /// Returns `false` if no document has that name.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.documents.len();
        self.documents.retain(|document| document.name != name);
        if self.documents.len() == before {
            return false;
        }
        self.recompile(|document| document.depends_on(name));
        self.rebuild();
        tracing::info!(document = name, "schema document removed");
        true
    }

    /// Recompile every document from its source text and rebuild the registry.
    ///
    /// A document that no longer compiles (for instance because a document it
    /// imports was removed) keeps its previous compilation; its error is
    /// returned.
    pub fn reload(&mut self) -> Vec<SchemaError> {
        let failures = self.recompile(|_| true);
        self.rebuild();
        failures
    }

    /// Recompile the documents matching `filter` against the current sources.
    /// A document that fails keeps its previous compilation.
    fn recompile(&mut self, filter: impl Fn(&SchemaDocument) -> bool) -> Vec<SchemaError> {
        let sources = self.sources();
        let mut failures = Vec::new();
        for document in &mut self.documents {
            if !filter(document) {
                continue;
            }
            match self.compiler.compile(&document.name, &sources) {
                Ok(parsed) => document.parsed = parsed,
                Err(message) => {
                    tracing::warn!(
                        document = %document.name,
                        error = %message,
                        "failed to reload schema document"
                    );
                    failures.push(SchemaError::parse(&document.name, message));
                }
            }
        }
        failures
    }

    /// Drop every document and type.
    pub fn clear(&mut self) {
        self.documents.clear();
        self.registry = TypeRegistry::new();
    }

    /// Loaded documents in load order.
    pub fn documents(&self) -> &[SchemaDocument] {
        &self.documents
    }

    pub fn document(&self, name: &str) -> Option<&SchemaDocument> {
        self.documents.iter().find(|document| document.name == name)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Codec over the currently loaded types.
    pub fn codec(&self) -> Codec<'_> {
        Codec::new(&self.registry, &self.documents)
    }

    fn sources(&self) -> Sources {
        self.documents
            .iter()
            .map(|document| (document.name.clone(), document.source.clone()))
            .collect()
    }

    fn rebuild(&mut self) {
        self.registry.flatten_all(&self.documents);
    }
}
