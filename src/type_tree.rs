//! Type-Tree Attacher.
//!
//! A type-tree is consumed opaquely by this crate — only `location` fields
//! inside it are inspected (by [`crate::position`]) and later rewritten.
//! The external types table's own retrieval details are opaque; it is
//! represented here as a `TypesProvider` trait so the attacher's call sites
//! stay unconditional regardless of whether a types file was actually
//! supplied, rather than pushing `Option` checks out to callers.

use crate::span_tree::SpanTree;
use crate::trace_event::EventArgs;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;

/// A recursive type description tree: keys are JSON-encoded type
/// descriptors, values are sub-type-trees.
pub type TypeTree = HashMap<String, TypeTreeNode>;

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TypeTreeNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<TypeLocation>,
    #[serde(default, flatten)]
    pub children: TypeTree,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TypeLocation {
    pub path: String,
    pub line: u32,
    pub column: u32,
}

/// Supplies a type-tree for a given type id, given the external types
/// array. Implementations own whatever memoization they need.
pub trait TypesProvider {
    fn type_tree(&mut self, id: &str) -> Result<TypeTree>;
}

/// Always returns an empty tree — used when no `--types` path was given, so
/// the attacher doesn't need to special-case "no provider" at every call
/// site.
#[derive(Debug, Default)]
pub struct NullTypesProvider;

impl TypesProvider for NullTypesProvider {
    fn type_tree(&mut self, _id: &str) -> Result<TypeTree> {
        Ok(TypeTree::new())
    }
}

/// Loads the types JSON array once, indexes it by id, and serves
/// `type_tree` lookups from that index, consulted lazily with its result
/// cached process-wide — expressed as an explicit owned cache field on the
/// provider rather than a global.
#[derive(Debug)]
pub struct JsonTypesProvider {
    by_id: HashMap<String, Value>,
    cache: HashMap<String, TypeTree>,
}

impl JsonTypesProvider {
    /// Parses a JSON array of `{ "id": ..., "tree": ... }`-shaped entries.
    /// A malformed types file is treated as empty: warn, then continue.
    pub fn from_json_array(raw: &str) -> Self {
        let entries: Vec<Value> = match serde_json::from_str(raw) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::warn!(error = %err, "malformed types file; treating as empty");
                Vec::new()
            }
        };
        let mut by_id = HashMap::new();
        for entry in entries {
            if let Some(id) = entry.get("id").and_then(Value::as_str) {
                if let Some(tree) = entry.get("tree") {
                    by_id.insert(id.to_string(), tree.clone());
                }
            }
        }
        Self {
            by_id,
            cache: HashMap::new(),
        }
    }
}

impl TypesProvider for JsonTypesProvider {
    fn type_tree(&mut self, id: &str) -> Result<TypeTree> {
        if let Some(cached) = self.cache.get(id) {
            return Ok(cached.clone());
        }
        let tree = match self.by_id.get(id) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or_default(),
            None => TypeTree::new(),
        };
        self.cache.insert(id.to_string(), tree.clone());
        Ok(tree)
    }
}

/// Walks the span tree and attaches a union of the source and target
/// type-trees to each leaf `structuredTypeRelatedTo` span. Missing types
/// yield an empty attachment rather than an error.
pub fn attach(tree: &mut SpanTree, provider: &mut dyn TypesProvider) -> Result<()> {
    for id in 0..tree.nodes.len() {
        if !tree.nodes[id].is_leaf() {
            continue;
        }
        let Some(event) = tree.nodes[id].event.clone() else {
            continue;
        };
        if event.name != "structuredTypeRelatedTo" {
            continue;
        }
        let EventArgs::StructuredTypeRelatedTo {
            source_id,
            target_id,
        } = event.typed_args()
        else {
            continue;
        };
        let mut union = provider.type_tree(&source_id)?;
        union.extend(provider.type_tree(&target_id)?);
        tree.nodes[id].type_tree = Some(union);
    }
    Ok(())
}
