//! Runtime reference resolution.
//!
//! Expands `{_ref}` objects into the content of the nodes they point at,
//! at query time. Every nesting level counts towards the depth bound, so
//! reference cycles terminate.

use crate::node::NodeLookup;
use docsync_protocol::id::{published_id_of, safe_id};
use docsync_protocol::{LocalId, NodeIdMapper};
use docsync_schema::{RAW_DATA_PREFIX, RAW_PREFIX};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Result of a resolution, with the strong references that had no target.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The resolved value.
    pub value: Value,
    /// Targets of strong references that resolved to `null`.
    pub missing: Vec<String>,
}

/// The resolver.
#[derive(Clone)]
pub struct Resolver {
    mapper: Arc<dyn NodeIdMapper>,
    max_depth: usize,
    overlay_drafts: bool,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("max_depth", &self.max_depth)
            .field("overlay_drafts", &self.overlay_drafts)
            .finish_non_exhaustive()
    }
}

impl Resolver {
    /// Creates a resolver.
    pub fn new(mapper: Arc<dyn NodeIdMapper>, max_depth: usize, overlay_drafts: bool) -> Self {
        Self {
            mapper,
            max_depth,
            overlay_drafts,
        }
    }

    /// The default depth bound.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolves a value with the default depth bound.
    pub fn resolve(&self, value: &Value, lookup: &dyn NodeLookup) -> Value {
        self.resolve_bounded(value, lookup, self.max_depth).value
    }

    /// Resolves a value with an explicit depth bound.
    pub fn resolve_bounded(
        &self,
        value: &Value,
        lookup: &dyn NodeLookup,
        max_depth: usize,
    ) -> Resolution {
        let mut pass = Pass {
            resolver: self,
            lookup,
            max_depth,
            missing: Vec::new(),
        };
        let value = pass.resolve(value, 0);
        Resolution {
            value,
            missing: pass.missing,
        }
    }

    fn target_of(&self, raw_ref: &str, lookup: &dyn NodeLookup) -> Option<Map<String, Value>> {
        if let Some(node) = lookup.get_node(&LocalId::new(raw_ref)) {
            return Some(node.content);
        }
        // Raw-data fields still carry remote ids
        let mapped = if self.overlay_drafts {
            safe_id(published_id_of(raw_ref), self.mapper.as_ref())
        } else {
            safe_id(raw_ref, self.mapper.as_ref())
        };
        lookup.get_node(&mapped).map(|node| node.content)
    }
}

struct Pass<'r> {
    resolver: &'r Resolver,
    lookup: &'r dyn NodeLookup,
    max_depth: usize,
    missing: Vec<String>,
}

impl Pass<'_> {
    fn resolve(&mut self, value: &Value, depth: usize) -> Value {
        match value {
            Value::Array(items) if depth <= self.max_depth => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve(item, depth + 1))
                    .collect(),
            ),
            Value::Object(map) => match map.get("_ref").and_then(Value::as_str) {
                Some(target) => self.resolve_reference(map, target, depth),
                None => self.resolve_object(map, depth),
            },
            other => other.clone(),
        }
    }

    fn resolve_reference(&mut self, reference: &Map<String, Value>, target: &str, depth: usize) -> Value {
        match self.resolver.target_of(target, self.lookup) {
            Some(content) if depth <= self.max_depth => {
                self.resolve_object(&content, depth + 1)
            }
            Some(_) => Value::Object(reference.clone()),
            None => {
                let weak = reference
                    .get("_weak")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !weak {
                    tracing::warn!(reference = %target, "unresolved strong reference");
                    self.missing.push(target.to_string());
                }
                Value::Null
            }
        }
    }

    /// Keys present on the object win over renamed `_rawData` keys.
    fn resolve_object(&mut self, map: &Map<String, Value>, depth: usize) -> Value {
        let mut out = Map::new();
        let mut renamed = Vec::new();
        for (key, value) in map {
            match key.strip_prefix(RAW_DATA_PREFIX) {
                Some(field) if !field.is_empty() => renamed.push((field, value)),
                _ => {
                    out.insert(key.clone(), self.resolve(value, depth + 1));
                }
            }
        }
        for (field, value) in renamed {
            let key = format!("{RAW_PREFIX}{field}");
            if !out.contains_key(&key) {
                let resolved = self.resolve(value, depth + 1);
                out.insert(key, resolved);
            }
        }
        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{MemoryNodeStore, NodeSource, NodeStore, OutputNode};
    use docsync_protocol::UuidNodeIdMapper;
    use docsync_testkit::{reference, weak_reference};
    use serde_json::json;

    fn mapper() -> Arc<dyn NodeIdMapper> {
        Arc::new(UuidNodeIdMapper::default())
    }

    fn local(raw: &str) -> LocalId {
        safe_id(raw, &UuidNodeIdMapper::default())
    }

    fn store_with(nodes: &[(&str, Value)]) -> MemoryNodeStore {
        let store = MemoryNodeStore::new();
        for (published, content) in nodes {
            let Value::Object(content) = content.clone() else {
                panic!("content must be an object");
            };
            store
                .create_node(OutputNode {
                    id: local(published),
                    type_name: "SanityPost".into(),
                    content,
                    provenance: published.to_string(),
                    source: NodeSource::Published,
                    content_digest: String::new(),
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn scalars_unchanged() {
        let resolver = Resolver::new(mapper(), 5, false);
        let store = MemoryNodeStore::new();
        for value in [json!(null), json!(1), json!("x"), json!(true)] {
            assert_eq!(resolver.resolve(&value, &store), value);
        }
    }

    #[test]
    fn references_expand_to_node_content() {
        let store = store_with(&[("author-1", json!({"name": "Ada"}))]);
        let resolver = Resolver::new(mapper(), 5, false);

        let value = json!({"title": "T", "author": {"_ref": local("author-1").as_str()}});
        assert_eq!(
            resolver.resolve(&value, &store),
            json!({"title": "T", "author": {"name": "Ada"}})
        );
    }

    #[test]
    fn raw_remote_ids_are_mapped() {
        let store = store_with(&[("author-1", json!({"name": "Ada"}))]);

        let overlay = Resolver::new(mapper(), 5, true);
        assert_eq!(
            overlay.resolve(&reference("drafts.author-1"), &store),
            json!({"name": "Ada"})
        );

        let plain = Resolver::new(mapper(), 5, false);
        assert_eq!(
            plain.resolve(&reference("author-1"), &store),
            json!({"name": "Ada"})
        );
    }

    #[test]
    fn missing_references() {
        let store = MemoryNodeStore::new();
        let resolver = Resolver::new(mapper(), 5, false);

        let weak = resolver.resolve_bounded(&weak_reference("gone"), &store, 5);
        assert_eq!(weak.value, Value::Null);
        assert!(weak.missing.is_empty());

        let strong = resolver.resolve_bounded(&reference("gone"), &store, 5);
        assert_eq!(strong.value, Value::Null);
        assert_eq!(strong.missing, vec!["gone"]);
    }

    #[test]
    fn raw_data_keys_surface_as_raw() {
        let resolver = Resolver::new(mapper(), 5, false);
        let store = MemoryNodeStore::new();

        let value = json!({"_rawDataBody": [1], "_rawData": 2});
        assert_eq!(
            resolver.resolve(&value, &store),
            json!({"_rawBody": [1], "_rawData": 2})
        );

        // the key already present wins
        let value = json!({"_rawBody": "kept", "_rawDataBody": "dropped"});
        assert_eq!(resolver.resolve(&value, &store), json!({"_rawBody": "kept"}));
    }

    #[test]
    fn present_raw_key_wins_regardless_of_key_order() {
        let resolver = Resolver::new(mapper(), 5, false);
        let store = MemoryNodeStore::new();

        // `_rawDataEvents` sorts before `_rawEvents`
        let value = json!({"_rawEvents": "kept", "_rawDataEvents": "dropped"});
        assert_eq!(resolver.resolve(&value, &store), json!({"_rawEvents": "kept"}));

        let value = json!({"_rawZones": [1], "_rawDataZones": [2], "_rawDataTags": [3]});
        assert_eq!(
            resolver.resolve(&value, &store),
            json!({"_rawZones": [1], "_rawTags": [3]})
        );
    }

    #[test]
    fn self_reference_terminates() {
        let me = local("loop");
        let store = store_with(&[("loop", json!({"self": {"_ref": me.as_str()}}))]);
        let resolver = Resolver::new(mapper(), 3, false);

        let resolved = resolver.resolve(&json!({"_ref": me.as_str()}), &store);
        // depth 0 ref -> content at 1 -> "self" at 2 -> content at 3 -> "self" at 4 stays a reference
        assert_eq!(
            resolved,
            json!({"self": {"self": {"_ref": me.as_str()}}})
        );
    }

    #[test]
    fn arrays_beyond_bound_unchanged() {
        let resolver = Resolver::new(mapper(), 0, false);
        let store = MemoryNodeStore::new();
        let value = json!({"list": [reference("gone")]});
        assert_eq!(resolver.resolve(&value, &store), value);
    }
}
