//! Reference rewriting.
//!
//! Turns a raw document into the content of its output node. Raw values of
//! non-scalar and alias fields are kept under `_rawData<Field>` before any
//! rewriting, so the resolver can later expand them on demand.

use crate::node::{NodeSource, OutputNode};
use crate::reconcile::SkipReason;
use docsync_protocol::id::{published_id_of, safe_id};
use docsync_protocol::{Document, NodeIdMapper};
use docsync_schema::{
    conflict_free_field_name, raw_data_field_name, FieldEntry, ObjectEntry, TypeMap,
    RAW_DATA_PREFIX, RESTRICTED_NODE_FIELDS,
};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

/// Returns true for keys holding raw, unrewritten values.
pub(crate) fn is_raw_data_key(key: &str) -> bool {
    key.len() > RAW_DATA_PREFIX.len() && key.starts_with(RAW_DATA_PREFIX)
}

/// Builds output nodes from raw documents.
pub struct NodeBuilder<'a> {
    type_map: &'a TypeMap,
    mapper: &'a dyn NodeIdMapper,
}

impl<'a> NodeBuilder<'a> {
    /// Creates a builder over a type map and id mapper.
    pub fn new(type_map: &'a TypeMap, mapper: &'a dyn NodeIdMapper) -> Self {
        Self { type_map, mapper }
    }

    /// Builds the node for `doc`, chosen from its entity's `source` document.
    ///
    /// The node is keyed by the entity's published id, so a draft overlay
    /// and the published document share one local id.
    pub fn build(&self, doc: &Document, source: NodeSource) -> Result<OutputNode, SkipReason> {
        if doc.doc_type.is_empty() {
            return Err(SkipReason::Malformed("document has no _type".into()));
        }
        let object = self
            .type_map
            .object_for_document_type(&doc.doc_type)
            .ok_or_else(|| SkipReason::UnknownType(doc.doc_type.clone()))?;

        let published_id = doc.published_id().to_string();
        let local_id = safe_id(&published_id, self.mapper);
        let prefix = self.type_map.prefix();

        let mut content = Map::new();
        for (key, value) in &doc.fields {
            if !RESTRICTED_NODE_FIELDS.contains(&key.as_str()) {
                content.insert(key.clone(), value.clone());
            }
        }
        for (key, value) in &doc.fields {
            if RESTRICTED_NODE_FIELDS.contains(&key.as_str()) {
                content.insert(conflict_free_field_name(key, prefix), value.clone());
            }
        }

        for (key, _) in object.raw_fields() {
            if let Some(raw) = doc.fields.get(key) {
                content.insert(raw_data_field_name(key), raw.clone());
            }
        }

        rewrite_references(&mut content, self.mapper);
        self.annotate_unions(&mut content, object);

        content.insert("_id".into(), Value::String(published_id.clone()));
        content.insert("_type".into(), Value::String(doc.doc_type.clone()));
        if let Some(rev) = &doc.revision {
            content.insert("_rev".into(), Value::String(rev.clone()));
        }
        if let Some(updated_at) = &doc.updated_at {
            content.insert("_updatedAt".into(), Value::String(updated_at.to_rfc3339()));
        }
        content.insert("id".into(), Value::String(local_id.to_string()));

        let content_digest = digest(&content);

        Ok(OutputNode {
            id: local_id,
            type_name: object.name.clone(),
            content,
            provenance: published_id,
            source,
            content_digest,
        })
    }

    /// Tags union members with `internal.type` at any depth, following the
    /// declared type of each field. Raw data and references are left alone.
    fn annotate_unions(&self, content: &mut Map<String, Value>, object: &'a ObjectEntry) {
        let prefix = self.type_map.prefix();
        let mut stack: Vec<(&mut Value, &'a FieldEntry)> = Vec::new();
        for (key, value) in content.iter_mut() {
            if is_raw_data_key(key) {
                continue;
            }
            // top-level restricted fields were renamed
            let source = RESTRICTED_NODE_FIELDS
                .iter()
                .copied()
                .find(|field| conflict_free_field_name(field, prefix) == *key)
                .unwrap_or(key.as_str());
            if let Some(field) = object.fields.get(source) {
                stack.push((value, field));
            }
        }

        while let Some((value, field)) = stack.pop() {
            if field.is_scalar || field.is_reference {
                continue;
            }
            let is_union = self.type_map.is_union(&field.named_type);
            let members: Vec<&mut Value> = match value {
                Value::Array(items) => items.iter_mut().collect(),
                other => vec![other],
            };
            for member in members {
                let Value::Object(map) = member else {
                    continue;
                };
                if map.contains_key("_ref") {
                    continue;
                }
                let member_type = if is_union {
                    let Some(tag) = map.get("_type").and_then(Value::as_str) else {
                        continue;
                    };
                    let resolved = self.type_map.host_type_name(tag);
                    map.insert("internal".into(), json!({ "type": resolved.clone() }));
                    resolved
                } else {
                    field.named_type.clone()
                };
                let Some(entry) = self.type_map.object(&member_type) else {
                    continue;
                };
                for (key, child) in map.iter_mut() {
                    if let Some(field) = entry.fields.get(key.as_str()) {
                        stack.push((child, field));
                    }
                }
            }
        }
    }
}

/// Replaces every `_ref` outside the raw-data fields with the local id of
/// its target's published entity.
///
/// Walks with an explicit stack; nothing is dereferenced.
pub fn rewrite_references(content: &mut Map<String, Value>, mapper: &dyn NodeIdMapper) {
    let mut stack: Vec<&mut Value> = content
        .iter_mut()
        .filter(|(key, _)| !is_raw_data_key(key))
        .map(|(_, value)| value)
        .collect();

    while let Some(value) = stack.pop() {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(target)) = map.get_mut("_ref") {
                    *target = safe_id(published_id_of(target), mapper).into();
                }
                stack.extend(map.values_mut());
            }
            Value::Array(items) => stack.extend(items.iter_mut()),
            _ => {}
        }
    }
}

fn digest(content: &Map<String, Value>) -> String {
    let mut hasher = Sha256::new();
    // Map keys serialize in sorted order, so equal content hashes equally
    if let Ok(bytes) = serde_json::to_vec(content) {
        hasher.update(&bytes);
    }
    format!("{:x}", hasher.finalize())
}
