//! Raw remote documents.

use crate::error::{ProtocolError, ProtocolResult};
use crate::id::{is_draft_id, is_system_id, published_id_of};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Type tags under this prefix belong to internal documents.
const SYSTEM_TYPE_PREFIX: &str = "system.";

/// A document as stored in the remote dataset.
///
/// System keys are lifted into fields; everything else stays in `fields`
/// in wire order. A missing `_type` decodes to an empty string so the
/// reconciler can report the document instead of the decoder dropping it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Raw id, draft-prefixed for drafts.
    #[serde(rename = "_id")]
    pub id: String,
    /// Type tag.
    #[serde(rename = "_type", default)]
    pub doc_type: String,
    /// Revision.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Last modification time.
    #[serde(
        rename = "_updatedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
    /// All remaining keys.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Creates a document with no fields.
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            revision: None,
            updated_at: None,
            fields: Map::new(),
        }
    }

    /// Decodes a document from a JSON value.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        if !value.is_object() {
            return Err(ProtocolError::InvalidDocument(
                "document is not an object".into(),
            ));
        }
        let doc: Self = serde_json::from_value(value)?;
        if doc.id.is_empty() {
            return Err(ProtocolError::InvalidDocument("empty _id".into()));
        }
        Ok(doc)
    }

    /// Encodes the document back into a JSON object.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("_id".into(), Value::String(self.id.clone()));
        map.insert("_type".into(), Value::String(self.doc_type.clone()));
        if let Some(rev) = &self.revision {
            map.insert("_rev".into(), Value::String(rev.clone()));
        }
        if let Some(updated_at) = &self.updated_at {
            map.insert("_updatedAt".into(), Value::String(updated_at.to_rfc3339()));
        }
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }

    /// Sets a field, builder style.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns the published id of the entity this document belongs to.
    pub fn published_id(&self) -> &str {
        published_id_of(&self.id)
    }

    /// Returns true for draft documents.
    pub fn is_draft(&self) -> bool {
        is_draft_id(&self.id)
    }

    /// Returns true for internal documents that are never mirrored.
    pub fn is_system(&self) -> bool {
        is_system_id(&self.id) || self.doc_type.starts_with(SYSTEM_TYPE_PREFIX)
    }
}
