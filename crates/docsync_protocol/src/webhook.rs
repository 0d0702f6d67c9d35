//! Webhook payload classification.
//!
//! Two wire shapes exist. v1 bodies carry id lists:
//!
//! ```json
//! {"ids": {"created": ["a"], "updated": [], "deleted": ["b"]}}
//! ```
//!
//! v2 bodies carry one event with the document before and after:
//!
//! ```json
//! {"__webhooksVersion": "v2", "operation": "update", "documentId": "a",
//!  "before": {...}, "after": {...}}
//! ```
//!
//! Anything else is [`WebhookPayload::Unrecognized`]; decoding never fails.

use crate::document::Document;
use serde::Deserialize;
use serde_json::Value;

/// Version tag carried by v2 payloads.
pub const WEBHOOK_V2_TAG: &str = "v2";

/// A classified webhook body.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookPayload {
    /// Id lists; documents must be refetched.
    V1(V1Ids),
    /// A single event carrying the document.
    V2(V2Event),
    /// Not a payload this engine handles, with the reason.
    Unrecognized(String),
}

/// Id lists of a v1 payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct V1Ids {
    /// Created document ids.
    #[serde(default)]
    pub created: Vec<String>,
    /// Updated document ids.
    #[serde(default)]
    pub updated: Vec<String>,
    /// Deleted document ids.
    #[serde(default)]
    pub deleted: Vec<String>,
}

impl V1Ids {
    /// Ids whose current state must be fetched, created first.
    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.created.iter().chain(&self.updated).map(String::as_str)
    }

    /// Returns true if the payload lists no ids at all.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Operation of a v2 event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookOperation {
    /// Document created.
    Create,
    /// Document updated.
    Update,
    /// Document deleted.
    Delete,
}

/// A v2 event.
#[derive(Debug, Clone, PartialEq)]
pub enum V2Event {
    /// Store this document.
    Upsert {
        /// Create or update.
        operation: WebhookOperation,
        /// The document after the change.
        document: Document,
    },
    /// Remove this raw id.
    Delete {
        /// Raw id of the deleted document.
        document_id: String,
    },
}

#[derive(Deserialize)]
struct V1Body {
    ids: V1Ids,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct V2Body {
    operation: WebhookOperation,
    document_id: String,
    #[serde(default)]
    after: Option<Value>,
}

impl WebhookPayload {
    /// Classifies a webhook body.
    pub fn decode(body: &Value) -> Self {
        let Some(object) = body.as_object() else {
            return Self::Unrecognized("body is not an object".into());
        };

        match object.get("__webhooksVersion").and_then(Value::as_str) {
            Some(WEBHOOK_V2_TAG) => Self::decode_v2(body),
            Some(other) => Self::Unrecognized(format!("unsupported webhook version {other:?}")),
            None if object.contains_key("ids") => {
                match V1Body::deserialize(body) {
                    Ok(v1) => Self::V1(v1.ids),
                    Err(e) => Self::Unrecognized(format!("malformed v1 payload: {e}")),
                }
            }
            None => Self::Unrecognized("no ids and no version tag".into()),
        }
    }

    fn decode_v2(body: &Value) -> Self {
        let v2 = match V2Body::deserialize(body) {
            Ok(v2) => v2,
            Err(e) => return Self::Unrecognized(format!("malformed v2 payload: {e}")),
        };

        match (v2.operation, v2.after) {
            (WebhookOperation::Delete, _) => Self::V2(V2Event::Delete {
                document_id: v2.document_id,
            }),
            (operation, Some(after)) if !after.is_null() => match Document::from_value(after) {
                Ok(document) => Self::V2(V2Event::Upsert {
                    operation,
                    document,
                }),
                Err(e) => Self::Unrecognized(format!("invalid v2 document: {e}")),
            },
            (operation, _) => Self::Unrecognized(format!(
                "{operation:?} event for {} carries no document",
                v2.document_id
            )),
        }
    }
}
