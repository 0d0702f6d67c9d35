//! Live listener events.

use crate::document::Document;
use serde::{Deserialize, Serialize};

/// An event pushed over the live listener connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListenerEvent {
    /// The subscription is established.
    Welcome,
    /// A document changed.
    Mutation(MutationEvent),
    /// The server asks the client to reconnect; changes may have been missed.
    Reconnect,
}

/// A single document mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationEvent {
    /// Raw id of the mutated document.
    pub document_id: String,
    /// The document after the mutation; absent when it disappeared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Document>,
    /// How the document's visibility changed.
    pub transition: Transition,
}

impl MutationEvent {
    /// Returns the document to store, or `None` if the id should be removed.
    pub fn stored_document(&self) -> Option<&Document> {
        match self.transition {
            Transition::Disappear => None,
            Transition::Appear | Transition::Update => self.result.as_ref(),
        }
    }
}

/// Visibility transition carried by a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// The document started matching the subscription.
    Appear,
    /// The document changed and still matches.
    Update,
    /// The document was deleted or stopped matching.
    Disappear,
}
