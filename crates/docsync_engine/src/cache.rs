//! Document cache.
//!
//! Raw documents keyed by raw id. A logical entity therefore holds at most
//! one published and one draft document.

use docsync_protocol::id::{draft_id_of, published_id_of};
use docsync_protocol::Document;
use std::collections::{BTreeSet, HashMap};

/// The cache of raw remote documents.
#[derive(Debug, Clone, Default)]
pub struct DocumentCache {
    docs: HashMap<String, Document>,
}

/// The documents of one logical entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityView<'a> {
    /// The published document, if cached.
    pub published: Option<&'a Document>,
    /// The draft document, if cached.
    pub draft: Option<&'a Document>,
}

impl EntityView<'_> {
    /// Returns true if neither document is cached.
    pub fn is_absent(&self) -> bool {
        self.published.is_none() && self.draft.is_none()
    }
}

impl DocumentCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a document, returning the one it replaced.
    pub fn upsert(&mut self, doc: Document) -> Option<Document> {
        self.docs.insert(doc.id.clone(), doc)
    }

    /// Removes a document by raw id.
    pub fn remove(&mut self, raw_id: &str) -> Option<Document> {
        self.docs.remove(raw_id)
    }

    /// Looks up a document by raw id.
    pub fn get(&self, raw_id: &str) -> Option<&Document> {
        self.docs.get(raw_id)
    }

    /// Returns both documents of the entity with the given published id.
    pub fn entity(&self, published_id: &str) -> EntityView<'_> {
        EntityView {
            published: self.docs.get(published_id),
            draft: self.docs.get(&draft_id_of(published_id)),
        }
    }

    /// Distinct published ids of all cached entities, sorted.
    pub fn published_ids(&self) -> BTreeSet<String> {
        self.docs
            .keys()
            .map(|id| published_id_of(id).to_string())
            .collect()
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Iterates over all cached documents.
    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.docs.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_view_pairs_draft_and_published() {
        let mut cache = DocumentCache::new();
        cache.upsert(Document::new("a", "post"));
        cache.upsert(Document::new("drafts.a", "post"));
        cache.upsert(Document::new("drafts.b", "post"));

        let a = cache.entity("a");
        assert_eq!(a.published.unwrap().id, "a");
        assert_eq!(a.draft.unwrap().id, "drafts.a");

        let b = cache.entity("b");
        assert!(b.published.is_none());
        assert!(b.draft.is_some());

        assert!(cache.entity("c").is_absent());
    }

    #[test]
    fn published_ids_are_distinct() {
        let mut cache = DocumentCache::new();
        cache.upsert(Document::new("a", "post"));
        cache.upsert(Document::new("drafts.a", "post"));
        cache.upsert(Document::new("drafts.b", "post"));

        let ids: Vec<String> = cache.published_ids().into_iter().collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn upsert_replaces_by_raw_id() {
        let mut cache = DocumentCache::new();
        assert!(cache.upsert(Document::new("a", "post")).is_none());
        let old = cache.upsert(Document::new("a", "author")).unwrap();
        assert_eq!(old.doc_type, "post");
        assert_eq!(cache.get("a").unwrap().doc_type, "author");
        assert_eq!(cache.len(), 1);

        assert!(cache.remove("a").is_some());
        assert!(cache.remove("a").is_none());
        assert!(cache.is_empty());
    }
}
