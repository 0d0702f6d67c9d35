//! Property-based test generators using proptest.
//!
//! Provides strategies for change sequences over a small set of logical
//! entities and for reference graphs with cycles.

use crate::fixtures::{reference, weak_reference, DocumentBuilder};
use docsync_protocol::Document;
use proptest::prelude::*;

/// A single change to the remote dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Write the published document of an entity.
    PutPublished {
        /// Entity index.
        entity: usize,
        /// Title to store.
        title: String,
    },
    /// Write the draft document of an entity.
    PutDraft {
        /// Entity index.
        entity: usize,
        /// Title to store.
        title: String,
    },
    /// Delete the published document of an entity.
    DeletePublished {
        /// Entity index.
        entity: usize,
    },
    /// Delete the draft document of an entity.
    DeleteDraft {
        /// Entity index.
        entity: usize,
    },
}

impl Mutation {
    /// Published id of the entity this mutation touches.
    pub fn published_id(&self) -> String {
        let entity = match self {
            Mutation::PutPublished { entity, .. }
            | Mutation::PutDraft { entity, .. }
            | Mutation::DeletePublished { entity }
            | Mutation::DeleteDraft { entity } => *entity,
        };
        entity_id(entity)
    }

    /// Raw id of the document this mutation writes or deletes.
    pub fn raw_id(&self) -> String {
        match self {
            Mutation::PutPublished { .. } | Mutation::DeletePublished { .. } => {
                self.published_id()
            }
            Mutation::PutDraft { .. } | Mutation::DeleteDraft { .. } => {
                format!("drafts.{}", self.published_id())
            }
        }
    }

    /// The document written, or `None` for deletions.
    pub fn document(&self) -> Option<Document> {
        match self {
            Mutation::PutPublished { title, .. } => Some(
                DocumentBuilder::new(self.raw_id(), "post")
                    .field("title", title.as_str())
                    .build(),
            ),
            Mutation::PutDraft { title, .. } => Some(
                DocumentBuilder::new(self.raw_id(), "post")
                    .field("title", title.as_str())
                    .build(),
            ),
            Mutation::DeletePublished { .. } | Mutation::DeleteDraft { .. } => None,
        }
    }
}

/// Published id of the entity with the given index.
pub fn entity_id(index: usize) -> String {
    format!("post-{index}")
}

/// Strategy for a single mutation over `entities` entities.
pub fn mutation_strategy(entities: usize) -> impl Strategy<Value = Mutation> {
    let entity = 0..entities.max(1);
    let title = "[a-z]{1,6}";
    prop_oneof![
        (entity.clone(), title)
            .prop_map(|(entity, title)| Mutation::PutPublished { entity, title }),
        (entity.clone(), title).prop_map(|(entity, title)| Mutation::PutDraft { entity, title }),
        entity
            .clone()
            .prop_map(|entity| Mutation::DeletePublished { entity }),
        entity.prop_map(|entity| Mutation::DeleteDraft { entity }),
    ]
}

/// Strategy for a sequence of mutations.
pub fn mutation_sequence_strategy(
    entities: usize,
    max_len: usize,
) -> impl Strategy<Value = Vec<Mutation>> {
    prop::collection::vec(mutation_strategy(entities), 1..=max_len.max(1))
}

/// An edge of a reference graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Source node index.
    pub from: usize,
    /// Target node index; may equal `from`.
    pub to: usize,
    /// Whether the reference is weak.
    pub weak: bool,
}

/// Strategy for edges of a graph with `nodes` nodes, cycles included.
pub fn reference_graph_strategy(nodes: usize) -> impl Strategy<Value = Vec<Edge>> {
    let n = nodes.max(1);
    prop::collection::vec(
        (0..n, 0..n, any::<bool>()).prop_map(|(from, to, weak)| Edge { from, to, weak }),
        0..n * 3,
    )
}

/// Builds one published `post` per node, with its outgoing edges stored
/// as a `links` array of references.
pub fn graph_documents(nodes: usize, edges: &[Edge]) -> Vec<Document> {
    (0..nodes)
        .map(|i| {
            let links: Vec<serde_json::Value> = edges
                .iter()
                .filter(|e| e.from == i)
                .map(|e| {
                    if e.weak {
                        weak_reference(&entity_id(e.to))
                    } else {
                        reference(&entity_id(e.to))
                    }
                })
                .collect();
            DocumentBuilder::new(entity_id(i), "post")
                .field("title", format!("node {i}"))
                .field("links", links)
                .build()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn mutations_stay_in_range(seq in mutation_sequence_strategy(3, 10)) {
            for m in &seq {
                let id = m.published_id();
                prop_assert!(["post-0", "post-1", "post-2"].contains(&id.as_str()));
                prop_assert_eq!(m.raw_id().ends_with(&id), true);
                prop_assert_eq!(m.document().is_some(), matches!(
                    m,
                    Mutation::PutPublished { .. } | Mutation::PutDraft { .. }
                ));
            }
        }

        #[test]
        fn graph_documents_carry_edges(edges in reference_graph_strategy(4)) {
            let docs = graph_documents(4, &edges);
            prop_assert_eq!(docs.len(), 4);
            let total: usize = docs
                .iter()
                .map(|d| d.fields["links"].as_array().map_or(0, Vec::len))
                .sum();
            prop_assert_eq!(total, edges.len());
        }
    }
}
