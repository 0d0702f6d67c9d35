//! Draft overlay reconciliation.
//!
//! For one logical entity the desired output is a pure function of the
//! cached documents and the overlay policy:
//!
//! | overlay | draft | published | output          |
//! |---------|-------|-----------|-----------------|
//! | off     | any   | yes       | from published  |
//! | off     | any   | no        | none            |
//! | on      | yes   | any       | from draft      |
//! | on      | no    | yes       | from published  |
//! | on      | no    | no        | none            |
//!
//! The reconciler compares that against what is materialized in the node
//! store and issues the smallest write that closes the gap.

use crate::cache::{DocumentCache, EntityView};
use crate::error::MirrorResult;
use crate::node::{NodeSource, NodeStore};
use crate::rewrite::NodeBuilder;
use docsync_protocol::{Document, LocalId, NodeIdMapper};
use docsync_schema::TypeMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a document produced no node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The document's type is not declared in the schema.
    UnknownType(String),
    /// The document is structurally unusable.
    Malformed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::UnknownType(t) => write!(f, "type {t:?} is not in the schema"),
            SkipReason::Malformed(why) => write!(f, "malformed document: {why}"),
        }
    }
}

/// Result of reconciling one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A node was created.
    Created,
    /// An existing node was replaced.
    Updated,
    /// A node was deleted.
    Deleted,
    /// Nothing had to change.
    Unchanged,
    /// The chosen document could not be turned into a node.
    Skipped(SkipReason),
}

/// What the node store currently holds for an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedEntry {
    /// Local id of the node.
    pub local_id: LocalId,
    /// Which document it was built from.
    pub source: NodeSource,
    /// Digest of its content.
    pub digest: String,
}

/// Materialized nodes by published id.
pub type MaterializedMap = HashMap<String, MaterializedEntry>;

/// A document that produced no node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    /// Raw id, when one could be read.
    pub id: Option<String>,
    /// Why it was skipped.
    pub reason: SkipReason,
}

/// Aggregated outcomes of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Nodes created.
    pub created: u64,
    /// Nodes replaced.
    pub updated: u64,
    /// Nodes deleted.
    pub deleted: u64,
    /// Entities that needed no write.
    pub unchanged: u64,
    /// Documents that produced no node.
    pub skipped: Vec<SkippedDocument>,
}

impl ReconcileReport {
    /// Records one outcome.
    pub fn record(&mut self, id: &str, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Created => self.created += 1,
            ReconcileOutcome::Updated => self.updated += 1,
            ReconcileOutcome::Deleted => self.deleted += 1,
            ReconcileOutcome::Unchanged => self.unchanged += 1,
            ReconcileOutcome::Skipped(reason) => self.skip(Some(id.to_string()), reason),
        }
    }

    /// Records a skipped document.
    pub fn skip(&mut self, id: Option<String>, reason: SkipReason) {
        self.skipped.push(SkippedDocument { id, reason });
    }

    /// Number of node store writes the batch caused.
    pub fn writes(&self) -> u64 {
        self.created + self.updated + self.deleted
    }

    /// Folds another report into this one.
    pub fn merge(&mut self, other: ReconcileReport) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.skipped.extend(other.skipped);
    }
}

/// The reconciler.
#[derive(Clone)]
pub struct Reconciler {
    type_map: Arc<TypeMap>,
    mapper: Arc<dyn NodeIdMapper>,
    overlay_drafts: bool,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("overlay_drafts", &self.overlay_drafts)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler.
    pub fn new(type_map: Arc<TypeMap>, mapper: Arc<dyn NodeIdMapper>, overlay_drafts: bool) -> Self {
        Self {
            type_map,
            mapper,
            overlay_drafts,
        }
    }

    /// Returns the type map.
    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }

    /// Picks the document the entity's node should be built from.
    pub fn desired<'c>(&self, view: EntityView<'c>) -> Option<(&'c Document, NodeSource)> {
        match (self.overlay_drafts, view.draft, view.published) {
            (true, Some(draft), _) => Some((draft, NodeSource::Draft)),
            (_, _, Some(published)) => Some((published, NodeSource::Published)),
            _ => None,
        }
    }

    /// Brings the node of one entity in line with the cache.
    ///
    /// `published_id` must already be normalized. Only node store failures
    /// are errors; the materialized map is updated only after a write
    /// succeeds.
    pub fn reconcile(
        &self,
        published_id: &str,
        cache: &DocumentCache,
        materialized: &mut MaterializedMap,
        store: &dyn NodeStore,
    ) -> MirrorResult<ReconcileOutcome> {
        let Some((doc, source)) = self.desired(cache.entity(published_id)) else {
            return match materialized.get(published_id) {
                Some(entry) => {
                    store.delete_node(&entry.local_id)?;
                    debug!(id = %published_id, local_id = %entry.local_id, "deleted node");
                    materialized.remove(published_id);
                    Ok(ReconcileOutcome::Deleted)
                }
                None => Ok(ReconcileOutcome::Unchanged),
            };
        };

        let node = match NodeBuilder::new(&self.type_map, self.mapper.as_ref()).build(doc, source) {
            Ok(node) => node,
            Err(reason) => {
                warn!(id = %doc.id, %reason, "skipping document");
                return Ok(ReconcileOutcome::Skipped(reason));
            }
        };

        let outcome = match materialized.get(published_id) {
            Some(entry) if entry.source == source && entry.digest == node.content_digest => {
                return Ok(ReconcileOutcome::Unchanged);
            }
            Some(_) => ReconcileOutcome::Updated,
            None => ReconcileOutcome::Created,
        };

        let entry = MaterializedEntry {
            local_id: node.id.clone(),
            source,
            digest: node.content_digest.clone(),
        };
        debug!(
            id = %published_id,
            type_name = %node.type_name,
            ?source,
            ?outcome,
            "writing node"
        );
        store.create_node(node)?;
        materialized.insert(published_id.to_string(), entry);
        Ok(outcome)
    }

    /// Reconciles a batch of published ids, each once, in the given order.
    pub fn reconcile_all<'i>(
        &self,
        published_ids: impl IntoIterator<Item = &'i str>,
        cache: &DocumentCache,
        materialized: &mut MaterializedMap,
        store: &dyn NodeStore,
    ) -> MirrorResult<ReconcileReport> {
        let mut report = ReconcileReport::default();
        for id in published_ids {
            let outcome = self.reconcile(id, cache, materialized, store)?;
            report.record(id, outcome);
        }
        Ok(report)
    }
}
