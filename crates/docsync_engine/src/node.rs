//! Output nodes and the host seams that store them.

use crate::error::{MirrorError, MirrorResult};
use docsync_protocol::LocalId;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Which document of an entity a node was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSource {
    /// The published document.
    Published,
    /// The draft document.
    Draft,
}

/// A node in the host graph, one per materialized logical entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputNode {
    /// Local id.
    pub id: LocalId,
    /// Host type name.
    pub type_name: String,
    /// Rewritten document content.
    pub content: Map<String, Value>,
    /// Published id of the entity.
    pub provenance: String,
    /// Which document the content came from.
    pub source: NodeSource,
    /// SHA-256 of the serialized content, hex encoded.
    pub content_digest: String,
}

/// Read access to the host's nodes.
pub trait NodeLookup: Send + Sync {
    /// Returns the node with the given local id.
    fn get_node(&self, id: &LocalId) -> Option<OutputNode>;
}

/// The host's node storage.
pub trait NodeStore: NodeLookup {
    /// Creates or replaces a node.
    fn create_node(&self, node: OutputNode) -> MirrorResult<()>;

    /// Deletes a node. Deleting an unknown id is not an error.
    fn delete_node(&self, id: &LocalId) -> MirrorResult<()>;
}

/// The host's schema registration hook.
pub trait SchemaRegistrar: Send + Sync {
    /// Registers rewritten SDL with the host.
    fn register_types(&self, sdl: &str) -> MirrorResult<()>;
}

/// An in-memory node store for tests and the CLI.
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    nodes: RwLock<HashMap<LocalId, OutputNode>>,
    writes: AtomicU64,
    fail_writes: AtomicBool,
}

impl MemoryNodeStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Returns true if the store holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// All nodes, ordered by local id.
    pub fn nodes(&self) -> Vec<OutputNode> {
        let mut nodes: Vec<OutputNode> = self.nodes.read().values().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Finds the node materialized for a published id.
    pub fn node_for(&self, published_id: &str) -> Option<OutputNode> {
        self.nodes
            .read()
            .values()
            .find(|n| n.provenance == published_id)
            .cloned()
    }

    /// Number of create and delete calls that reached the store.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes every following write fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> MirrorResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(MirrorError::NodeStore("store is rejecting writes".into()))
        } else {
            Ok(())
        }
    }
}

impl NodeLookup for MemoryNodeStore {
    fn get_node(&self, id: &LocalId) -> Option<OutputNode> {
        self.nodes.read().get(id).cloned()
    }
}

impl NodeStore for MemoryNodeStore {
    fn create_node(&self, node: OutputNode) -> MirrorResult<()> {
        self.check_writable()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.nodes.write().insert(node.id.clone(), node);
        Ok(())
    }

    fn delete_node(&self, id: &LocalId) -> MirrorResult<()> {
        self.check_writable()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.nodes.write().remove(id);
        Ok(())
    }
}

/// A registrar that keeps every registered SDL document.
#[derive(Debug, Default)]
pub struct MemorySchemaRegistrar {
    registered: RwLock<Vec<String>>,
}

impl MemorySchemaRegistrar {
    /// Creates an empty registrar.
    pub fn new() -> Self {
        Self::default()
    }

    /// The SDL documents registered so far.
    pub fn registered(&self) -> Vec<String> {
        self.registered.read().clone()
    }
}

impl SchemaRegistrar for MemorySchemaRegistrar {
    fn register_types(&self, sdl: &str) -> MirrorResult<()> {
        self.registered.write().push(sdl.to_string());
        Ok(())
    }
}
