//! Identity codec.
//!
//! Every logical entity has one published id `P`; its draft lives under
//! `drafts.P`. Output nodes are keyed by a local id derived from the
//! published id through the host's id mapper, except asset ids, which are
//! already globally unique and pass through unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Prefix carried by draft document ids.
pub const DRAFT_PREFIX: &str = "drafts.";

/// Prefix of internal/system document ids.
pub const SYSTEM_PREFIX: &str = "_.";

/// Returns the published id for a raw id.
#[must_use]
pub fn published_id_of(raw_id: &str) -> &str {
    raw_id.strip_prefix(DRAFT_PREFIX).unwrap_or(raw_id)
}

/// Returns the draft id for a published id.
///
/// Already-draft ids are returned unchanged.
#[must_use]
pub fn draft_id_of(published_id: &str) -> String {
    if is_draft_id(published_id) {
        published_id.to_string()
    } else {
        format!("{DRAFT_PREFIX}{published_id}")
    }
}

/// Returns true for draft ids.
#[must_use]
pub fn is_draft_id(raw_id: &str) -> bool {
    raw_id.starts_with(DRAFT_PREFIX)
}

/// Returns true for internal documents that are never mirrored.
#[must_use]
pub fn is_system_id(raw_id: &str) -> bool {
    raw_id.starts_with(SYSTEM_PREFIX)
}

/// Returns true for ids shaped like asset ids.
///
/// `image-<hash>-<width>x<height>-<ext>` and `file-<hash>-<ext>`.
#[must_use]
pub fn is_asset_id(raw_id: &str) -> bool {
    let (kind, rest) = match raw_id.split_once('-') {
        Some(parts) => parts,
        None => return false,
    };
    let parts: Vec<&str> = rest.split('-').collect();
    let is_hash = |s: &str| s.len() >= 32 && s.chars().all(|c| c.is_ascii_hexdigit());
    let is_ext = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());

    match (kind, parts.as_slice()) {
        ("image", [hash, dims, ext]) => {
            let valid_dims = dims.split_once('x').is_some_and(|(w, h)| {
                !w.is_empty()
                    && !h.is_empty()
                    && w.chars().all(|c| c.is_ascii_digit())
                    && h.chars().all(|c| c.is_ascii_digit())
            });
            is_hash(hash) && valid_dims && is_ext(ext)
        }
        ("file", [hash, ext]) => is_hash(hash) && is_ext(ext),
        _ => false,
    }
}

/// Maps a raw id to a local node id.
///
/// Asset ids pass through; everything else goes through the mapper.
pub fn safe_id<M: NodeIdMapper + ?Sized>(raw_id: &str, mapper: &M) -> LocalId {
    if is_asset_id(raw_id) {
        LocalId::new(raw_id)
    } else {
        LocalId::new(mapper.node_id(raw_id))
    }
}

/// Host-supplied id mapping.
///
/// Implementations must be deterministic and injective: the same raw id
/// always yields the same local id, and distinct raw ids never collide.
pub trait NodeIdMapper: Send + Sync {
    /// Maps a raw id to a local id.
    fn node_id(&self, raw_id: &str) -> String;
}

impl<F> NodeIdMapper for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn node_id(&self, raw_id: &str) -> String {
        self(raw_id)
    }
}

/// Default mapper: UUID v5 over a fixed namespace.
#[derive(Debug, Clone, Copy)]
pub struct UuidNodeIdMapper {
    namespace: Uuid,
}

impl UuidNodeIdMapper {
    /// Namespace used by [`UuidNodeIdMapper::default`].
    pub const DEFAULT_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_27d4_8a4e_5b0e_9d2a_3c57_e0f4_b812);

    /// Creates a mapper over a custom namespace.
    #[must_use]
    pub fn new(namespace: Uuid) -> Self {
        Self { namespace }
    }
}

impl Default for UuidNodeIdMapper {
    fn default() -> Self {
        Self::new(Self::DEFAULT_NAMESPACE)
    }
}

impl NodeIdMapper for UuidNodeIdMapper {
    fn node_id(&self, raw_id: &str) -> String {
        Uuid::new_v5(&self.namespace, raw_id.as_bytes()).to_string()
    }
}

/// Identifier of an output node in the host store.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    /// Wraps an already-mapped id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalId({})", self.0)
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LocalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<LocalId> for String {
    fn from(id: LocalId) -> Self {
        id.0
    }
}
