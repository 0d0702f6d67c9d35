//! # docsync Engine
//!
//! Mirrors a remote document dataset into a host's node graph.
//!
//! This crate provides:
//! - A document cache keyed by raw id
//! - Node building with reference rewriting and raw-data aliases
//! - Reconciliation with optional draft overlay
//! - Runtime reference resolution with a depth bound
//! - Ingestion by full resync, delta poll, webhook and live listener
//! - Retry with exponential backoff for remote calls
//!
//! ## Architecture
//!
//! Every ingestion path stages changes into the cache and then reconciles
//! the touched entities:
//! 1. Stage: upsert or remove raw documents
//! 2. Reconcile: compute each entity's desired node and write the difference
//! 3. Resolve: expand references at query time, never at build time
//!
//! ## Key Invariants
//!
//! - At most one node per logical entity, keyed by its published id
//! - Reconciling an unchanged entity writes nothing
//! - All cache writes and reconciliation happen under one lock
//! - Live events coalesce for a fixed window before reconciling

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod engine;
mod error;
mod ingest;
mod node;
mod reconcile;
mod remote;
mod resolve;
mod rewrite;

pub use cache::{DocumentCache, EntityView};
pub use config::{MirrorConfig, RetryConfig};
pub use engine::{load_schema, Change, MirrorStats, SyncEngine};
pub use error::{AuthFailure, MirrorError, MirrorResult};
pub use ingest::{ListenerHandle, WebhookOutcome};
pub use node::{
    MemoryNodeStore, MemorySchemaRegistrar, NodeLookup, NodeSource, NodeStore, OutputNode,
    SchemaRegistrar,
};
pub use reconcile::{
    MaterializedEntry, MaterializedMap, ReconcileOutcome, ReconcileReport, Reconciler,
    SkipReason, SkippedDocument,
};
pub use remote::{DocumentStream, EventStream, ExportFileSource, MockRemote, RemoteSource};
pub use resolve::{Resolution, Resolver};
pub use rewrite::{rewrite_references, NodeBuilder};
