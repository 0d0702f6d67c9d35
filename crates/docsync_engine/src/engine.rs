//! The mirror service.
//!
//! One [`SyncEngine`] owns the document cache and the materialized map of a
//! dataset. Every change channel funnels through [`SyncEngine::apply`], so
//! cache writes and reconciliation happen under a single lock and never
//! interleave.

use crate::cache::DocumentCache;
use crate::config::MirrorConfig;
use crate::error::{MirrorError, MirrorResult};
use crate::node::{NodeStore, OutputNode, SchemaRegistrar};
use crate::reconcile::{MaterializedMap, ReconcileReport, Reconciler};
use crate::remote::RemoteSource;
use crate::resolve::{Resolution, Resolver};
use chrono::{DateTime, Utc};
use docsync_protocol::id::{is_system_id, published_id_of};
use docsync_protocol::{Document, LocalId, NodeIdMapper, UuidNodeIdMapper};
use docsync_schema::{parse_schema, raw_data_field_name, rewrite_schema, SchemaError, TypeMap};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A change to the document cache.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Store a document.
    Upsert(Document),
    /// Remove the document with this raw id.
    Remove(String),
}

impl Change {
    /// Raw id of the document the change touches.
    pub fn raw_id(&self) -> &str {
        match self {
            Change::Upsert(doc) => &doc.id,
            Change::Remove(id) => id,
        }
    }
}

/// Counters kept across cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorStats {
    /// Completed full resyncs.
    pub resyncs: u64,
    /// Completed delta polls.
    pub polls: u64,
    /// Webhooks applied.
    pub webhooks_handled: u64,
    /// Webhooks ignored as unrecognized.
    pub webhooks_ignored: u64,
    /// Listener batches reconciled.
    pub listener_batches: u64,
    /// Nodes created.
    pub nodes_created: u64,
    /// Nodes replaced.
    pub nodes_updated: u64,
    /// Nodes deleted.
    pub nodes_deleted: u64,
    /// Documents skipped.
    pub documents_skipped: u64,
    /// Remote calls retried.
    pub retries: u64,
    /// Last error message.
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub(crate) cache: DocumentCache,
    pub(crate) materialized: MaterializedMap,
    /// Sequence number of the last staged change.
    staged: u64,
    /// Full resyncs currently streaming an export.
    resyncs_running: usize,
    /// Raw ids staged while a resync was running, with their sequence number.
    touched: HashMap<String, u64>,
}

impl EngineState {
    fn record_staged(&mut self, raw_id: &str) {
        self.staged += 1;
        if self.resyncs_running > 0 {
            self.touched.insert(raw_id.to_string(), self.staged);
        }
    }
}

/// Marks a full resync as running until dropped.
///
/// Changes staged while it is alive survive the cache swap at the end of
/// the resync.
pub(crate) struct ResyncGuard<'e> {
    state: &'e Mutex<EngineState>,
    since: u64,
}

impl Drop for ResyncGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.resyncs_running -= 1;
        if state.resyncs_running == 0 {
            state.touched.clear();
        }
    }
}

/// Parses a remote schema into its type map and the rewritten host SDL.
pub fn load_schema(sdl: &str, prefix: &str) -> MirrorResult<(TypeMap, String)> {
    let doc = parse_schema(sdl)?;
    let type_map = TypeMap::from_schema(&doc, prefix)?;
    let host_sdl = rewrite_schema(&doc, &type_map).to_string();
    Ok((type_map, host_sdl))
}

/// Runs a remote call under the configured timeout, retrying retryable
/// failures with backoff. Returns the result and the number of retries.
pub(crate) async fn with_retry<T, F, Fut>(
    config: &MirrorConfig,
    operation: &'static str,
    mut call: F,
) -> (MirrorResult<T>, u64)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MirrorResult<T>>,
{
    let retry = &config.retry;
    let mut attempt = 0u32;
    loop {
        let result = match tokio::time::timeout(config.request_timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(MirrorError::Timeout),
        };
        match result {
            Err(e) if e.is_retryable() && attempt + 1 < retry.max_attempts => {
                attempt += 1;
                let delay = retry.delay_for_attempt(attempt);
                warn!(operation, attempt, error = %e, ?delay, "remote call failed, retrying");
                tokio::time::sleep(delay).await;
            }
            result => return (result, u64::from(attempt)),
        }
    }
}

/// The mirror engine for one dataset.
pub struct SyncEngine<R: RemoteSource, S: NodeStore> {
    pub(crate) config: MirrorConfig,
    pub(crate) remote: Arc<R>,
    store: Arc<S>,
    reconciler: Reconciler,
    resolver: Resolver,
    pub(crate) state: Mutex<EngineState>,
    stats: RwLock<MirrorStats>,
    last_build: RwLock<Option<DateTime<Utc>>>,
}

impl<R: RemoteSource, S: NodeStore> SyncEngine<R, S> {
    /// Creates an engine over an already built type map.
    pub fn new(config: MirrorConfig, remote: R, store: S, type_map: TypeMap) -> Self {
        let mapper: Arc<dyn NodeIdMapper> = Arc::new(UuidNodeIdMapper::default());
        Self {
            reconciler: Reconciler::new(Arc::new(type_map), mapper.clone(), config.overlay_drafts),
            resolver: Resolver::new(mapper, config.max_resolve_depth, config.overlay_drafts),
            config,
            remote: Arc::new(remote),
            store: Arc::new(store),
            state: Mutex::new(EngineState::default()),
            stats: RwLock::new(MirrorStats::default()),
            last_build: RwLock::new(None),
        }
    }

    /// Fetches and rewrites the remote schema, registers it with the host
    /// and creates the engine.
    pub async fn bootstrap(
        config: MirrorConfig,
        remote: R,
        store: S,
        registrar: &dyn SchemaRegistrar,
    ) -> MirrorResult<Self> {
        config.validate()?;

        let (sdl, _) = with_retry(&config, "fetch_schema", || remote.fetch_schema()).await;
        let (type_map, host_sdl) = match load_schema(&sdl?, &config.type_prefix) {
            Err(MirrorError::Schema(SchemaError::Empty)) => {
                return Err(MirrorError::schema_unavailable(
                    &config.dataset,
                    &config.graphql_tag,
                ))
            }
            other => other?,
        };
        registrar.register_types(&host_sdl)?;

        info!(
            dataset = %config.dataset,
            types = type_map.objects().count(),
            "registered schema"
        );
        Ok(Self::new(config, remote, store, type_map))
    }

    /// Replaces the id mapper.
    ///
    /// Must be called before anything is materialized.
    pub fn with_id_mapper(mut self, mapper: Arc<dyn NodeIdMapper>) -> Self {
        self.reconciler = Reconciler::new(
            Arc::new(self.reconciler.type_map().clone()),
            mapper.clone(),
            self.config.overlay_drafts,
        );
        self.resolver = Resolver::new(mapper, self.config.max_resolve_depth, self.config.overlay_drafts);
        self
    }

    /// The configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// The type map.
    pub fn type_map(&self) -> &TypeMap {
        self.reconciler.type_map()
    }

    /// The remote source.
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The node store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current statistics.
    pub fn stats(&self) -> MirrorStats {
        self.stats.read().clone()
    }

    /// Start time of the last successful build or poll.
    pub fn last_build(&self) -> Option<DateTime<Utc>> {
        *self.last_build.read()
    }

    pub(crate) fn set_last_build(&self, at: DateTime<Utc>) {
        *self.last_build.write() = Some(at);
    }

    /// Number of cached documents.
    pub fn cached_documents(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Published ids that currently have a node, sorted.
    pub fn materialized_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().materialized.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Applies changes to the cache and reconciles every touched entity
    /// once, in first-seen order.
    pub fn apply(&self, changes: impl IntoIterator<Item = Change>) -> MirrorResult<ReconcileReport> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let mut seen = HashSet::new();
        let mut ids = Vec::new();
        for change in changes {
            if let Some(id) = self.stage_locked(state, change) {
                if seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
        }

        let result = self.reconciler.reconcile_all(
            ids.iter().map(String::as_str),
            &state.cache,
            &mut state.materialized,
            self.store.as_ref(),
        );
        drop(guard);
        self.finish(result)
    }

    /// Reconciles entities without changing the cache.
    pub fn reconcile_ids(&self, published_ids: &[String]) -> MirrorResult<ReconcileReport> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let result = self.reconciler.reconcile_all(
            published_ids.iter().map(|id| published_id_of(id)),
            &state.cache,
            &mut state.materialized,
            self.store.as_ref(),
        );
        drop(guard);
        self.finish(result)
    }

    /// Stages a single change into the cache without reconciling.
    ///
    /// Returns the published id to reconcile, or `None` if the change was
    /// dropped.
    pub(crate) fn stage(&self, change: Change) -> Option<String> {
        let mut state = self.state.lock();
        self.stage_locked(&mut state, change)
    }

    pub(crate) fn stage_locked(&self, state: &mut EngineState, change: Change) -> Option<String> {
        match change {
            Change::Upsert(doc) => {
                if !self.admits(&doc) {
                    return None;
                }
                let published = doc.published_id().to_string();
                state.record_staged(&doc.id);
                state.cache.upsert(doc);
                Some(published)
            }
            Change::Remove(raw_id) => {
                if is_system_id(&raw_id) {
                    return None;
                }
                state.record_staged(&raw_id);
                state.cache.remove(&raw_id);
                Some(published_id_of(&raw_id).to_string())
            }
        }
    }

    /// Returns true if the document belongs in the cache.
    pub(crate) fn admits(&self, doc: &Document) -> bool {
        if doc.is_system() {
            debug!(id = %doc.id, "ignoring system document");
            return false;
        }
        if doc.is_draft() && !self.config.overlay_drafts {
            debug!(id = %doc.id, "ignoring draft, overlay is off");
            return false;
        }
        true
    }

    /// Starts tracking changes staged while a full resync streams its
    /// export.
    pub(crate) fn begin_resync(&self) -> ResyncGuard<'_> {
        let mut state = self.state.lock();
        state.resyncs_running += 1;
        ResyncGuard {
            state: &self.state,
            since: state.staged,
        }
    }

    /// Replaces the whole cache and reconciles every entity that is cached
    /// or materialized.
    ///
    /// Documents staged after `resync` began are newer than the export, so
    /// their live cache entries replace whatever the export holds for them.
    pub(crate) fn replace_cache(
        &self,
        mut cache: DocumentCache,
        mut report: ReconcileReport,
        resync: &ResyncGuard<'_>,
    ) -> MirrorResult<ReconcileReport> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        for (raw_id, _) in state.touched.iter().filter(|(_, seq)| **seq > resync.since) {
            debug!(id = %raw_id, "keeping change staged during resync");
            match state.cache.get(raw_id) {
                Some(doc) => {
                    cache.upsert(doc.clone());
                }
                None => {
                    cache.remove(raw_id);
                }
            }
        }
        let mut ids = cache.published_ids();
        ids.extend(state.materialized.keys().cloned());
        state.cache = cache;

        let result = self
            .reconciler
            .reconcile_all(
                ids.iter().map(String::as_str),
                &state.cache,
                &mut state.materialized,
                self.store.as_ref(),
            )
            .map(|reconciled| {
                report.merge(reconciled);
                report
            });
        drop(guard);
        self.finish(result)
    }

    fn finish(&self, result: MirrorResult<ReconcileReport>) -> MirrorResult<ReconcileReport> {
        let mut stats = self.stats.write();
        match &result {
            Ok(report) => {
                stats.nodes_created += report.created;
                stats.nodes_updated += report.updated;
                stats.nodes_deleted += report.deleted;
                stats.documents_skipped += report.skipped.len() as u64;
            }
            Err(e) => stats.last_error = Some(e.to_string()),
        }
        result
    }

    pub(crate) fn update_stats(&self, update: impl FnOnce(&mut MirrorStats)) {
        update(&mut self.stats.write());
    }

    /// Runs a remote call with timeout and retries, recording both.
    pub(crate) async fn call_remote<T, F, Fut>(
        &self,
        operation: &'static str,
        call: F,
    ) -> MirrorResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = MirrorResult<T>>,
    {
        let (result, retries) = with_retry(&self.config, operation, call).await;
        let mut stats = self.stats.write();
        stats.retries += retries;
        if let Err(e) = &result {
            stats.last_error = Some(e.to_string());
        }
        result
    }

    /// Resolves references in a value with the default depth bound.
    pub fn resolve(&self, value: &Value) -> Value {
        self.resolver.resolve(value, self.store.as_ref())
    }

    /// Resolves references in a value with an explicit depth bound.
    pub fn resolve_with_depth(&self, value: &Value, max_depth: usize) -> Resolution {
        self.resolver
            .resolve_bounded(value, self.store.as_ref(), max_depth)
    }

    /// Returns a node's content with references resolved.
    pub fn resolve_node(&self, id: &LocalId) -> Option<Value> {
        let node: OutputNode = self.store.get_node(id)?;
        Some(self.resolve(&Value::Object(node.content)))
    }

    /// Resolves the raw value of a field of a node, as served by the
    /// `_raw<Field>(resolveReferences: {maxDepth})` schema field.
    ///
    /// Without a depth the raw value is returned unresolved.
    pub fn resolve_raw_field(
        &self,
        id: &LocalId,
        field: &str,
        max_depth: Option<usize>,
    ) -> Option<Value> {
        let node = self.store.get_node(id)?;
        let raw = node.content.get(&raw_data_field_name(field))?;
        Some(match max_depth {
            Some(depth) => self.resolve_with_depth(raw, depth).value,
            None => raw.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::node::{MemoryNodeStore, MemorySchemaRegistrar};
    use crate::remote::MockRemote;
    use docsync_testkit::{draft_post, post, sample_type_map, SAMPLE_SDL};
    use std::time::Duration;

    fn engine(overlay: bool) -> SyncEngine<MockRemote, MemoryNodeStore> {
        SyncEngine::new(
            MirrorConfig::new("p", "production").with_overlay_drafts(overlay),
            MockRemote::with_schema(SAMPLE_SDL),
            MemoryNodeStore::new(),
            sample_type_map(),
        )
    }

    #[test]
    fn apply_dedups_in_first_seen_order() {
        let engine = engine(true);
        let report = engine
            .apply([
                Change::Upsert(post("b", "B")),
                Change::Upsert(post("a", "A")),
                Change::Upsert(draft_post("b", "B2")),
            ])
            .unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(engine.store().len(), 2);
        assert_eq!(
            engine.store().node_for("b").unwrap().content["title"],
            "B2"
        );
        assert_eq!(engine.stats().nodes_created, 2);
    }

    #[test]
    fn system_documents_and_drafts_filtered() {
        let engine = engine(false);
        let report = engine
            .apply([
                Change::Upsert(Document::new("_.groups.public", "system.group")),
                Change::Upsert(draft_post("a", "draft")),
            ])
            .unwrap();

        assert_eq!(report, ReconcileReport::default());
        assert_eq!(engine.cached_documents(), 0);
    }

    #[test]
    fn raw_field_resolution() {
        let engine = engine(false);
        engine
            .apply([
                Change::Upsert(docsync_testkit::author("author-1", "Ada")),
                Change::Upsert(
                    docsync_testkit::DocumentBuilder::new("post-1", "post")
                        .reference("author", "author-1")
                        .build(),
                ),
            ])
            .unwrap();

        let node = engine.store().node_for("post-1").unwrap();
        let raw = engine.resolve_raw_field(&node.id, "author", None).unwrap();
        assert_eq!(raw["_ref"], "author-1");

        let resolved = engine
            .resolve_raw_field(&node.id, "author", Some(3))
            .unwrap();
        assert_eq!(resolved["name"], "Ada");

        assert!(engine.resolve_raw_field(&node.id, "title", Some(3)).is_none());
    }

    #[tokio::test]
    async fn bootstrap_registers_rewritten_schema() {
        let registrar = MemorySchemaRegistrar::new();
        let engine = SyncEngine::bootstrap(
            MirrorConfig::new("p", "production"),
            MockRemote::with_schema(SAMPLE_SDL),
            MemoryNodeStore::new(),
            &registrar,
        )
        .await
        .unwrap();

        assert!(engine.type_map().object("SanityPost").is_some());
        let registered = registrar.registered();
        assert_eq!(registered.len(), 1);
        assert!(registered[0].contains("type SanityPost implements SanityDocument & Node @dontInfer"));
    }

    #[tokio::test]
    async fn bootstrap_without_schema_explains_how_to_deploy() {
        let registrar = MemorySchemaRegistrar::new();
        let result = SyncEngine::bootstrap(
            MirrorConfig::new("p", "production"),
            MockRemote::new(),
            MemoryNodeStore::new(),
            &registrar,
        )
        .await;

        let Err(MirrorError::SchemaUnavailable { hint }) = result else {
            panic!("expected missing schema");
        };
        assert!(hint.contains("graphql deploy"));
        assert!(registrar.registered().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_rejects_invalid_config() {
        let result = SyncEngine::bootstrap(
            MirrorConfig::new("", "production"),
            MockRemote::with_schema(SAMPLE_SDL),
            MemoryNodeStore::new(),
            &MemorySchemaRegistrar::new(),
        )
        .await;
        assert!(matches!(result, Err(MirrorError::Config(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures() {
        let remote = MockRemote::with_schema(SAMPLE_SDL);
        remote.fail_next(2);
        let config = MirrorConfig::new("p", "production")
            .with_retry(RetryConfig::new(3).with_initial_delay(Duration::from_millis(10)));

        let (result, retries) = with_retry(&config, "fetch_schema", || remote.fetch_schema()).await;
        assert!(result.is_ok());
        assert_eq!(retries, 2);
        assert_eq!(remote.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let remote = MockRemote::with_schema(SAMPLE_SDL);
        remote.fail_next(5);
        let config = MirrorConfig::new("p", "production").with_retry(RetryConfig::new(2));

        let (result, _) = with_retry(&config, "fetch_schema", || remote.fetch_schema()).await;
        assert!(result.unwrap_err().is_retryable());
        assert_eq!(remote.call_count(), 2);
    }
}
