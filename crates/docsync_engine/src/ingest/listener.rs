//! Live listener with a coalescing window.
//!
//! Two tasks cooperate. The producer reads the event stream, stages every
//! mutation into the cache right away and forwards the entity's published
//! id. The consumer collects ids until the window after the first one
//! expires, then reconciles the batch once.

use crate::engine::{Change, SyncEngine};
use crate::error::MirrorResult;
use crate::node::NodeStore;
use crate::remote::{EventStream, RemoteSource};
use docsync_protocol::{ListenerEvent, MutationEvent, Transition};
use futures_util::StreamExt;
use std::collections::HashSet;
use std::mem;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// A running listener.
///
/// Dropping the handle stops the listener as well, but only
/// [`ListenerHandle::shutdown`] waits for the final batch.
#[derive(Debug)]
pub struct ListenerHandle {
    shutdown: watch::Sender<bool>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl ListenerHandle {
    /// Stops reading events, reconciles what is pending and waits for both
    /// tasks to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.producer.await {
            error!(error = %e, "listener producer panicked");
        }
        if let Err(e) = self.consumer.await {
            error!(error = %e, "listener consumer panicked");
        }
    }

    /// Returns true once both tasks have exited.
    pub fn is_finished(&self) -> bool {
        self.producer.is_finished() && self.consumer.is_finished()
    }
}

impl<R, S> SyncEngine<R, S>
where
    R: RemoteSource + 'static,
    S: NodeStore + 'static,
{
    /// Subscribes to live mutations and starts applying them in the
    /// background.
    pub async fn start_listener(self: &Arc<Self>) -> MirrorResult<ListenerHandle> {
        let events = self.call_remote("listen", || self.remote.listen()).await?;
        let (ids_tx, ids_rx) = mpsc::channel(self.config.listener_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let producer = tokio::spawn(Arc::clone(self).produce(events, ids_tx, shutdown_rx));
        let consumer = tokio::spawn(Arc::clone(self).consume(ids_rx));

        info!(
            dataset = %self.config.dataset,
            window = ?self.config.listener_window,
            "listener started"
        );
        Ok(ListenerHandle {
            shutdown: shutdown_tx,
            producer,
            consumer,
        })
    }

    async fn produce(
        self: Arc<Self>,
        mut events: EventStream,
        ids: mpsc::Sender<String>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("listener shutting down");
                    break;
                }
                event = events.next() => match event {
                    Some(Ok(ListenerEvent::Mutation(mutation))) => {
                        let Some(change) = change_for(mutation) else {
                            continue;
                        };
                        if let Some(id) = self.stage(change) {
                            if ids.send(id).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(ListenerEvent::Welcome)) => debug!("listener connected"),
                    Some(Ok(ListenerEvent::Reconnect)) => {
                        warn!("listener asked to reconnect, events may be lost; resyncing");
                        if let Err(e) = self.full_resync().await {
                            error!(error = %e, "resync after reconnect failed");
                        }
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "listener stream failed");
                        break;
                    }
                    None => {
                        info!("listener stream ended");
                        break;
                    }
                }
            }
        }
    }

    async fn consume(self: Arc<Self>, mut ids: mpsc::Receiver<String>) {
        let window = self.config.listener_window;
        let mut batch = Batch::default();
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                received = ids.recv() => match received {
                    Some(id) => {
                        batch.push(id);
                        deadline.get_or_insert_with(|| Instant::now() + window);
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.flush(batch.take());
                }
            }
        }
        self.flush(batch.take());
    }

    fn flush(&self, ids: Vec<String>) {
        if ids.is_empty() {
            return;
        }
        match self.reconcile_ids(&ids) {
            Ok(report) => {
                self.update_stats(|stats| stats.listener_batches += 1);
                debug!(
                    entities = ids.len(),
                    created = report.created,
                    updated = report.updated,
                    deleted = report.deleted,
                    "listener batch reconciled"
                );
            }
            Err(e) => error!(error = %e, entities = ids.len(), "listener batch failed"),
        }
    }
}

fn change_for(mutation: MutationEvent) -> Option<Change> {
    match (mutation.transition, mutation.result) {
        (Transition::Disappear, _) => Some(Change::Remove(mutation.document_id)),
        (_, Some(doc)) => Some(Change::Upsert(doc)),
        (transition, None) => {
            warn!(id = %mutation.document_id, ?transition, "mutation without a document");
            None
        }
    }
}

/// Published ids in first-seen order, without duplicates.
#[derive(Debug, Default)]
struct Batch {
    ids: Vec<String>,
    seen: HashSet<String>,
}

impl Batch {
    fn push(&mut self, id: String) {
        if self.seen.insert(id.clone()) {
            self.ids.push(id);
        }
    }

    fn take(&mut self) -> Vec<String> {
        self.seen.clear();
        mem::take(&mut self.ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MirrorConfig;
    use crate::node::MemoryNodeStore;
    use crate::remote::MockRemote;
    use docsync_testkit::{draft_post, post, sample_type_map, SAMPLE_SDL};
    use std::time::Duration;

    fn engine(overlay: bool) -> Arc<SyncEngine<MockRemote, MemoryNodeStore>> {
        Arc::new(SyncEngine::new(
            MirrorConfig::new("p", "production").with_overlay_drafts(overlay),
            MockRemote::with_schema(SAMPLE_SDL),
            MemoryNodeStore::new(),
            sample_type_map(),
        ))
    }

    fn appear(doc: docsync_protocol::Document) -> ListenerEvent {
        ListenerEvent::Mutation(MutationEvent {
            document_id: doc.id.clone(),
            result: Some(doc),
            transition: Transition::Appear,
        })
    }

    fn disappear(id: &str) -> ListenerEvent {
        ListenerEvent::Mutation(MutationEvent {
            document_id: id.to_string(),
            result: None,
            transition: Transition::Disappear,
        })
    }

    #[test]
    fn batch_dedups_in_order() {
        let mut batch = Batch::default();
        for id in ["b", "a", "b", "c", "a"] {
            batch.push(id.to_string());
        }
        assert_eq!(batch.take(), vec!["b", "a", "c"]);
        assert!(batch.take().is_empty());
        batch.push("b".into());
        assert_eq!(batch.take(), vec!["b"]);
    }

    #[test]
    fn disappear_removes_regardless_of_result() {
        let event = MutationEvent {
            document_id: "p1".into(),
            result: Some(post("p1", "stale")),
            transition: Transition::Disappear,
        };
        assert_eq!(change_for(event), Some(Change::Remove("p1".into())));

        let empty = MutationEvent {
            document_id: "p1".into(),
            result: None,
            transition: Transition::Update,
        };
        assert_eq!(change_for(empty), None);
    }

    #[tokio::test(start_paused = true)]
    async fn events_coalesce_within_the_window() {
        let engine = engine(true);
        let handle = engine.start_listener().await.unwrap();

        engine.remote().push_event(ListenerEvent::Welcome);
        engine.remote().push_event(appear(post("p1", "One")));
        engine.remote().push_event(appear(draft_post("p1", "One draft")));
        engine.remote().push_event(appear(post("p2", "Two")));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.store().is_empty());
        assert_eq!(engine.cached_documents(), 3);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(engine.store().len(), 2);
        assert_eq!(engine.store().write_count(), 2);
        assert_eq!(
            engine.store().node_for("p1").unwrap().content["title"],
            "One draft"
        );
        assert_eq!(engine.stats().listener_batches, 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn later_events_start_a_new_window() {
        let engine = engine(false);
        let handle = engine.start_listener().await.unwrap();

        engine.remote().push_event(appear(post("p1", "One")));
        tokio::time::sleep(Duration::from_millis(150)).await;
        engine.remote().push_event(disappear("p1"));
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(engine.store().is_empty());
        assert_eq!(engine.stats().listener_batches, 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_pending_batch() {
        let engine = engine(false);
        let handle = engine.start_listener().await.unwrap();

        engine.remote().push_event(appear(post("p1", "One")));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(engine.store().is_empty());

        handle.shutdown().await;
        assert_eq!(engine.store().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stream_end_stops_both_tasks() {
        let engine = engine(false);
        let handle = engine.start_listener().await.unwrap();

        engine.remote().push_event(appear(post("p1", "One")));
        engine.remote().close_subscriptions();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(handle.is_finished());
        assert_eq!(engine.store().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_triggers_resync() {
        let engine = engine(false);
        engine.remote().put(post("p9", "missed"));
        let handle = engine.start_listener().await.unwrap();

        engine.remote().push_event(ListenerEvent::Reconnect);
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(engine.store().node_for("p9").is_some());
        assert_eq!(engine.stats().resyncs, 1);
        handle.shutdown().await;
    }
}
