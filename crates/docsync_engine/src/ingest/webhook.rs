//! Webhook handling.

use crate::engine::{Change, SyncEngine};
use crate::error::{MirrorError, MirrorResult};
use crate::node::NodeStore;
use crate::reconcile::ReconcileReport;
use crate::remote::RemoteSource;
use docsync_protocol::{V1Ids, V2Event, WebhookPayload};
use serde_json::Value;
use tracing::{debug, info, warn};

/// What happened to a webhook body.
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// The payload was applied.
    Handled(ReconcileReport),
    /// The payload was not recognized and nothing changed.
    NotHandled(String),
}

impl WebhookOutcome {
    /// Returns true if the payload was applied.
    pub fn is_handled(&self) -> bool {
        matches!(self, WebhookOutcome::Handled(_))
    }
}

impl<R: RemoteSource, S: NodeStore> SyncEngine<R, S> {
    /// Applies a webhook body.
    ///
    /// v1 bodies only list ids, so created and updated documents are
    /// refetched; an id the remote no longer knows is treated as deleted.
    /// v2 bodies carry the document and are applied directly. Anything else
    /// is ignored and reported as not handled.
    pub async fn handle_webhook(&self, body: &Value) -> MirrorResult<WebhookOutcome> {
        let changes = match WebhookPayload::decode(body) {
            WebhookPayload::V1(ids) => self.v1_changes(&ids).await?,
            WebhookPayload::V2(V2Event::Upsert {
                operation,
                document,
            }) => {
                debug!(id = %document.id, ?operation, "v2 webhook");
                vec![Change::Upsert(document)]
            }
            WebhookPayload::V2(V2Event::Delete { document_id }) => {
                debug!(id = %document_id, "v2 webhook delete");
                vec![Change::Remove(document_id)]
            }
            WebhookPayload::Unrecognized(reason) => {
                warn!(%reason, "ignoring webhook");
                self.update_stats(|stats| stats.webhooks_ignored += 1);
                return Ok(WebhookOutcome::NotHandled(reason));
            }
        };

        let report = self.apply(changes)?;
        self.update_stats(|stats| stats.webhooks_handled += 1);
        info!(
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            "webhook applied"
        );
        Ok(WebhookOutcome::Handled(report))
    }

    async fn v1_changes(&self, ids: &V1Ids) -> MirrorResult<Vec<Change>> {
        let mut changes: Vec<Change> = ids.deleted.iter().cloned().map(Change::Remove).collect();

        let refetch: Vec<String> = ids.changed().map(str::to_string).collect();
        if refetch.is_empty() {
            return Ok(changes);
        }
        let fetched = self
            .call_remote("get_documents", || self.remote.get_documents(&refetch))
            .await?;
        if fetched.len() != refetch.len() {
            return Err(MirrorError::transport_fatal(format!(
                "asked for {} documents, remote answered with {}",
                refetch.len(),
                fetched.len()
            )));
        }

        for (id, doc) in refetch.into_iter().zip(fetched) {
            changes.push(match doc {
                Some(doc) => Change::Upsert(doc),
                None => {
                    debug!(%id, "listed document no longer exists");
                    Change::Remove(id)
                }
            });
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MirrorConfig;
    use crate::node::MemoryNodeStore;
    use crate::remote::MockRemote;
    use docsync_testkit::{draft_post, post, sample_type_map, SAMPLE_SDL};
    use serde_json::json;

    fn engine(overlay: bool) -> SyncEngine<MockRemote, MemoryNodeStore> {
        SyncEngine::new(
            MirrorConfig::new("p", "production").with_overlay_drafts(overlay),
            MockRemote::with_schema(SAMPLE_SDL),
            MemoryNodeStore::new(),
            sample_type_map(),
        )
    }

    fn v1(created: &[&str], updated: &[&str], deleted: &[&str]) -> Value {
        json!({"ids": {"created": created, "updated": updated, "deleted": deleted}})
    }

    #[tokio::test]
    async fn v1_refetches_listed_documents() {
        let engine = engine(false);
        engine.remote().put(post("p1", "One"));
        engine.remote().put(post("p2", "Two"));

        let outcome = engine
            .handle_webhook(&v1(&["p1"], &["p2"], &[]))
            .await
            .unwrap();

        let WebhookOutcome::Handled(report) = outcome else {
            panic!("expected handled");
        };
        assert_eq!(report.created, 2);
        assert_eq!(engine.stats().webhooks_handled, 1);
    }

    #[tokio::test]
    async fn v1_deletes_and_missing_documents() {
        let engine = engine(false);
        engine.remote().put(post("x", "X"));
        engine.remote().put(post("y", "Y"));
        engine.full_resync().await.unwrap();

        engine.remote().remove("x");
        engine.remote().remove("y");
        let outcome = engine
            .handle_webhook(&v1(&[], &["y"], &["x"]))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            WebhookOutcome::Handled(ReconcileReport {
                deleted: 2,
                ..ReconcileReport::default()
            })
        );
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn v2_carries_the_document() {
        let engine = engine(true);
        let body = json!({
            "__webhooksVersion": "v2",
            "operation": "create",
            "documentId": "drafts.p1",
            "after": draft_post("p1", "Draft").to_value(),
        });

        let outcome = engine.handle_webhook(&body).await.unwrap();

        assert!(outcome.is_handled());
        assert_eq!(engine.remote().call_count(), 0);
        assert_eq!(engine.store().node_for("p1").unwrap().content["title"], "Draft");

        let delete = json!({
            "__webhooksVersion": "v2",
            "operation": "delete",
            "documentId": "drafts.p1",
        });
        engine.handle_webhook(&delete).await.unwrap();
        assert!(engine.store().is_empty());
    }

    #[tokio::test]
    async fn unrecognized_bodies_change_nothing() {
        let engine = engine(false);
        for body in [json!([1, 2]), json!({"hello": "world"}), json!({"__webhooksVersion": "v9"})] {
            let outcome = engine.handle_webhook(&body).await.unwrap();
            assert!(matches!(outcome, WebhookOutcome::NotHandled(_)));
        }
        let stats = engine.stats();
        assert_eq!(stats.webhooks_ignored, 3);
        assert_eq!(stats.webhooks_handled, 0);
    }

    #[tokio::test]
    async fn refetch_failure_is_an_error() {
        let engine = SyncEngine::new(
            MirrorConfig::new("p", "production").with_retry(crate::config::RetryConfig::no_retry()),
            MockRemote::with_schema(SAMPLE_SDL),
            MemoryNodeStore::new(),
            sample_type_map(),
        );
        engine.remote().fail_next(1);

        let result = engine.handle_webhook(&v1(&["p1"], &[], &[])).await;

        assert!(result.unwrap_err().is_retryable());
        assert!(engine.stats().last_error.is_some());
    }

    /// Answers every lookup with at most one document.
    struct TruncatingRemote(MockRemote);

    #[async_trait::async_trait]
    impl RemoteSource for TruncatingRemote {
        async fn fetch_schema(&self) -> MirrorResult<String> {
            self.0.fetch_schema().await
        }

        async fn export_documents(&self) -> MirrorResult<crate::remote::DocumentStream> {
            self.0.export_documents().await
        }

        async fn changed_since(
            &self,
            since: chrono::DateTime<chrono::Utc>,
        ) -> MirrorResult<Vec<docsync_protocol::Document>> {
            self.0.changed_since(since).await
        }

        async fn get_documents(
            &self,
            ids: &[String],
        ) -> MirrorResult<Vec<Option<docsync_protocol::Document>>> {
            let mut found = self.0.get_documents(ids).await?;
            found.truncate(1);
            Ok(found)
        }

        async fn listen(&self) -> MirrorResult<crate::remote::EventStream> {
            self.0.listen().await
        }
    }

    #[tokio::test]
    async fn short_refetch_answer_is_an_error() {
        let remote = MockRemote::with_schema(SAMPLE_SDL);
        remote.put(post("p1", "One"));
        remote.put(post("p2", "Two"));
        let engine = SyncEngine::new(
            MirrorConfig::new("p", "production"),
            TruncatingRemote(remote),
            MemoryNodeStore::new(),
            sample_type_map(),
        );

        let result = engine.handle_webhook(&v1(&["p1", "p2"], &[], &[])).await;

        assert!(matches!(
            result,
            Err(MirrorError::Transport { retryable: false, .. })
        ));
        assert!(engine.store().is_empty());
        assert_eq!(engine.stats().webhooks_handled, 0);
    }
}
