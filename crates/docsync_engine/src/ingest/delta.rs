//! Delta polling by modification time.

use crate::engine::{Change, SyncEngine};
use crate::error::MirrorResult;
use crate::node::NodeStore;
use crate::reconcile::ReconcileReport;
use crate::remote::RemoteSource;
use chrono::Utc;
use tracing::{debug, info};

impl<R: RemoteSource, S: NodeStore> SyncEngine<R, S> {
    /// Applies documents modified since the last build.
    ///
    /// Without a previous build this is a full resync. A poll cannot see
    /// deletions; those arrive through webhooks, the listener or the next
    /// full resync.
    pub async fn poll_changes(&self) -> MirrorResult<ReconcileReport> {
        let Some(since) = self.last_build() else {
            debug!("no previous build, falling back to full resync");
            return self.full_resync().await;
        };

        let started = Utc::now();
        let changed = self
            .call_remote("changed_since", || self.remote.changed_since(since))
            .await?;
        let fetched = changed.len();

        let report = self.apply(changed.into_iter().map(Change::Upsert))?;
        self.set_last_build(started);
        self.update_stats(|stats| stats.polls += 1);

        info!(
            since = %since,
            fetched,
            created = report.created,
            updated = report.updated,
            "delta poll complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MirrorConfig;
    use crate::engine::SyncEngine;
    use crate::node::MemoryNodeStore;
    use crate::remote::MockRemote;
    use chrono::{Duration, Utc};
    use docsync_testkit::{post, sample_type_map, DocumentBuilder, SAMPLE_SDL};

    fn engine() -> SyncEngine<MockRemote, MemoryNodeStore> {
        SyncEngine::new(
            MirrorConfig::new("p", "production"),
            MockRemote::with_schema(SAMPLE_SDL),
            MemoryNodeStore::new(),
            sample_type_map(),
        )
    }

    #[tokio::test]
    async fn first_poll_is_a_full_resync() {
        let engine = engine();
        engine.remote().put(post("p1", "One"));

        let report = engine.poll_changes().await.unwrap();

        assert_eq!(report.created, 1);
        let stats = engine.stats();
        assert_eq!(stats.resyncs, 1);
        assert_eq!(stats.polls, 0);
    }

    #[tokio::test]
    async fn later_polls_fetch_only_recent_changes() {
        let engine = engine();
        // fixed_time is far in the past, so these are older than any build
        engine.remote().put(post("p1", "One"));
        engine.full_resync().await.unwrap();
        let calls = engine.remote().call_count();

        engine.remote().put(
            DocumentBuilder::new("p2", "post")
                .field("title", "Two")
                .updated_at(Utc::now() + Duration::minutes(1))
                .build(),
        );
        let report = engine.poll_changes().await.unwrap();

        assert_eq!(report.created, 1);
        assert_eq!(report.unchanged, 0);
        assert_eq!(engine.store().len(), 2);
        assert_eq!(engine.stats().polls, 1);
        assert_eq!(engine.remote().call_count(), calls + 1);
    }

    #[tokio::test]
    async fn deletions_are_not_seen() {
        let engine = engine();
        engine.remote().put(post("p1", "One"));
        engine.full_resync().await.unwrap();

        engine.remote().remove("p1");
        let report = engine.poll_changes().await.unwrap();

        assert_eq!(report.deleted, 0);
        assert!(engine.store().node_for("p1").is_some());
    }
}
