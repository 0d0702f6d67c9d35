//! Full resync from the dataset export.

use crate::cache::DocumentCache;
use crate::engine::SyncEngine;
use crate::error::{MirrorError, MirrorResult};
use crate::node::NodeStore;
use crate::reconcile::{ReconcileReport, SkipReason};
use crate::remote::RemoteSource;
use chrono::Utc;
use futures_util::StreamExt;
use tracing::{info, warn};

impl<R: RemoteSource, S: NodeStore> SyncEngine<R, S> {
    /// Rebuilds the cache from a full export and reconciles every entity.
    ///
    /// Entities missing from the export lose their nodes. Lines that fail to
    /// decode are reported as skipped; any other stream error aborts the
    /// resync and leaves the previous cache in place. Changes applied while
    /// the export streams are kept over the exported versions.
    pub async fn full_resync(&self) -> MirrorResult<ReconcileReport> {
        let started = Utc::now();
        let resync = self.begin_resync();
        let mut documents = self
            .call_remote("export_documents", || self.remote.export_documents())
            .await?;

        let mut cache = DocumentCache::new();
        let mut report = ReconcileReport::default();
        while let Some(item) = documents.next().await {
            match item {
                Ok(doc) => {
                    if self.admits(&doc) {
                        cache.upsert(doc);
                    }
                }
                Err(MirrorError::Protocol(e)) => {
                    warn!(error = %e, "skipping undecodable export line");
                    report.skip(None, SkipReason::Malformed(e.to_string()));
                }
                Err(e) => {
                    self.update_stats(|stats| stats.last_error = Some(e.to_string()));
                    return Err(e);
                }
            }
        }

        let documents = cache.len();
        let report = self.replace_cache(cache, report, &resync)?;
        drop(resync);
        self.set_last_build(started);
        self.update_stats(|stats| stats.resyncs += 1);

        info!(
            dataset = %self.config.dataset,
            documents,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            skipped = report.skipped.len(),
            "full resync complete"
        );
        Ok(report)
    }
}
