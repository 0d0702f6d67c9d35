//! Remote source abstraction.
//!
//! The engine never talks HTTP itself. A [`RemoteSource`] hands it the
//! deployed schema, the dataset export, changed documents and the live
//! event stream.

use crate::error::{MirrorError, MirrorResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docsync_protocol::{parse_export_line, Document, ListenerEvent};
use futures_util::stream::{self, BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// A stream of exported documents; malformed lines surface as
/// [`MirrorError::Protocol`] items.
pub type DocumentStream = BoxStream<'static, MirrorResult<Document>>;

/// A stream of live listener events.
pub type EventStream = BoxStream<'static, MirrorResult<ListenerEvent>>;

/// Where documents come from.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Fetches the deployed GraphQL schema as SDL.
    async fn fetch_schema(&self) -> MirrorResult<String>;

    /// Streams every document of the dataset.
    async fn export_documents(&self) -> MirrorResult<DocumentStream>;

    /// Fetches documents modified after `since`.
    async fn changed_since(&self, since: DateTime<Utc>) -> MirrorResult<Vec<Document>>;

    /// Fetches documents by raw id, `None` for ids that no longer exist.
    async fn get_documents(&self, ids: &[String]) -> MirrorResult<Vec<Option<Document>>>;

    /// Subscribes to live mutations.
    async fn listen(&self) -> MirrorResult<EventStream>;
}

/// An in-memory remote for tests.
#[derive(Debug, Default)]
pub struct MockRemote {
    schema: Mutex<Option<String>>,
    documents: Mutex<BTreeMap<String, Document>>,
    malformed: Mutex<Vec<String>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ListenerEvent>>>,
    failures: AtomicU32,
    calls: AtomicU64,
}

impl MockRemote {
    /// Creates an empty remote with no schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a remote serving the given schema.
    pub fn with_schema(sdl: impl Into<String>) -> Self {
        let remote = Self::new();
        *remote.schema.lock() = Some(sdl.into());
        remote
    }

    /// Stores a document.
    pub fn put(&self, doc: Document) {
        self.documents.lock().insert(doc.id.clone(), doc);
    }

    /// Removes a document by raw id.
    pub fn remove(&self, raw_id: &str) -> Option<Document> {
        self.documents.lock().remove(raw_id)
    }

    /// Adds a line the export will fail to decode.
    pub fn add_malformed_line(&self, line: impl Into<String>) {
        self.malformed.lock().push(line.into());
    }

    /// Sends an event to every live subscriber.
    pub fn push_event(&self, event: ListenerEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Drops every live subscription, ending their streams.
    pub fn close_subscriptions(&self) {
        self.subscribers.lock().clear();
    }

    /// Makes the next `count` calls fail with a retryable error.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of calls received, failed ones included.
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> MirrorResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(MirrorError::transport_retryable("mock remote unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteSource for MockRemote {
    async fn fetch_schema(&self) -> MirrorResult<String> {
        self.check()?;
        self.schema
            .lock()
            .clone()
            .ok_or_else(|| MirrorError::schema_unavailable("mock", "default"))
    }

    async fn export_documents(&self) -> MirrorResult<DocumentStream> {
        self.check()?;
        let mut items: Vec<MirrorResult<Document>> =
            self.documents.lock().values().cloned().map(Ok).collect();
        for line in self.malformed.lock().iter() {
            if let Err(e) = parse_export_line(line) {
                items.push(Err(e.into()));
            }
        }
        Ok(stream::iter(items).boxed())
    }

    async fn changed_since(&self, since: DateTime<Utc>) -> MirrorResult<Vec<Document>> {
        self.check()?;
        Ok(self
            .documents
            .lock()
            .values()
            .filter(|d| d.updated_at.map_or(true, |at| at > since))
            .cloned()
            .collect())
    }

    async fn get_documents(&self, ids: &[String]) -> MirrorResult<Vec<Option<Document>>> {
        self.check()?;
        let documents = self.documents.lock();
        Ok(ids.iter().map(|id| documents.get(id).cloned()).collect())
    }

    async fn listen(&self) -> MirrorResult<EventStream> {
        self.check()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        Ok(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (Ok(event), rx))
        })
        .boxed())
    }
}

/// A remote backed by an NDJSON export and an SDL file on disk.
#[derive(Debug, Clone)]
pub struct ExportFileSource {
    schema_path: PathBuf,
    export_path: PathBuf,
}

impl ExportFileSource {
    /// Creates a source over the two files.
    pub fn new(schema_path: impl Into<PathBuf>, export_path: impl Into<PathBuf>) -> Self {
        Self {
            schema_path: schema_path.into(),
            export_path: export_path.into(),
        }
    }

    async fn read_all(&self) -> MirrorResult<Vec<Document>> {
        let mut documents = Vec::new();
        let mut stream = self.export_documents().await?;
        while let Some(item) = stream.next().await {
            match item {
                Ok(doc) => documents.push(doc),
                Err(MirrorError::Protocol(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(documents)
    }
}

#[async_trait]
impl RemoteSource for ExportFileSource {
    async fn fetch_schema(&self) -> MirrorResult<String> {
        match tokio::fs::read_to_string(&self.schema_path).await {
            Ok(sdl) => Ok(sdl),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(MirrorError::SchemaUnavailable {
                hint: format!("schema file {} does not exist", self.schema_path.display()),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn export_documents(&self) -> MirrorResult<DocumentStream> {
        let file = tokio::fs::File::open(&self.export_path).await?;
        let lines = BufReader::new(file).lines();
        Ok(stream::unfold(Some(lines), |state| async move {
            let mut lines = state?;
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match parse_export_line(&line) {
                        Ok(Some(doc)) => return Some((Ok(doc), Some(lines))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e.into()), Some(lines))),
                    },
                    Ok(None) => return None,
                    Err(e) => return Some((Err(e.into()), None)),
                }
            }
        })
        .boxed())
    }

    async fn changed_since(&self, since: DateTime<Utc>) -> MirrorResult<Vec<Document>> {
        let mut documents = self.read_all().await?;
        documents.retain(|d| d.updated_at.map_or(true, |at| at > since));
        Ok(documents)
    }

    async fn get_documents(&self, ids: &[String]) -> MirrorResult<Vec<Option<Document>>> {
        let by_id: BTreeMap<String, Document> = self
            .read_all()
            .await?
            .into_iter()
            .map(|d| (d.id.clone(), d))
            .collect();
        Ok(ids.iter().map(|id| by_id.get(id).cloned()).collect())
    }

    async fn listen(&self) -> MirrorResult<EventStream> {
        Err(MirrorError::transport_fatal(
            "an export file has no live listener",
        ))
    }
}
