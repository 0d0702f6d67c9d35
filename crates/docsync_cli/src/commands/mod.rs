//! CLI command implementations.

pub mod import;
pub mod resolve;
pub mod schema;
pub mod webhook;

use docsync_engine::{
    ExportFileSource, MemoryNodeStore, MemorySchemaRegistrar, MirrorConfig, SyncEngine,
};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A mirror built from files on disk.
pub type FileMirror = SyncEngine<ExportFileSource, MemoryNodeStore>;

/// Errors specific to the CLI.
#[derive(Error, Debug)]
pub enum CliError {
    /// No document with the given id is mirrored.
    #[error("no mirrored document with id {0:?}")]
    NotFound(String),

    /// Unknown output format.
    #[error("unknown output format {0:?}")]
    Format(String),
}

/// Inputs for commands that build a mirror.
#[derive(Debug)]
pub struct MirrorOptions {
    /// Mirror configuration.
    pub config: MirrorConfig,
    /// SDL file.
    pub schema: PathBuf,
    /// NDJSON export file.
    pub export: PathBuf,
}

/// Loads the configuration file, or defaults named after the export file.
pub fn load_config(
    path: Option<&Path>,
    export: &Path,
) -> Result<MirrorConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)?;
            Ok(MirrorConfig::from_json(&json)?)
        }
        None => {
            let dataset = export
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("export");
            Ok(MirrorConfig::new("local", dataset))
        }
    }
}

/// Registers the schema and runs a full resync over the export.
pub async fn build_mirror(
    options: MirrorOptions,
) -> Result<(FileMirror, docsync_engine::ReconcileReport), Box<dyn std::error::Error>> {
    let source = ExportFileSource::new(options.schema, options.export);
    let registrar = MemorySchemaRegistrar::new();
    let mirror =
        SyncEngine::bootstrap(options.config, source, MemoryNodeStore::new(), &registrar).await?;
    let report = mirror.full_resync().await?;
    Ok((mirror, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsync_testkit::{author, post, to_ndjson, SAMPLE_SDL};

    pub(crate) fn write_inputs(dir: &Path) -> MirrorOptions {
        let schema = dir.join("schema.graphql");
        let export = dir.join("production.ndjson");
        std::fs::write(&schema, SAMPLE_SDL).unwrap();
        std::fs::write(&export, to_ndjson(&[post("post-1", "One"), author("author-1", "Ada")]))
            .unwrap();
        MirrorOptions {
            config: load_config(None, &export).unwrap(),
            schema,
            export,
        }
    }

    #[test]
    fn default_config_uses_export_name() {
        let config = load_config(None, Path::new("/tmp/staging.ndjson")).unwrap();
        assert_eq!(config.dataset, "staging");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.json");
        std::fs::write(&path, r#"{"projectId": "abc", "dataset": "prod", "overlayDrafts": true}"#)
            .unwrap();

        let config = load_config(Some(&path), Path::new("ignored.ndjson")).unwrap();
        assert_eq!(config.project_id, "abc");
        assert!(config.overlay_drafts);
    }

    #[tokio::test]
    async fn builds_mirror_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let (mirror, report) = build_mirror(write_inputs(dir.path())).await.unwrap();

        assert_eq!(report.created, 2);
        assert_eq!(mirror.store().len(), 2);
    }
}
