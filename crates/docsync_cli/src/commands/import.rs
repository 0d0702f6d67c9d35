//! Import command implementation.

use super::{build_mirror, CliError, FileMirror, MirrorOptions};
use docsync_engine::ReconcileReport;
use serde::Serialize;

/// Import result.
#[derive(Debug, Serialize)]
pub struct ImportResult {
    /// Dataset name.
    pub dataset: String,
    /// Documents held in the cache.
    pub documents: usize,
    /// Nodes materialized.
    pub nodes: usize,
    /// Nodes per host type.
    pub types: Vec<(String, usize)>,
    /// Documents skipped, with the reason.
    pub skipped: Vec<String>,
}

/// Runs the import command.
pub async fn run(options: MirrorOptions, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (mirror, report) = build_mirror(options).await?;
    let result = summarize(&mirror, &report);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "text" => print_text_output(&result),
        other => return Err(CliError::Format(other.to_string()).into()),
    }
    Ok(())
}

fn summarize(mirror: &FileMirror, report: &ReconcileReport) -> ImportResult {
    let nodes = mirror.store().nodes();
    let mut types: Vec<(String, usize)> = Vec::new();
    for node in &nodes {
        match types.iter_mut().find(|(name, _)| *name == node.type_name) {
            Some((_, count)) => *count += 1,
            None => types.push((node.type_name.clone(), 1)),
        }
    }
    types.sort();

    ImportResult {
        dataset: mirror.config().dataset.clone(),
        documents: mirror.cached_documents(),
        nodes: nodes.len(),
        types,
        skipped: report
            .skipped
            .iter()
            .map(|s| match &s.id {
                Some(id) => format!("{id}: {}", s.reason),
                None => s.reason.to_string(),
            })
            .collect(),
    }
}

fn print_text_output(result: &ImportResult) {
    println!("Dataset: {}", result.dataset);
    println!("Documents: {}", result.documents);
    println!("Nodes: {}", result.nodes);
    for (name, count) in &result.types {
        println!("  {name}: {count}");
    }
    if !result.skipped.is_empty() {
        println!("Skipped: {}", result.skipped.len());
        for reason in &result.skipped {
            println!("  {reason}");
        }
    }
}
