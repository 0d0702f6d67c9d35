//! Schema command implementation.

use super::CliError;
use docsync_schema::{parse_schema, rewrite_schema, TypeMap};
use serde::Serialize;
use std::path::Path;

/// Summary of one mirrored type.
#[derive(Debug, Serialize)]
pub struct TypeSummary {
    /// Host type name.
    pub name: String,
    /// Name in the remote schema.
    pub source_name: String,
    /// Whether documents of this type become nodes.
    pub is_document: bool,
    /// Fields holding references.
    pub references: Vec<String>,
    /// Document keys whose raw values are kept.
    pub raw_fields: Vec<String>,
}

/// Runs the schema command.
pub fn run(
    config: Option<&Path>,
    schema: &Path,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let prefix = match config {
        Some(path) => {
            docsync_engine::MirrorConfig::from_json(&std::fs::read_to_string(path)?)?.type_prefix
        }
        None => docsync_schema::DEFAULT_TYPE_PREFIX.to_string(),
    };
    let sdl = std::fs::read_to_string(schema)?;
    println!("{}", render(&sdl, &prefix, format)?);
    Ok(())
}

fn render(sdl: &str, prefix: &str, format: &str) -> Result<String, Box<dyn std::error::Error>> {
    let doc = parse_schema(sdl)?;
    let type_map = TypeMap::from_schema(&doc, prefix)?;
    match format {
        "sdl" => Ok(rewrite_schema(&doc, &type_map).to_string()),
        "json" => Ok(serde_json::to_string_pretty(&summarize(&type_map))?),
        other => Err(CliError::Format(other.to_string()).into()),
    }
}

fn summarize(type_map: &TypeMap) -> Vec<TypeSummary> {
    type_map
        .objects()
        .map(|object| TypeSummary {
            name: object.name.clone(),
            source_name: object.source_name.clone(),
            is_document: object.is_document,
            references: object
                .fields
                .iter()
                .filter(|(_, field)| field.is_reference)
                .map(|(name, _)| name.clone())
                .collect(),
            raw_fields: object.raw_fields().map(|(key, _)| key.to_string()).collect(),
        })
        .collect()
}
