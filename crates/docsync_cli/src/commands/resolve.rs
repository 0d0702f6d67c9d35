//! Resolve command implementation.

use super::{build_mirror, CliError, MirrorOptions};

/// Runs the resolve command.
pub async fn run(
    options: MirrorOptions,
    id: &str,
    max_depth: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (mirror, _) = build_mirror(options).await?;
    let node = mirror
        .store()
        .node_for(docsync_protocol::id::published_id_of(id))
        .ok_or_else(|| CliError::NotFound(id.to_string()))?;

    let content = serde_json::Value::Object(node.content);
    let depth = max_depth.unwrap_or(mirror.config().max_resolve_depth);
    let resolution = mirror.resolve_with_depth(&content, depth);

    println!("{}", serde_json::to_string_pretty(&resolution.value)?);
    for target in &resolution.missing {
        eprintln!("unresolved reference: {target}");
    }
    Ok(())
}
