//! Webhook command implementation.

use super::{build_mirror, MirrorOptions};
use docsync_engine::WebhookOutcome;
use docsync_protocol::WebhookPayload;
use std::path::Path;
use tracing::debug;

/// Runs the webhook command.
pub async fn run(options: MirrorOptions, payload: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let body: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(payload)?)?;
    debug!(kind = kind(&body), "decoded webhook body");

    let (mirror, _) = build_mirror(options).await?;
    match mirror.handle_webhook(&body).await? {
        WebhookOutcome::Handled(report) => {
            println!(
                "Handled: {} created, {} updated, {} deleted, {} unchanged",
                report.created, report.updated, report.deleted, report.unchanged
            );
            println!("Nodes: {}", mirror.store().len());
        }
        WebhookOutcome::NotHandled(reason) => println!("Not handled: {reason}"),
    }
    Ok(())
}

fn kind(body: &serde_json::Value) -> &'static str {
    match WebhookPayload::decode(body) {
        WebhookPayload::V1(_) => "v1",
        WebhookPayload::V2(_) => "v2",
        WebhookPayload::Unrecognized(_) => "unrecognized",
    }
}
