//! # docsync protocol
//!
//! Wire-level types shared by the docsync engine and its hosts.
//!
//! This crate provides:
//! - The identity codec mapping raw, draft and local ids
//! - `Document` for raw remote documents
//! - Webhook payload classification (v1 id lists, v2 before/after events)
//! - Live listener events
//! - NDJSON export line parsing
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod document;
mod error;
mod export;
pub mod id;
mod listener;
mod webhook;

pub use document::Document;
pub use error::{ProtocolError, ProtocolResult};
pub use export::parse_export_line;
pub use id::{LocalId, NodeIdMapper, UuidNodeIdMapper};
pub use listener::{ListenerEvent, MutationEvent, Transition};
pub use webhook::{V1Ids, V2Event, WebhookOperation, WebhookPayload, WEBHOOK_V2_TAG};
