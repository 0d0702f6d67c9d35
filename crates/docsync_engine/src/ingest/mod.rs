//! Ingestion paths.
//!
//! Each path turns remote input into cache changes and hands them to the
//! engine: full resync replaces the cache, delta poll and webhooks apply
//! batches, and the listener coalesces live events.

mod delta;
mod listener;
mod resync;
mod webhook;

pub use listener::ListenerHandle;
pub use webhook::WebhookOutcome;
