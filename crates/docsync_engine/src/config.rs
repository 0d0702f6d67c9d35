//! Configuration for the mirror engine.

use crate::error::{MirrorError, MirrorResult};
use docsync_schema::DEFAULT_TYPE_PREFIX;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for a mirror of one dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct MirrorConfig {
    /// Remote project id.
    pub project_id: String,
    /// Dataset name.
    pub dataset: String,
    /// Read token; required to see drafts.
    pub token: Option<String>,
    /// Let drafts replace their published documents in the output.
    pub overlay_drafts: bool,
    /// Keep a live listener running after the initial build.
    pub watch_mode: bool,
    /// Prefix for host type names.
    pub type_prefix: String,
    /// Tag of the deployed GraphQL API to read the schema from.
    pub graphql_tag: String,
    /// Default depth bound for reference resolution.
    pub max_resolve_depth: usize,
    /// Coalescing window for live events.
    pub listener_window: Duration,
    /// Capacity of the live event channel.
    pub listener_capacity: usize,
    /// Timeout for a single remote call.
    pub request_timeout: Duration,
    /// Retry configuration for remote calls.
    pub retry: RetryConfig,
}

impl MirrorConfig {
    /// Creates a configuration with defaults for everything but the dataset.
    pub fn new(project_id: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            dataset: dataset.into(),
            token: None,
            overlay_drafts: false,
            watch_mode: false,
            type_prefix: DEFAULT_TYPE_PREFIX.to_string(),
            graphql_tag: "default".to_string(),
            max_resolve_depth: 5,
            listener_window: Duration::from_millis(100),
            listener_capacity: 1024,
            request_timeout: Duration::from_secs(30),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the read token.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Enables or disables the draft overlay.
    pub fn with_overlay_drafts(mut self, overlay: bool) -> Self {
        self.overlay_drafts = overlay;
        self
    }

    /// Enables or disables watch mode.
    pub fn with_watch_mode(mut self, watch: bool) -> Self {
        self.watch_mode = watch;
        self
    }

    /// Sets the type prefix.
    pub fn with_type_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.type_prefix = prefix.into();
        self
    }

    /// Sets the GraphQL API tag.
    pub fn with_graphql_tag(mut self, tag: impl Into<String>) -> Self {
        self.graphql_tag = tag.into();
        self
    }

    /// Sets the default resolution depth.
    pub fn with_max_resolve_depth(mut self, depth: usize) -> Self {
        self.max_resolve_depth = depth;
        self
    }

    /// Sets the listener coalescing window.
    pub fn with_listener_window(mut self, window: Duration) -> Self {
        self.listener_window = window;
        self
    }

    /// Sets the listener channel capacity.
    pub fn with_listener_capacity(mut self, capacity: usize) -> Self {
        self.listener_capacity = capacity;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Checks the configuration before any remote call is made.
    pub fn validate(&self) -> MirrorResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(MirrorError::Config("project id is required".into()));
        }
        if self.dataset.trim().is_empty() {
            return Err(MirrorError::Config("dataset is required".into()));
        }
        if self.listener_window.is_zero() {
            return Err(MirrorError::Config(
                "listener window must be greater than zero".into(),
            ));
        }
        if self.listener_capacity == 0 {
            return Err(MirrorError::Config(
                "listener capacity must be greater than zero".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(MirrorError::Config(
                "retry attempts must be at least one".into(),
            ));
        }
        if self.overlay_drafts && self.token.is_none() {
            tracing::warn!(
                dataset = %self.dataset,
                "draft overlay is enabled without a token; drafts will not be visible"
            );
        }
        Ok(())
    }

    /// Loads a configuration from JSON with camelCase keys.
    ///
    /// Missing keys take their defaults; durations are given in milliseconds.
    pub fn from_json(json: &str) -> MirrorResult<Self> {
        let raw: RawConfig =
            serde_json::from_str(json).map_err(|e| MirrorError::Config(e.to_string()))?;
        Ok(raw.into())
    }
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self::new("", "")
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included.
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_delay = self.initial_delay.as_secs_f64()
            * self
                .backoff_multiplier
                .powi(attempt.saturating_sub(1).min(i32::MAX as u32) as i32);

        Duration::from_secs_f64(base_delay.min(self.max_delay.as_secs_f64()))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConfig {
    project_id: String,
    dataset: String,
    token: Option<String>,
    overlay_drafts: bool,
    watch_mode: bool,
    type_prefix: String,
    graphql_tag: String,
    max_resolve_depth: usize,
    listener_window_ms: u64,
    listener_capacity: usize,
    request_timeout_ms: u64,
    retry: RawRetry,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawRetry {
    max_attempts: u32,
    initial_delay_ms: u64,
    max_delay_ms: u64,
    backoff_multiplier: f64,
}

impl Default for RawConfig {
    fn default() -> Self {
        let config = MirrorConfig::default();
        Self {
            project_id: config.project_id,
            dataset: config.dataset,
            token: config.token,
            overlay_drafts: config.overlay_drafts,
            watch_mode: config.watch_mode,
            type_prefix: config.type_prefix,
            graphql_tag: config.graphql_tag,
            max_resolve_depth: config.max_resolve_depth,
            listener_window_ms: config.listener_window.as_millis() as u64,
            listener_capacity: config.listener_capacity,
            request_timeout_ms: config.request_timeout.as_millis() as u64,
            retry: RawRetry::default(),
        }
    }
}

impl Default for RawRetry {
    fn default() -> Self {
        let retry = RetryConfig::default();
        Self {
            max_attempts: retry.max_attempts,
            initial_delay_ms: retry.initial_delay.as_millis() as u64,
            max_delay_ms: retry.max_delay.as_millis() as u64,
            backoff_multiplier: retry.backoff_multiplier,
        }
    }
}

impl From<RawConfig> for MirrorConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            project_id: raw.project_id,
            dataset: raw.dataset,
            token: raw.token,
            overlay_drafts: raw.overlay_drafts,
            watch_mode: raw.watch_mode,
            type_prefix: raw.type_prefix,
            graphql_tag: raw.graphql_tag,
            max_resolve_depth: raw.max_resolve_depth,
            listener_window: Duration::from_millis(raw.listener_window_ms),
            listener_capacity: raw.listener_capacity,
            request_timeout: Duration::from_millis(raw.request_timeout_ms),
            retry: RetryConfig {
                max_attempts: raw.retry.max_attempts,
                initial_delay: Duration::from_millis(raw.retry.initial_delay_ms),
                max_delay: Duration::from_millis(raw.retry.max_delay_ms),
                backoff_multiplier: raw.retry.backoff_multiplier,
            },
        }
    }
}
