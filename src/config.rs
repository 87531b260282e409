//! Runtime configuration for an installed bridge.
//!
//! [`BridgeBuilder`](crate::BridgeBuilder) validates user input and produces
//! a [`BridgeConfig`]; the pipeline and the HTTP sink read their settings
//! from it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::rate_limited_warner::DEFAULT_WARN_INTERVAL;

/// Collector path used when none is configured.
pub const DEFAULT_ENDPOINT_PATH: &str = "/api/logs";
/// Collector origin used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";
/// Debounce window between the first buffered record and its drain.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_millis(100);
/// Most records removed from the buffer by one drain.
pub const MAX_BATCH_SIZE: usize = 20;
/// Bounded capacity of the worker command channel.
pub const DEFAULT_COMMAND_CAPACITY: usize = 64;
/// Upper bound on waiting for the final drain when a bridge is dropped.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// Where the `url` field of each record comes from.
#[derive(Clone)]
pub enum OriginSource {
    Fixed(String),
    /// Evaluated at capture time, for hosts whose location changes.
    Dynamic(Arc<dyn Fn() -> String + Send + Sync>),
}

impl OriginSource {
    pub fn resolve(&self) -> String {
        match self {
            OriginSource::Fixed(origin) => origin.clone(),
            OriginSource::Dynamic(f) => f(),
        }
    }
}

impl Default for OriginSource {
    fn default() -> Self {
        OriginSource::Fixed(default_origin())
    }
}

impl fmt::Debug for OriginSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginSource::Fixed(origin) => f.debug_tuple("Fixed").field(origin).finish(),
            OriginSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// `app://<executable name>`, or `app://unknown` when it cannot be determined.
pub fn default_origin() -> String {
    std::env::current_exe()
        .ok()
        .and_then(|path| path.file_name().map(|name| name.to_string_lossy().into_owned()))
        .map_or_else(|| "app://unknown".to_owned(), |name| format!("app://{name}"))
}

/// Settings for one bridge instance.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Scheme, host and port of the collector.
    pub base_url: String,
    /// Fixed request path on the collector.
    pub path: String,
    pub origin: OriginSource,
    pub batch_interval: Duration,
    pub max_batch_size: usize,
    pub command_capacity: usize,
    /// Extra request headers.
    pub headers: BTreeMap<String, String>,
    /// No connect timeout is applied when `None`.
    pub connect_timeout: Option<Duration>,
    /// No request timeout is applied when `None`; a hung request only delays
    /// the next drain.
    pub request_timeout: Option<Duration>,
    pub shutdown_timeout: Duration,
    pub warn_interval: Duration,
    /// Report panics as uncaught errors.
    pub capture_panics: bool,
    /// Print the one-time activation notice through the original `info`.
    pub announce: bool,
}

impl BridgeConfig {
    /// Full URL requests are posted to.
    pub fn endpoint_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.path.trim();
        if path.is_empty() {
            base.to_owned()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            path: DEFAULT_ENDPOINT_PATH.to_owned(),
            origin: OriginSource::default(),
            batch_interval: DEFAULT_BATCH_INTERVAL,
            max_batch_size: MAX_BATCH_SIZE,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            headers: BTreeMap::new(),
            connect_timeout: None,
            request_timeout: None,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            warn_interval: DEFAULT_WARN_INTERVAL,
            capture_panics: true,
            announce: true,
        }
    }
}
