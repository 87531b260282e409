//! Builder for [`BridgeConfig`] and bridge installation.
//!
//! Unset options fall back to the defaults in [`crate::config`]. Validation
//! happens once, in [`BridgeBuilder::build_config`], so an invalid builder is
//! reported before any console slot is touched.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::activation::ActivationPolicy;
use crate::bridge::{BridgeHandle, ConsoleBridge, InstallError};
use crate::config::{BridgeConfig, OriginSource};
use crate::console::Console;

/// Errors raised while turning builder options into a configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid bridge configuration: {0}")]
    InvalidConfig(String),
}

macro_rules! ensure_positive {
    ($value:expr, $field:expr) => {{
        if $value == 0 {
            Err(BuildError::InvalidConfig(format!(
                "{} must be greater than zero",
                $field
            )))
        } else {
            Ok($value)
        }
    }};
}

macro_rules! option_setter {
    ($(#[$meta:meta])* $fn_name:ident, $field:ident, $ty:ty) => {
        $(#[$meta])*
        pub fn $fn_name(mut self, value: $ty) -> Self {
            self.$field = Some(value);
            self
        }
    };
}

/// Fluent configuration for a console bridge.
#[derive(Clone, Default)]
pub struct BridgeBuilder {
    base_url: Option<String>,
    path: Option<String>,
    origin: Option<OriginSource>,
    headers: BTreeMap<String, String>,
    batch_interval_ms: Option<u64>,
    max_batch_size: Option<usize>,
    command_capacity: Option<usize>,
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    shutdown_timeout_ms: Option<u64>,
    warn_interval_ms: Option<u64>,
    capture_panics: Option<bool>,
    announce: Option<bool>,
    activation: ActivationPolicy,
}

impl BridgeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheme, host and port of the collector, e.g. `http://localhost:3000`.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Request path on the collector. Defaults to `/api/logs`.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Fixed value for the `url` field of every record.
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(OriginSource::Fixed(origin.into()));
        self
    }

    /// Compute the `url` field at capture time.
    pub fn with_origin_fn<F>(mut self, origin: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.origin = Some(OriginSource::Dynamic(Arc::new(origin)));
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    option_setter!(
        #[doc = "Set the debounce window in milliseconds. Zero drains on the next worker turn."]
        with_batch_interval_ms,
        batch_interval_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the most records sent in one request."]
        with_max_batch_size,
        max_batch_size,
        usize
    );
    option_setter!(
        #[doc = "Set the worker command channel capacity."]
        with_command_capacity,
        command_capacity,
        usize
    );
    option_setter!(
        #[doc = "Set the connect timeout in milliseconds. Unset means none."]
        with_connect_timeout_ms,
        connect_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the whole-request timeout in milliseconds. Unset means none."]
        with_request_timeout_ms,
        request_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set how long dropping a bridge waits for the final drain."]
        with_shutdown_timeout_ms,
        shutdown_timeout_ms,
        u64
    );
    option_setter!(
        #[doc = "Set the minimum interval between dropped-record warnings."]
        with_warn_interval_ms,
        warn_interval_ms,
        u64
    );
    option_setter!(
        #[doc = "Report panics as uncaught errors. Enabled by default."]
        with_capture_panics,
        capture_panics,
        bool
    );
    option_setter!(
        #[doc = "Print the activation notice. Enabled by default."]
        with_announce,
        announce,
        bool
    );

    /// Replace the environment gate used by [`ConsoleBridge::install_if_enabled`].
    pub fn with_activation(mut self, policy: ActivationPolicy) -> Self {
        self.activation = policy;
        self
    }

    pub fn activation(&self) -> &ActivationPolicy {
        &self.activation
    }

    fn validate(&self) -> Result<(), BuildError> {
        self.validate_url()?;
        self.validate_sizes()?;
        self.validate_timeouts()?;
        self.validate_headers()?;
        Ok(())
    }

    fn validate_url(&self) -> Result<(), BuildError> {
        let Some(url) = &self.base_url else {
            return Ok(());
        };
        let url = url.trim();
        if url.is_empty() {
            return Err(BuildError::InvalidConfig("base URL must not be empty".into()));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(BuildError::InvalidConfig(format!(
                "base URL must use http or https: {url}"
            )));
        }
        Ok(())
    }

    fn validate_sizes(&self) -> Result<(), BuildError> {
        if let Some(size) = self.max_batch_size {
            ensure_positive!(size, "max_batch_size")?;
        }
        if let Some(capacity) = self.command_capacity {
            ensure_positive!(capacity, "command_capacity")?;
        }
        Ok(())
    }

    fn validate_timeouts(&self) -> Result<(), BuildError> {
        if let Some(timeout) = self.connect_timeout_ms {
            ensure_positive!(timeout, "connect_timeout_ms")?;
        }
        if let Some(timeout) = self.request_timeout_ms {
            ensure_positive!(timeout, "request_timeout_ms")?;
        }
        if let Some(timeout) = self.shutdown_timeout_ms {
            ensure_positive!(timeout, "shutdown_timeout_ms")?;
        }
        Ok(())
    }

    fn validate_headers(&self) -> Result<(), BuildError> {
        match self.headers.keys().find(|k| k.trim().is_empty()) {
            Some(_) => Err(BuildError::InvalidConfig(
                "header names must not be empty".into(),
            )),
            None => Ok(()),
        }
    }

    /// Validate the options and produce a configuration.
    pub fn build_config(&self) -> Result<BridgeConfig, BuildError> {
        self.validate()?;

        let defaults = BridgeConfig::default();
        Ok(BridgeConfig {
            base_url: self
                .base_url
                .as_deref()
                .map_or(defaults.base_url, |u| u.trim().to_owned()),
            path: self.path.clone().unwrap_or(defaults.path),
            origin: self.origin.clone().unwrap_or(defaults.origin),
            batch_interval: self
                .batch_interval_ms
                .map_or(defaults.batch_interval, Duration::from_millis),
            max_batch_size: self.max_batch_size.unwrap_or(defaults.max_batch_size),
            command_capacity: self.command_capacity.unwrap_or(defaults.command_capacity),
            headers: self.headers.clone(),
            connect_timeout: self.connect_timeout_ms.map(Duration::from_millis),
            request_timeout: self.request_timeout_ms.map(Duration::from_millis),
            shutdown_timeout: self
                .shutdown_timeout_ms
                .map_or(defaults.shutdown_timeout, Duration::from_millis),
            warn_interval: self
                .warn_interval_ms
                .map_or(defaults.warn_interval, Duration::from_millis),
            capture_panics: self.capture_panics.unwrap_or(defaults.capture_panics),
            announce: self.announce.unwrap_or(defaults.announce),
        })
    }

    /// Install on `console`, posting to the configured collector.
    pub fn install(self, console: &Arc<Console>) -> Result<BridgeHandle, InstallError> {
        ConsoleBridge::install(console, self)
    }

    /// Install on the global console when the activation policy allows it.
    pub fn activate(self) -> Result<Option<BridgeHandle>, InstallError> {
        ConsoleBridge::activate(self)
    }
}

impl fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("base_url", &self.base_url)
            .field("path", &self.path)
            .field("origin", &self.origin)
            .field("batch_interval_ms", &self.batch_interval_ms)
            .field("max_batch_size", &self.max_batch_size)
            .field("activation", &self.activation)
            .finish_non_exhaustive()
    }
}
