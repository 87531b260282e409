//! Capture layer: installing, using and removing a console bridge.
//!
//! Installation is always an explicit call that returns a [`BridgeHandle`].
//! While the handle is active every console slot holds a capturing wrapper
//! around the method it replaced. [`BridgeHandle::restore`] puts the saved
//! originals back; dropping the handle restores and then drains the pipeline.
//!
//! ```no_run
//! use console_bridge::{BridgeBuilder, args, console};
//!
//! let bridge = BridgeBuilder::new()
//!     .with_base_url("http://localhost:3000")
//!     .install(console::global())
//!     .expect("bridge installs");
//! console::global().log(&args!["ready", 42]);
//! bridge.restore();
//! ```

mod capture;
mod failure;

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::debug;
use parking_lot::Mutex;
use thiserror::Error;

use crate::builder::{BridgeBuilder, BuildError};
use crate::config::BridgeConfig;
use crate::console::{self, Console, SharedMethod};
use crate::level::ConsoleLevel;
use crate::pipeline::{Pipeline, PipelineStats};
use crate::sink::{HttpSink, LogSink};
use crate::value::ArgValue;

use capture::CapturingMethod;
use failure::{PanicHookGuard, report};

pub use failure::{UncaughtError, rejection_payload};

/// Text of the one-time notice printed through the original `info`.
pub const ACTIVATION_NOTICE: &str = "[console-bridge] logging bridge active";

/// Reasons a bridge could not be installed. The console is untouched when
/// any of these is returned.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("a bridge is already installed on this console")]
    AlreadyActive,
    #[error("another bridge owns the panic hook")]
    PanicHookInUse,
    #[error(transparent)]
    Config(#[from] BuildError),
    #[error("failed to start delivery worker: {0}")]
    Spawn(#[from] io::Error),
}

/// Entry points for installing a bridge.
pub struct ConsoleBridge;

impl ConsoleBridge {
    /// Install on `console`, posting batches to the collector described by
    /// `builder`.
    pub fn install(
        console: &Arc<Console>,
        builder: BridgeBuilder,
    ) -> Result<BridgeHandle, InstallError> {
        let config = builder.build_config()?;
        let sink = HttpSink::new(&config);
        Self::install_with_sink(console, config, sink)
    }

    /// Install on `console` with a caller-supplied sink.
    pub fn install_with_sink<S>(
        console: &Arc<Console>,
        config: BridgeConfig,
        sink: S,
    ) -> Result<BridgeHandle, InstallError>
    where
        S: LogSink + 'static,
    {
        if !console.claim_bridge() {
            return Err(InstallError::AlreadyActive);
        }
        match BridgeInner::start(console, &config, Box::new(sink)) {
            Ok(inner) => Ok(BridgeHandle {
                inner: Arc::new(inner),
            }),
            Err(err) => {
                console.release_bridge();
                Err(err)
            }
        }
    }

    /// Like [`ConsoleBridge::install`], but returns `Ok(None)` when the
    /// builder's activation policy is off.
    pub fn install_if_enabled(
        console: &Arc<Console>,
        builder: BridgeBuilder,
    ) -> Result<Option<BridgeHandle>, InstallError> {
        if !builder.activation().should_activate() {
            debug!("console bridge disabled by activation policy");
            return Ok(None);
        }
        Self::install(console, builder).map(Some)
    }

    /// Gated install on the process-wide console.
    pub fn activate(builder: BridgeBuilder) -> Result<Option<BridgeHandle>, InstallError> {
        Self::install_if_enabled(console::global(), builder)
    }
}

struct BridgeInner {
    console: Arc<Console>,
    originals: [SharedMethod; 5],
    pipeline: Arc<Pipeline>,
    panic_hook: Mutex<Option<PanicHookGuard>>,
    restored: AtomicBool,
}

impl BridgeInner {
    fn start(
        console: &Arc<Console>,
        config: &BridgeConfig,
        sink: Box<dyn LogSink>,
    ) -> Result<Self, InstallError> {
        let pipeline = Arc::new(Pipeline::spawn(config, sink)?);
        let panic_hook = if config.capture_panics {
            let hook = PanicHookGuard::install(Arc::downgrade(&pipeline))
                .ok_or(InstallError::PanicHookInUse)?;
            Some(hook)
        } else {
            None
        };

        let originals = console.snapshot();
        for (level, original) in ConsoleLevel::ALL.into_iter().zip(&originals) {
            let wrapper = CapturingMethod::new(level, Arc::clone(original), Arc::clone(&pipeline));
            console.replace(level, Arc::new(wrapper));
        }
        if config.announce {
            originals[ConsoleLevel::Info.index()].call(&[ArgValue::from(ACTIVATION_NOTICE)]);
        }
        debug!(
            "console bridge installed; delivering to {}",
            config.endpoint_url()
        );

        Ok(Self {
            console: Arc::clone(console),
            originals,
            pipeline,
            panic_hook: Mutex::new(panic_hook),
            restored: AtomicBool::new(false),
        })
    }

    fn restore(&self) {
        if self.restored.swap(true, Ordering::AcqRel) {
            return;
        }
        for (level, original) in ConsoleLevel::ALL.into_iter().zip(&self.originals) {
            self.console.replace(level, Arc::clone(original));
        }
        drop(self.panic_hook.lock().take());
        self.console.release_bridge();
        debug!("console bridge restored");
    }
}

/// An installed bridge.
///
/// Dropping the handle restores the console and delivers whatever is still
/// buffered, waiting at most the configured shutdown timeout.
pub struct BridgeHandle {
    inner: Arc<BridgeInner>,
}

impl BridgeHandle {
    /// Put all five original methods back.
    ///
    /// Only the first call has an effect, so a stale handle can never undo a
    /// bridge installed later. Buffered records are still delivered.
    pub fn restore(&self) {
        self.inner.restore();
    }

    pub fn is_active(&self) -> bool {
        !self.inner.restored.load(Ordering::Acquire)
    }

    /// The method that was installed for `level` before this bridge.
    pub fn original(&self, level: ConsoleLevel) -> SharedMethod {
        Arc::clone(&self.inner.originals[level.index()])
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.inner.console
    }

    /// Report an uncaught error as one error-level record.
    pub fn report_uncaught(&self, error: &UncaughtError) {
        report(&self.inner.pipeline, error.to_json());
    }

    /// Report an unhandled asynchronous failure as one error-level record.
    pub fn report_unhandled_rejection(&self, reason: &ArgValue) {
        report(&self.inner.pipeline, rejection_payload(reason));
    }

    /// Deliver everything buffered now. See [`Pipeline::flush`].
    pub fn flush(&self, timeout: Duration) -> bool {
        self.inner.pipeline.flush(timeout)
    }

    pub fn pending(&self) -> usize {
        self.inner.pipeline.pending()
    }

    pub fn stats(&self) -> PipelineStats {
        self.inner.pipeline.stats()
    }
}

impl Drop for BridgeHandle {
    fn drop(&mut self) {
        self.inner.restore();
        self.inner.pipeline.shutdown();
    }
}

impl std::fmt::Debug for BridgeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeHandle")
            .field("active", &self.is_active())
            .field("pipeline", &self.inner.pipeline)
            .finish()
    }
}
