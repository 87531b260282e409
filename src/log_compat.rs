//! Compatibility bridge for the Rust `log` crate.
//!
//! [`BridgeLogAdapter`] implements `log::Log` by emitting each record through
//! a [`Console`], so `log` macros become capture points like any other
//! console call. Records whose target belongs to this crate are ignored:
//! the bridge's own diagnostics must never be forwarded back into it.

use std::sync::{Arc, OnceLock};

use log::{LevelFilter, Metadata, Record};

use crate::console::{self, Console};
use crate::level::ConsoleLevel;
use crate::value::ArgValue;

const INTERNAL_TARGET: &str = "console_bridge";

/// `log` levels onto console levels; `trace` has no console counterpart and
/// folds into `debug`.
pub fn map_log_level(level: log::Level) -> ConsoleLevel {
    match level {
        log::Level::Trace | log::Level::Debug => ConsoleLevel::Debug,
        log::Level::Info => ConsoleLevel::Info,
        log::Level::Warn => ConsoleLevel::Warn,
        log::Level::Error => ConsoleLevel::Error,
    }
}

fn is_internal(target: &str) -> bool {
    target
        .strip_prefix(INTERNAL_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Adapter implementing the Rust `log::Log` trait on top of a console.
pub struct BridgeLogAdapter {
    console: Arc<Console>,
    max_level: LevelFilter,
}

impl BridgeLogAdapter {
    pub fn new(console: Arc<Console>, max_level: LevelFilter) -> Self {
        Self { console, max_level }
    }
}

impl log::Log for BridgeLogAdapter {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.max_level && !is_internal(metadata.target())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = ArgValue::String(record.args().to_string());
        self.console.emit(map_log_level(record.level()), &[message]);
    }

    fn flush(&self) {}
}

static INSTALL_RESULT: OnceLock<bool> = OnceLock::new();

/// Route `log` records at or above `max_level` into the global console.
///
/// Returns `true` on success. When a different global logger is already set,
/// installation fails and `false` is returned. Subsequent calls return the
/// cached outcome.
pub fn install_log_adapter(max_level: LevelFilter) -> bool {
    *INSTALL_RESULT.get_or_init(|| {
        let adapter = BridgeLogAdapter::new(Arc::clone(console::global()), max_level);
        if log::set_boxed_logger(Box::new(adapter)).is_err() {
            return false;
        }
        log::set_max_level(max_level);
        true
    })
}
