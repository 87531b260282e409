//! Fixtures pairing a console whose originals write into shared buffers with
//! a sink that records every delivered batch.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use console_bridge::{
    BridgeConfig, Console, ConsoleLevel, DeliveryError, LogBatch, LogRecord, LogSink,
    OriginSource, SharedMethod, StreamMethod,
};
use rstest::fixture;

use super::shared_buffer::SharedBuf;

/// A console whose stdout/stderr are in-memory buffers.
pub struct BufferedConsole {
    pub console: Arc<Console>,
    pub stdout: SharedBuf,
    pub stderr: SharedBuf,
}

#[fixture]
pub fn buffered_console() -> BufferedConsole {
    new_buffered_console()
}

pub fn new_buffered_console() -> BufferedConsole {
    let stdout = SharedBuf::default();
    let stderr = SharedBuf::default();
    let out: SharedMethod = Arc::new(StreamMethod::new(stdout.clone()));
    let err: SharedMethod = Arc::new(StreamMethod::new(stderr.clone()));
    let console = Console::from_fn(|level| {
        if level.is_diagnostic() {
            Arc::clone(&err)
        } else {
            Arc::clone(&out)
        }
    });
    BufferedConsole {
        console: Arc::new(console),
        stdout,
        stderr,
    }
}

/// Sink that keeps every batch it is given.
#[derive(Clone, Default)]
pub struct RecordingSink {
    batches: Arc<Mutex<Vec<LogBatch>>>,
}

impl RecordingSink {
    pub fn batches(&self) -> Vec<LogBatch> {
        self.batches.lock().expect("sink mutex poisoned").clone()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.batches().into_iter().flat_map(|b| b.logs).collect()
    }

    #[allow(dead_code)]
    pub fn levels(&self) -> Vec<ConsoleLevel> {
        self.records().iter().map(LogRecord::level).collect()
    }
}

impl LogSink for RecordingSink {
    fn deliver(&mut self, batch: &LogBatch) -> Result<(), DeliveryError> {
        self.batches
            .lock()
            .expect("sink mutex poisoned")
            .push(batch.clone());
        Ok(())
    }
}

/// Flush-driven configuration with no panic hook and no notice, so tests are
/// deterministic and can run in parallel.
#[fixture]
pub fn test_config() -> BridgeConfig {
    BridgeConfig {
        batch_interval: Duration::from_secs(60),
        origin: OriginSource::Fixed("http://localhost:5173/".into()),
        capture_panics: false,
        announce: false,
        ..Default::default()
    }
}

pub const FLUSH_WAIT: Duration = Duration::from_secs(5);
