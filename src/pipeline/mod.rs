//! Batch buffer and delivery loop.
//!
//! Producers call [`Pipeline::enqueue`] from any thread. The call serialises
//! the arguments, appends a [`LogRecord`] to the shared [`BatchBuffer`] and,
//! when no debounce timer is armed, arms one by sending the delivery worker
//! an `Arm` command. Enqueue never blocks on I/O.
//!
//! The worker thread owns the [`LogSink`]. When the timer fires it removes at
//! most `max_batch_size` records from the head of the buffer and delivers
//! them as one batch. If records remain once the request completes, it
//! re-arms the timer instead of looping, so bursts are coalesced into roughly
//! one request per debounce window.
//!
//! # States
//!
//! - **Idle**: no timer armed, nothing in flight.
//! - **Scheduled**: timer armed, debounce window running.
//! - **Draining**: one delivery in flight. Records enqueued meanwhile wait
//!   for the next scheduled drain.
//!
//! At most one delivery is in flight at any instant; the in-flight flag is
//! claimed atomically before a chunk is removed. A failed delivery drops its
//! chunk; nothing is retried or requeued.

mod buffer;
mod worker;


use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossbeam_channel::{Sender, bounded};
use log::warn;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::config::{BridgeConfig, OriginSource, default_origin};
use crate::level::ConsoleLevel;
use crate::log_record::LogRecord;
use crate::serialise::serialise_args;
use crate::sink::LogSink;
use crate::value::ArgValue;

pub use buffer::BatchBuffer;

use worker::{DeliveryCommand, spawn_worker};

/// Counters describing pipeline activity so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub requests: u64,
}

#[derive(Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    requests: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            requests: self.requests.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct QueueState {
    buffer: BatchBuffer,
    timer_armed: bool,
    last_timestamp: Option<DateTime<Utc>>,
}

/// State shared between producers and the delivery worker.
#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    in_flight: AtomicBool,
    counters: Counters,
}

/// Capture-to-sink pipeline for one bridge.
pub struct Pipeline {
    shared: Arc<Shared>,
    tx: RwLock<Option<Sender<DeliveryCommand>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    origin: OriginSource,
    /// Last value a dynamic origin produced.
    last_origin: Mutex<Option<String>>,
    batch_interval: Duration,
    shutdown_timeout: Duration,
}

impl Pipeline {
    /// Start the delivery worker for `sink`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the worker thread cannot be spawned.
    pub fn spawn(config: &BridgeConfig, sink: Box<dyn LogSink>) -> io::Result<Self> {
        let shared = Arc::new(Shared::default());
        let (tx, rx) = bounded(config.command_capacity.max(1));
        let handle = spawn_worker(Arc::clone(&shared), sink, rx, config)?;
        Ok(Self {
            shared,
            tx: RwLock::new(Some(tx)),
            handle: Mutex::new(Some(handle)),
            origin: config.origin.clone(),
            last_origin: Mutex::new(None),
            batch_interval: config.batch_interval,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Serialise `args` and queue them as one record.
    pub fn enqueue(&self, level: ConsoleLevel, args: &[ArgValue]) {
        self.enqueue_serialised(level, serialise_args(args));
    }

    /// Queue arguments that are already JSON-safe.
    pub fn enqueue_serialised(&self, level: ConsoleLevel, args: Vec<Value>) {
        if !self.is_running() {
            self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        let url = self.resolve_origin();
        self.push(level, args, url);
    }

    /// Queue a record without calling a dynamic origin.
    ///
    /// Used from the panic hook, where a second panic would abort the process.
    pub(crate) fn enqueue_with_known_origin(&self, level: ConsoleLevel, args: Vec<Value>) {
        let url = self.known_origin();
        self.push(level, args, url);
    }

    /// Evaluate the origin; a panicking callback falls back to
    /// [`Pipeline::known_origin`]. The callback is skipped while this thread
    /// is panicking, since a nested panic there cannot be caught.
    fn resolve_origin(&self) -> String {
        if matches!(self.origin, OriginSource::Fixed(_)) || thread::panicking() {
            return self.known_origin();
        }
        match panic::catch_unwind(AssertUnwindSafe(|| self.origin.resolve())) {
            Ok(url) => {
                *self.last_origin.lock() = Some(url.clone());
                url
            }
            Err(_) => self.known_origin(),
        }
    }

    fn known_origin(&self) -> String {
        match &self.origin {
            OriginSource::Fixed(url) => url.clone(),
            OriginSource::Dynamic(_) => self
                .last_origin
                .lock()
                .clone()
                .unwrap_or_else(default_origin),
        }
    }

    fn push(&self, level: ConsoleLevel, args: Vec<Value>, url: String) {
        // Held across the push so shutdown cannot run its final drain between
        // the running check and the append.
        let sender = self.tx.read();
        let Some(tx) = sender.as_ref() else {
            self.shared.counters.dropped.fetch_add(1, Ordering::Relaxed);
            return;
        };
        let now = Utc::now();
        let arm = {
            let mut state = self.shared.state.lock();
            // Wall clocks can step backwards; enqueue order wins.
            let timestamp = match state.last_timestamp {
                Some(last) if last > now => last,
                _ => now,
            };
            state.last_timestamp = Some(timestamp);
            state
                .buffer
                .push(LogRecord::new(level, args, timestamp, url));
            self.shared.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            !std::mem::replace(&mut state.timer_armed, true)
        };
        if arm {
            let deadline = Instant::now() + self.batch_interval;
            if tx.try_send(DeliveryCommand::Arm(deadline)).is_err() {
                // Let the next enqueue try again.
                self.shared.state.lock().timer_armed = false;
            }
        }
    }

    /// Deliver everything buffered now and wait for the worker to finish.
    ///
    /// Records still go out in chunks, one request at a time. Returns `false`
    /// if the worker did not acknowledge within `timeout` or has shut down.
    pub fn flush(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let Some(tx) = self.tx.read().as_ref().cloned() else {
            return false;
        };
        let (ack_tx, ack_rx) = bounded(1);
        if tx
            .send_timeout(DeliveryCommand::Flush(ack_tx), timeout)
            .is_err()
        {
            return false;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        ack_rx.recv_timeout(remaining).is_ok()
    }

    /// Drain what is left, then stop the worker. Later enqueues are dropped.
    pub fn shutdown(&self) {
        let Some(tx) = self.tx.write().take() else {
            return;
        };
        // One budget covers both the command and its acknowledgement: a full
        // queue in front of a hung request must not block the host.
        let deadline = Instant::now() + self.shutdown_timeout;
        let (ack_tx, ack_rx) = bounded(1);
        let acknowledged = tx
            .send_timeout(DeliveryCommand::Shutdown(ack_tx), self.shutdown_timeout)
            .is_ok()
            && ack_rx.recv_deadline(deadline).is_ok();
        drop(tx);
        let Some(handle) = self.handle.lock().take() else {
            return;
        };
        if !acknowledged {
            // A hung request; detach rather than block the host.
            warn!("console bridge delivery worker did not stop within {:?}", self.shutdown_timeout);
            return;
        }
        if handle.join().is_err() {
            warn!("console bridge delivery worker panicked");
        }
    }

    /// Records buffered and not yet handed to the sink.
    pub fn pending(&self) -> usize {
        self.shared.state.lock().buffer.len()
    }

    /// Whether a delivery is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.shared.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> PipelineStats {
        self.shared.counters.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.tx.read().is_some()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("batch_interval", &self.batch_interval)
            .field("pending", &self.pending())
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}
