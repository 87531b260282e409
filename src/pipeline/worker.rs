//! Delivery worker thread.
//!
//! The worker owns the sink and the debounce deadline. Producers only touch
//! the shared buffer and send `Arm` when they find no timer armed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, warn};

use crate::config::BridgeConfig;
use crate::guard;
use crate::log_record::LogBatch;
use crate::rate_limited_warner::RateLimitedWarner;
use crate::sink::{DeliveryError, LogSink};

use super::Shared;

/// Commands processed by the worker thread.
#[derive(Debug)]
pub(super) enum DeliveryCommand {
    /// Start the debounce timer, expiring at the given instant.
    Arm(Instant),
    Flush(Sender<()>),
    Shutdown(Sender<()>),
}

pub(super) fn spawn_worker(
    shared: Arc<Shared>,
    sink: Box<dyn LogSink>,
    rx: Receiver<DeliveryCommand>,
    config: &BridgeConfig,
) -> std::io::Result<JoinHandle<()>> {
    let worker = Worker {
        shared,
        sink,
        max_batch_size: config.max_batch_size.max(1),
        batch_interval: config.batch_interval,
        deadline: None,
        warner: RateLimitedWarner::new(config.warn_interval),
    };
    thread::Builder::new()
        .name("console-bridge-delivery".into())
        .spawn(move || {
            guard::mark_pipeline_thread();
            worker.run(rx);
        })
}

/// Claim on the single delivery slot, released on drop.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

struct Worker {
    shared: Arc<Shared>,
    sink: Box<dyn LogSink>,
    max_batch_size: usize,
    batch_interval: Duration,
    deadline: Option<Instant>,
    warner: RateLimitedWarner,
}

impl Worker {
    fn run(mut self, rx: Receiver<DeliveryCommand>) {
        loop {
            let command = match self.deadline {
                Some(deadline) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match command {
                Ok(DeliveryCommand::Arm(at)) => {
                    self.deadline = Some(self.deadline.map_or(at, |current| current.min(at)));
                }
                Ok(DeliveryCommand::Flush(ack)) => {
                    self.drain_all();
                    let _ = ack.send(());
                }
                Ok(DeliveryCommand::Shutdown(ack)) => {
                    self.drain_pending_commands(&rx);
                    self.drain_all();
                    let _ = ack.send(());
                    break;
                }
                Err(RecvTimeoutError::Timeout) => self.on_timer(),
                Err(RecvTimeoutError::Disconnected) => {
                    self.drain_all();
                    break;
                }
            }
        }
        self.warner.flush(|count| {
            warn!("console bridge dropped {count} records after failed deliveries");
        });
    }

    /// Debounce window elapsed: send one chunk, then re-arm if work remains.
    fn on_timer(&mut self) {
        self.deadline = None;
        self.shared.state.lock().timer_armed = false;
        self.deliver_next_chunk();

        let mut state = self.shared.state.lock();
        if !state.buffer.is_empty() && !state.timer_armed {
            state.timer_armed = true;
            self.deadline = Some(Instant::now() + self.batch_interval);
        }
    }

    fn drain_all(&mut self) {
        while self.deliver_next_chunk() {}
    }

    /// Answer flushes queued behind a shutdown so their callers do not wait
    /// for the full timeout.
    fn drain_pending_commands(&mut self, rx: &Receiver<DeliveryCommand>) {
        loop {
            match rx.try_recv() {
                Ok(DeliveryCommand::Arm(_)) => {}
                Ok(DeliveryCommand::Flush(ack) | DeliveryCommand::Shutdown(ack)) => {
                    self.drain_all();
                    let _ = ack.send(());
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Deliver at most one chunk. Returns `false` when there was nothing to
    /// send or a delivery is already in flight.
    fn deliver_next_chunk(&mut self) -> bool {
        let Some(_in_flight) = InFlight::claim(&self.shared.in_flight) else {
            return false;
        };
        let records = self.shared.state.lock().buffer.drain_chunk(self.max_batch_size);
        if records.is_empty() {
            return false;
        }
        let count = records.len() as u64;
        let batch = LogBatch::new(records);
        let counters = &self.shared.counters;
        counters.requests.fetch_add(1, Ordering::Relaxed);

        let sink = &mut self.sink;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| sink.deliver(&batch)))
            .unwrap_or(Err(DeliveryError::Panicked));
        match outcome {
            Ok(()) => {
                counters.delivered.fetch_add(count, Ordering::Relaxed);
            }
            Err(err) => {
                counters.dropped.fetch_add(count, Ordering::Relaxed);
                debug!("console bridge delivery failed: {err}");
                self.warner.record_drops(count);
                self.warner.warn_if_due(|dropped| {
                    warn!("console bridge dropped {dropped} records after failed deliveries");
                });
            }
        }
        true
    }
}
