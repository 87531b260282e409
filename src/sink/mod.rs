//! Delivery targets for batched records.
//!
//! The pipeline hands each drained chunk to a [`LogSink`] as a single
//! [`LogBatch`]. [`HttpSink`] is the production target: it POSTs the batch as
//! JSON to the configured collector path.
//!
//! # Failure semantics
//!
//! A delivery either succeeds or fails; the pipeline does not distinguish
//! between failure kinds. Any 2xx response is success. Every other status,
//! transport error, or encoding error is a failure, and the chunk is dropped
//! without retry.

mod http;


use thiserror::Error;

use crate::log_record::LogBatch;

pub use http::{HttpSink, ResponseClass, classify_status};

/// Reasons a delivery failed.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The collector answered with a non-2xx status.
    #[error("collector returned HTTP {0}")]
    Status(u16),
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),
    /// The sink panicked while delivering.
    #[error("sink panicked during delivery")]
    Panicked,
}

/// Receiver of drained batches.
///
/// Implementations run on the pipeline's delivery thread and are only ever
/// called by one delivery at a time.
pub trait LogSink: Send {
    fn deliver(&mut self, batch: &LogBatch) -> Result<(), DeliveryError>;
}

impl<F> LogSink for F
where
    F: FnMut(&LogBatch) -> Result<(), DeliveryError> + Send,
{
    fn deliver(&mut self, batch: &LogBatch) -> Result<(), DeliveryError> {
        self(batch)
    }
}
