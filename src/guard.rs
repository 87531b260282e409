//! Thread-local reentrancy guard for the capture path.
//!
//! Anything the pipeline does while forwarding a record (serialising, user
//! origin callbacks, sink code on the delivery thread) may itself call a
//! console entry point. Those nested calls still reach the original output
//! but are never forwarded again.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static PIPELINE_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Held while a record is being forwarded on this thread.
pub(crate) struct CaptureGuard {
    _not_send: PhantomData<*const ()>,
}

/// Enter the capture path, or `None` when forwarding must be skipped.
pub(crate) fn enter() -> Option<CaptureGuard> {
    if is_suppressed() {
        return None;
    }
    CAPTURING.try_with(|flag| flag.set(true)).ok()?;
    Some(CaptureGuard {
        _not_send: PhantomData,
    })
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        let _ = CAPTURING.try_with(|flag| flag.set(false));
    }
}

/// Permanently suppress capture on the calling thread.
pub(crate) fn mark_pipeline_thread() {
    let _ = PIPELINE_THREAD.try_with(|flag| flag.set(true));
}

/// Whether console calls on this thread are currently excluded from capture.
///
/// Thread-local storage that is already torn down counts as suppressed.
pub fn is_suppressed() -> bool {
    let pipeline = PIPELINE_THREAD.try_with(Cell::get).unwrap_or(true);
    let capturing = CAPTURING.try_with(Cell::get).unwrap_or(true);
    pipeline || capturing
}
