//! Capturing wrapper installed into each console slot.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::console::{ConsoleMethod, SharedMethod};
use crate::guard;
use crate::level::ConsoleLevel;
use crate::pipeline::Pipeline;
use crate::value::ArgValue;

/// Calls the saved original, then forwards a serialised copy.
///
/// The original always runs first and always runs, so console output is the
/// same whether or not forwarding succeeds. Forwarding is skipped while this
/// thread is already capturing or is a pipeline thread.
pub(crate) struct CapturingMethod {
    level: ConsoleLevel,
    original: SharedMethod,
    pipeline: Arc<Pipeline>,
}

impl CapturingMethod {
    pub(crate) fn new(level: ConsoleLevel, original: SharedMethod, pipeline: Arc<Pipeline>) -> Self {
        Self {
            level,
            original,
            pipeline,
        }
    }
}

impl ConsoleMethod for CapturingMethod {
    fn call(&self, args: &[ArgValue]) {
        self.original.call(args);
        let Some(_guard) = guard::enter() else {
            return;
        };
        // Origin callbacks are user code; nothing may escape to the caller.
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            self.pipeline.enqueue(self.level, args);
        }));
    }
}
