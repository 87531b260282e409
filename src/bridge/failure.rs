//! Global failure capture points: uncaught errors and unhandled rejections.
//!
//! Panics are the uncaught errors of a Rust host. The optional panic hook
//! chains whatever hook was installed before it, so the default panic output
//! is unchanged, and then queues an error-level record.

use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use serde_json::{Map, Value, json};

use crate::guard;
use crate::level::ConsoleLevel;
use crate::pipeline::Pipeline;
use crate::value::ArgValue;

/// An error that escaped to the top of the host program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UncaughtError {
    pub message: String,
    pub filename: String,
    pub lineno: u32,
    pub colno: u32,
}

impl UncaughtError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            filename: String::new(),
            lineno: 0,
            colno: 0,
        }
    }

    pub fn with_location(mut self, filename: impl Into<String>, lineno: u32, colno: u32) -> Self {
        self.filename = filename.into();
        self.lineno = lineno;
        self.colno = colno;
        self
    }

    /// Describe a panic by its payload message and source location.
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "Box<dyn Any>".to_owned());
        let error = Self::new(message);
        match info.location() {
            Some(loc) => error.with_location(loc.file(), loc.line(), loc.column()),
            None => error,
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "__type": "UncaughtError",
            "message": self.message,
            "filename": self.filename,
            "lineno": self.lineno,
            "colno": self.colno,
        })
    }
}

/// Record argument describing an unhandled rejection.
///
/// Error reasons keep their message and stack; anything else is reduced to
/// its string form.
pub fn rejection_payload(reason: &ArgValue) -> Value {
    let reason = match reason {
        ArgValue::Error(err) => {
            let mut body = Map::new();
            body.insert("message".into(), Value::String(err.message.clone()));
            if let Some(stack) = &err.stack {
                body.insert("stack".into(), Value::String(stack.clone()));
            }
            Value::Object(body)
        }
        other => Value::String(other.to_string()),
    };
    json!({ "__type": "UnhandledRejection", "reason": reason })
}

/// Queue a failure payload unless this thread is already capturing.
pub(crate) fn report(pipeline: &Pipeline, payload: Value) {
    let Some(_guard) = guard::enter() else {
        return;
    };
    // Origin callbacks are user code; nothing may escape to the caller.
    let _ = panic::catch_unwind(AssertUnwindSafe(|| {
        pipeline.enqueue_serialised(ConsoleLevel::Error, vec![payload]);
    }));
}

/// Queue a panic report from inside the panic hook.
///
/// A panic raised while the hook runs aborts the process even if caught, so
/// this path never calls back into user code.
fn report_panic(pipeline: &Pipeline, payload: Value) {
    if let Some(_guard) = guard::enter() {
        pipeline.enqueue_with_known_origin(ConsoleLevel::Error, vec![payload]);
    }
}

static HOOK_OWNED: AtomicBool = AtomicBool::new(false);

type Hook = dyn Fn(&PanicHookInfo<'_>) + Send + Sync + 'static;

/// Ownership of the process panic hook; dropping it reinstates the previous
/// hook.
pub(crate) struct PanicHookGuard {
    previous: Arc<Hook>,
}

impl PanicHookGuard {
    /// Install the capturing hook, or `None` if another bridge owns it.
    pub(crate) fn install(pipeline: Weak<Pipeline>) -> Option<Self> {
        if HOOK_OWNED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }
        let previous: Arc<Hook> = Arc::from(panic::take_hook());
        let chained = Arc::clone(&previous);
        panic::set_hook(Box::new(move |info| {
            chained(info);
            // The delivery thread must never hold the last pipeline handle.
            if guard::is_suppressed() {
                return;
            }
            if let Some(pipeline) = pipeline.upgrade() {
                report_panic(&pipeline, UncaughtError::from_panic(info).to_json());
            }
        }));
        Some(Self { previous })
    }
}

impl Drop for PanicHookGuard {
    fn drop(&mut self) {
        // `set_hook` itself panics on a panicking thread; leave ours in place.
        if !thread::panicking() {
            let previous = Arc::clone(&self.previous);
            panic::set_hook(Box::new(move |info| previous(info)));
        }
        HOOK_OWNED.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ErrorValue;

    #[test]
    fn uncaught_payload_shape() {
        let payload = UncaughtError::new("boom")
            .with_location("src/main.rs", 12, 5)
            .to_json();
        assert_eq!(
            payload,
            json!({
                "__type": "UncaughtError",
                "message": "boom",
                "filename": "src/main.rs",
                "lineno": 12,
                "colno": 5,
            })
        );
        let keys: Vec<&str> = payload
            .as_object()
            .expect("object")
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, ["__type", "message", "filename", "lineno", "colno"]);
    }

    #[test]
    fn error_rejection_keeps_message_and_stack() {
        let reason = ArgValue::Error(ErrorValue::new("TypeError", "bad").with_stack("at f"));
        assert_eq!(
            rejection_payload(&reason),
            json!({ "__type": "UnhandledRejection", "reason": { "message": "bad", "stack": "at f" } })
        );
    }

    #[test]
    fn other_rejections_use_string_form() {
        assert_eq!(
            rejection_payload(&ArgValue::from("timeout")),
            json!({ "__type": "UnhandledRejection", "reason": "timeout" })
        );
        assert_eq!(
            rejection_payload(&ArgValue::Undefined),
            json!({ "__type": "UnhandledRejection", "reason": "undefined" })
        );
    }
}
