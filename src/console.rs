//! The process-wide logging surface that the bridge overrides.
//!
//! A [`Console`] holds one swappable method per severity. Application code
//! logs through it (directly or with the `console_*!` macros); the bridge
//! replaces the slots with capturing wrappers and puts the originals back on
//! restore. Slots hold `Arc`s so callers can check identity with
//! [`Arc::ptr_eq`].

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::level::ConsoleLevel;
use crate::serialise::serialise_value;
use crate::value::ArgValue;

/// One logging entry point.
pub trait ConsoleMethod: Send + Sync {
    fn call(&self, args: &[ArgValue]);
}

impl<F> ConsoleMethod for F
where
    F: Fn(&[ArgValue]) + Send + Sync,
{
    fn call(&self, args: &[ArgValue]) {
        self(args)
    }
}

/// Shared handle to a console method; slot identity is `Arc` identity.
pub type SharedMethod = Arc<dyn ConsoleMethod>;

/// Render arguments the way the default console prints them: strings
/// verbatim, everything else as compact JSON, separated by spaces.
pub fn render_line(args: &[ArgValue]) -> String {
    args.iter()
        .map(|arg| match arg {
            ArgValue::String(s) => s.clone(),
            ArgValue::Error(err) => err.to_string(),
            other => match serialise_value(other) {
                Value::String(s) => s,
                json => json.to_string(),
            },
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Writes each call as one rendered line.
pub struct StreamMethod {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl StreamMethod {
    pub fn new<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl ConsoleMethod for StreamMethod {
    fn call(&self, args: &[ArgValue]) {
        let line = render_line(args);
        let mut writer = self.writer.lock();
        // Console output has nowhere to report its own failures.
        let _ = writeln!(writer, "{line}").and_then(|_| writer.flush());
    }
}

impl fmt::Debug for StreamMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamMethod")
    }
}

/// Five severity-tagged entry points.
pub struct Console {
    slots: [RwLock<SharedMethod>; 5],
    bridged: AtomicBool,
}

impl Console {
    /// Build a console with one method per level.
    pub fn from_fn(mut make: impl FnMut(ConsoleLevel) -> SharedMethod) -> Self {
        Self {
            slots: ConsoleLevel::ALL.map(|level| RwLock::new(make(level))),
            bridged: AtomicBool::new(false),
        }
    }

    /// Debug, info and log go to stdout; warn and error go to stderr.
    pub fn stdio() -> Self {
        let out: SharedMethod = Arc::new(StreamMethod::stdout());
        let err: SharedMethod = Arc::new(StreamMethod::stderr());
        Self::from_fn(|level| {
            if level.is_diagnostic() {
                Arc::clone(&err)
            } else {
                Arc::clone(&out)
            }
        })
    }

    /// The method currently installed for `level`.
    pub fn method(&self, level: ConsoleLevel) -> SharedMethod {
        Arc::clone(&self.slots[level.index()].read())
    }

    /// Install `method` for `level`, returning the previous one.
    pub fn replace(&self, level: ConsoleLevel, method: SharedMethod) -> SharedMethod {
        std::mem::replace(&mut *self.slots[level.index()].write(), method)
    }

    /// Current methods in [`ConsoleLevel::ALL`] order.
    pub fn snapshot(&self) -> [SharedMethod; 5] {
        ConsoleLevel::ALL.map(|level| self.method(level))
    }

    /// Call the method for `level`. The slot lock is released before the call
    /// so methods may log or swap slots themselves.
    pub fn emit(&self, level: ConsoleLevel, args: &[ArgValue]) {
        let method = self.method(level);
        method.call(args);
    }

    pub fn log(&self, args: &[ArgValue]) {
        self.emit(ConsoleLevel::Log, args);
    }

    pub fn info(&self, args: &[ArgValue]) {
        self.emit(ConsoleLevel::Info, args);
    }

    pub fn warn(&self, args: &[ArgValue]) {
        self.emit(ConsoleLevel::Warn, args);
    }

    pub fn error(&self, args: &[ArgValue]) {
        self.emit(ConsoleLevel::Error, args);
    }

    pub fn debug(&self, args: &[ArgValue]) {
        self.emit(ConsoleLevel::Debug, args);
    }

    /// Whether a bridge is currently installed on this console.
    pub fn is_bridged(&self) -> bool {
        self.bridged.load(Ordering::Acquire)
    }

    pub(crate) fn claim_bridge(&self) -> bool {
        self.bridged
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release_bridge(&self) {
        self.bridged.store(false, Ordering::Release);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::stdio()
    }
}

impl fmt::Debug for Console {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console")
            .field("bridged", &self.is_bridged())
            .finish_non_exhaustive()
    }
}

static GLOBAL: Lazy<Arc<Console>> = Lazy::new(|| Arc::new(Console::stdio()));

/// The process-wide console used by the `console_*!` macros.
pub fn global() -> &'static Arc<Console> {
    &GLOBAL
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    type Lines = Arc<Mutex<Vec<(ConsoleLevel, String)>>>;

    fn recording_console(lines: &Lines) -> Console {
        Console::from_fn(|level| {
            let lines = Arc::clone(lines);
            Arc::new(move |args: &[ArgValue]| lines.lock().push((level, render_line(args))))
        })
    }

    #[rstest]
    #[case(vec![ArgValue::from("plain"), ArgValue::from(3)], "plain 3")]
    #[case(vec![ArgValue::Undefined, ArgValue::Null], "undefined null")]
    #[case(vec![ArgValue::from(json!({"a": 1}))], r#"{"a":1}"#)]
    #[case(vec![ArgValue::error(&std::fmt::Error)], "Error: an error occurred when formatting an argument")]
    fn renders_args_like_a_console(#[case] args: Vec<ArgValue>, #[case] expected: &str) {
        assert_eq!(render_line(&args), expected);
    }

    #[test]
    fn emit_dispatches_to_level_slot() {
        let lines = Lines::default();
        let console = recording_console(&lines);
        console.warn(&[ArgValue::from("careful")]);
        console.debug(&[ArgValue::from("detail")]);
        assert_eq!(
            *lines.lock(),
            vec![
                (ConsoleLevel::Warn, "careful".to_owned()),
                (ConsoleLevel::Debug, "detail".to_owned()),
            ]
        );
    }

    #[test]
    fn replace_returns_previous_method() {
        let console = Console::from_fn(|_| Arc::new(|_: &[ArgValue]| {}));
        let before = console.method(ConsoleLevel::Info);
        let replacement: SharedMethod = Arc::new(|_: &[ArgValue]| {});
        let previous = console.replace(ConsoleLevel::Info, Arc::clone(&replacement));
        assert!(Arc::ptr_eq(&before, &previous));
        assert!(Arc::ptr_eq(&console.method(ConsoleLevel::Info), &replacement));
    }

    #[test]
    fn methods_may_swap_slots_while_running() {
        let console = Arc::new(Console::from_fn(|_| Arc::new(|_: &[ArgValue]| {})));
        let weak = Arc::downgrade(&console);
        console.replace(
            ConsoleLevel::Log,
            Arc::new(move |_: &[ArgValue]| {
                if let Some(console) = weak.upgrade() {
                    console.replace(ConsoleLevel::Log, Arc::new(|_: &[ArgValue]| {}));
                }
            }),
        );
        console.log(&[]);
    }

    #[test]
    fn stream_method_writes_one_line_per_call() {
        let buffer = Arc::new(Mutex::new(Vec::<u8>::new()));
        struct Shared(Arc<Mutex<Vec<u8>>>);
        impl Write for Shared {
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                self.0.lock().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let method = StreamMethod::new(Shared(Arc::clone(&buffer)));
        method.call(&[ArgValue::from("a"), ArgValue::from(true)]);
        method.call(&[ArgValue::from("b")]);
        assert_eq!(String::from_utf8_lossy(&buffer.lock()), "a true\nb\n");
    }

    #[test]
    fn bridge_claim_is_exclusive() {
        let console = Console::stdio();
        assert!(console.claim_bridge());
        assert!(!console.claim_bridge());
        console.release_bridge();
        assert!(!console.is_bridged());
    }
}
