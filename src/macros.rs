//! Console logging macros.
//!
//! Each argument is converted with `ArgValue::from`, so any mix of strings,
//! numbers, booleans, options, errors, objects and JSON values can be passed
//! in one call, mirroring a variadic console call.
//!
//! # Examples
//!
//! ```rust,ignore
//! use console_bridge::{console_log, console_warn, ObjectRef};
//!
//! let user = ObjectRef::from_entries([("id", 7)]);
//! console_log!("loaded user", &user);
//! console_warn!("retrying in", 250, "ms");
//! ```

/// Build a `Vec<ArgValue>` from heterogeneous expressions.
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::ArgValue>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::ArgValue::from($arg)),+]
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __console_emit {
    ($level:expr $(, $arg:expr)* $(,)?) => {
        $crate::console::global().emit($level, &$crate::args![$($arg),*])
    };
}

/// Call the global console's `log` method.
#[macro_export]
macro_rules! console_log {
    ($($arg:expr),* $(,)?) => {
        $crate::__console_emit!($crate::ConsoleLevel::Log $(, $arg)*)
    };
}

/// Call the global console's `info` method.
#[macro_export]
macro_rules! console_info {
    ($($arg:expr),* $(,)?) => {
        $crate::__console_emit!($crate::ConsoleLevel::Info $(, $arg)*)
    };
}

/// Call the global console's `warn` method.
#[macro_export]
macro_rules! console_warn {
    ($($arg:expr),* $(,)?) => {
        $crate::__console_emit!($crate::ConsoleLevel::Warn $(, $arg)*)
    };
}

/// Call the global console's `error` method.
#[macro_export]
macro_rules! console_error {
    ($($arg:expr),* $(,)?) => {
        $crate::__console_emit!($crate::ConsoleLevel::Error $(, $arg)*)
    };
}

/// Call the global console's `debug` method.
#[macro_export]
macro_rules! console_debug {
    ($($arg:expr),* $(,)?) => {
        $crate::__console_emit!($crate::ConsoleLevel::Debug $(, $arg)*)
    };
}

#[cfg(test)]
mod tests {
    use crate::{ArgValue, ObjectRef};

    #[test]
    fn args_converts_each_expression() {
        let obj = ObjectRef::map();
        let args = args!["text", 1.5, true, None::<i32>, &obj];
        assert!(matches!(args[0], ArgValue::String(ref s) if s == "text"));
        assert!(matches!(args[1], ArgValue::Number(n) if n == 1.5));
        assert!(matches!(args[2], ArgValue::Bool(true)));
        assert!(args[3].is_undefined());
        assert!(matches!(&args[4], ArgValue::Object(o) if o.same_node(&obj)));
    }

    #[test]
    fn empty_args() {
        assert!(args![].is_empty());
    }
}
