//! Argument values accepted by the console entry points.
//!
//! [`ArgValue`] is a closed set of shapes the serializer knows how to handle:
//! primitives, the two "empty" markers, error-like values, structural
//! objects/arrays, and opaque platform handles. Objects are shared,
//! interior-mutable nodes so callers can build graphs that refer back to
//! themselves; the serializer detects those cycles instead of recursing
//! forever.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;

/// Deepest object nesting the serializer and string coercion will walk.
pub const MAX_DEPTH: usize = 256;

/// A single argument passed to a console entry point.
#[derive(Clone, Debug)]
pub enum ArgValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Error(ErrorValue),
    Object(ObjectRef),
    Native(NativeHandle),
}

impl ArgValue {
    /// Convert any serde value into an argument.
    ///
    /// Values serde cannot represent degrade to a descriptive string.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(json) => json.into(),
            Err(err) => ArgValue::String(format!("[unserializable: {err}]")),
        }
    }

    /// Wrap a Rust error as an error-like argument.
    pub fn error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        ArgValue::Error(ErrorValue::from_error(err))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, ArgValue::Undefined)
    }
}

/// An error-like value exposing `name`, `message` and `stack`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
    pub stack: Option<String>,
}

impl ErrorValue {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Build an error value from a Rust error.
    ///
    /// `name` is the unqualified type name; the stack text lists the error
    /// followed by its `source()` chain.
    pub fn from_error<E: std::error::Error + ?Sized>(err: &E) -> Self {
        let name = short_type_name(std::any::type_name::<E>()).to_owned();
        let message = err.to_string();
        let mut stack = format!("{name}: {message}");
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push_str("\n    caused by: ");
            stack.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            name,
            message,
            stack: Some(stack),
        }
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}: {}", self.name, self.message)
        }
    }
}

fn short_type_name(full: &str) -> &str {
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
        .trim_start_matches("dyn ")
}

/// Platform handles that cannot be copied structurally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeHandle {
    Element { tag_name: String },
    Window,
    Document,
}

impl NativeHandle {
    /// An element handle; tag names are upper-cased like the DOM reports them.
    pub fn element(tag_name: impl AsRef<str>) -> Self {
        NativeHandle::Element {
            tag_name: tag_name.as_ref().to_ascii_uppercase(),
        }
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeHandle::Element { tag_name } => write!(f, "[HTMLElement: {tag_name}]"),
            NativeHandle::Window => f.write_str("[Window]"),
            NativeHandle::Document => f.write_str("[Document]"),
        }
    }
}

/// Contents of an [`ObjectRef`] node.
#[derive(Clone, Debug)]
pub enum ObjectBody {
    /// Keyed entries in insertion order.
    Map(Vec<(String, ArgValue)>),
    Array(Vec<ArgValue>),
}

/// Shared handle to a map or array node.
///
/// Cloning the handle aliases the same node, so a node can be inserted into
/// itself. Such cycles keep the node alive until [`ObjectRef::clear`] breaks
/// them.
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<ObjectBody>>);

impl ObjectRef {
    pub fn map() -> Self {
        Self::with_body(ObjectBody::Map(Vec::new()))
    }

    pub fn array() -> Self {
        Self::with_body(ObjectBody::Array(Vec::new()))
    }

    pub fn with_body(body: ObjectBody) -> Self {
        Self(Arc::new(RwLock::new(body)))
    }

    pub fn from_entries<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<ArgValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::with_body(ObjectBody::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    pub fn from_items<V, I>(items: I) -> Self
    where
        V: Into<ArgValue>,
        I: IntoIterator<Item = V>,
    {
        Self::with_body(ObjectBody::Array(items.into_iter().map(Into::into).collect()))
    }

    /// Set `key` on a map node, replacing any existing entry.
    ///
    /// Has no effect on array nodes.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<ArgValue>) -> &Self {
        if let ObjectBody::Map(entries) = &mut *self.0.write() {
            let key = key.into();
            let value = value.into();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        self
    }

    /// Append to an array node. Has no effect on map nodes.
    pub fn push(&self, value: impl Into<ArgValue>) -> &Self {
        if let ObjectBody::Array(items) = &mut *self.0.write() {
            items.push(value.into());
        }
        self
    }

    /// Remove every entry, breaking any cycles through this node.
    pub fn clear(&self) {
        match &mut *self.0.write() {
            ObjectBody::Map(entries) => entries.clear(),
            ObjectBody::Array(items) => items.clear(),
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(&*self.0.read(), ObjectBody::Array(_))
    }

    pub fn len(&self) -> usize {
        match &*self.0.read() {
            ObjectBody::Map(entries) => entries.len(),
            ObjectBody::Array(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether both handles alias the same node.
    pub fn same_node(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, ObjectBody> {
        self.0.read()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Entries are not printed: the node may contain itself.
        f.debug_struct("ObjectRef")
            .field("id", &format_args!("{:#x}", self.id()))
            .field("array", &self.is_array())
            .field("len", &self.len())
            .finish()
    }
}

/// Format a number the way script string coercion does.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_owned()
    } else if n == 0.0 {
        "0".to_owned()
    } else {
        n.to_string()
    }
}

impl fmt::Display for ArgValue {
    /// Best-effort string coercion; never fails on cyclic input.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_coerced(self, f, &mut Vec::new())
    }
}

fn write_coerced(value: &ArgValue, f: &mut fmt::Formatter<'_>, path: &mut Vec<usize>) -> fmt::Result {
    match value {
        ArgValue::Undefined => f.write_str("undefined"),
        ArgValue::Null => f.write_str("null"),
        ArgValue::Bool(b) => write!(f, "{b}"),
        ArgValue::Number(n) => f.write_str(&format_number(*n)),
        ArgValue::String(s) => f.write_str(s),
        ArgValue::Error(err) => write!(f, "{err}"),
        ArgValue::Native(handle) => write!(f, "{handle}"),
        ArgValue::Object(obj) => {
            let id = obj.id();
            // Only arrays recurse, so only arrays ever sit on the path.
            if path.contains(&id) || path.len() >= MAX_DEPTH {
                return Ok(());
            }
            let body = obj.read();
            match &*body {
                ObjectBody::Map(_) => f.write_str("[object Object]"),
                ObjectBody::Array(items) => {
                    path.push(id);
                    for (i, item) in items.iter().enumerate() {
                        if i > 0 {
                            f.write_str(",")?;
                        }
                        if !matches!(item, ArgValue::Undefined | ArgValue::Null) {
                            write_coerced(item, f, path)?;
                        }
                    }
                    path.pop();
                    Ok(())
                }
            }
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        ArgValue::String(value.to_owned())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        ArgValue::String(value)
    }
}

impl From<&String> for ArgValue {
    fn from(value: &String) -> Self {
        ArgValue::String(value.clone())
    }
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        ArgValue::Bool(value)
    }
}

macro_rules! number_from {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for ArgValue {
                fn from(value: $ty) -> Self {
                    ArgValue::Number(value as f64)
                }
            }
        )*
    };
}

number_from!(f32, f64, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl<T: Into<ArgValue>> From<Option<T>> for ArgValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ArgValue::Undefined, Into::into)
    }
}

impl From<ErrorValue> for ArgValue {
    fn from(value: ErrorValue) -> Self {
        ArgValue::Error(value)
    }
}

impl From<NativeHandle> for ArgValue {
    fn from(value: NativeHandle) -> Self {
        ArgValue::Native(value)
    }
}

impl From<ObjectRef> for ArgValue {
    fn from(value: ObjectRef) -> Self {
        ArgValue::Object(value)
    }
}

impl From<&ObjectRef> for ArgValue {
    fn from(value: &ObjectRef) -> Self {
        ArgValue::Object(value.clone())
    }
}

impl From<&ArgValue> for ArgValue {
    fn from(value: &ArgValue) -> Self {
        value.clone()
    }
}

impl From<serde_json::Value> for ArgValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ArgValue::Null,
            Value::Bool(b) => ArgValue::Bool(b),
            Value::Number(n) => ArgValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => ArgValue::String(s),
            Value::Array(items) => ArgValue::Object(ObjectRef::from_items(items)),
            Value::Object(map) => ArgValue::Object(ObjectRef::from_entries(map)),
        }
    }
}
