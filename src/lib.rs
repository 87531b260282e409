//! Console bridge: forward console-style log calls to a collector endpoint.
//!
//! Installing a bridge wraps the five severity-tagged entry points of a
//! [`Console`]. Each call still produces its original output, and a
//! serialised copy is batched and POSTed as JSON on a background worker.
//! Delivery is best effort: failed batches are dropped and nothing raised by
//! the pipeline ever reaches the caller.

mod activation;
mod bridge;
mod builder;
pub mod collector;
mod config;
pub mod console;
pub mod file_config;
mod guard;
mod level;
#[cfg(feature = "log-compat")]
pub mod log_compat;
mod log_record;
mod macros;
mod pipeline;
mod rate_limited_warner;
mod serialise;
mod sink;
mod value;

pub use activation::{ActivationPolicy, DEFAULT_ENV_VAR, default_gate, is_production_value};
pub use bridge::{
    ACTIVATION_NOTICE, BridgeHandle, ConsoleBridge, InstallError, UncaughtError,
    rejection_payload,
};
pub use builder::{BridgeBuilder, BuildError};
pub use collector::{CollectorError, CollectorReply};
pub use config::{
    BridgeConfig, DEFAULT_BASE_URL, DEFAULT_BATCH_INTERVAL, DEFAULT_ENDPOINT_PATH,
    MAX_BATCH_SIZE, OriginSource, default_origin,
};
pub use console::{Console, ConsoleMethod, SharedMethod, StreamMethod};
pub use file_config::ConfigFileError;
pub use guard::is_suppressed;
pub use level::{ConsoleLevel, UnknownLevel};
pub use log_record::{LogBatch, LogRecord};
pub use pipeline::{BatchBuffer, Pipeline, PipelineStats};
pub use rate_limited_warner::RateLimitedWarner;
pub use serialise::{serialise_args, serialise_value, tagged_error};
pub use sink::{DeliveryError, HttpSink, LogSink, ResponseClass, classify_status};
pub use value::{ArgValue, ErrorValue, MAX_DEPTH, NativeHandle, ObjectBody, ObjectRef};
