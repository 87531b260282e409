//! INI configuration files.
//!
//! Options live in a `[console_bridge]` section and map one-to-one onto
//! [`BridgeBuilder`] setters:
//!
//! ```ini
//! [console_bridge]
//! base_url = http://localhost:3000
//! path = /api/logs
//! batch_interval_ms = 100
//! max_batch_size = 20
//! capture_panics = true
//! activation = non_production
//! env_var = APP_ENV
//! header.X-Session = dev
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use crate::activation::{ActivationPolicy, DEFAULT_ENV_VAR};
use crate::builder::BridgeBuilder;

/// Section holding bridge options.
pub const SECTION: &str = "console_bridge";

const HEADER_PREFIX: &str = "header.";

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("{0} doesn't exist")]
    NotFound(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} is an empty file")]
    Empty(String),
    #[error("{path} is invalid: {message}")]
    Invalid { path: String, message: String },
    #[error("{0} has no [console_bridge] section")]
    MissingSection(String),
    #[error("unknown key {0:?} in [console_bridge]")]
    UnknownKey(String),
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Read a builder from an INI file on disk.
pub fn load_builder(path: impl AsRef<Path>) -> Result<BridgeBuilder, ConfigFileError> {
    let path = path.as_ref();
    let label = path.display().to_string();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(ConfigFileError::NotFound(label));
        }
        Err(source) => return Err(ConfigFileError::Io { path: label, source }),
    };
    if text.trim().is_empty() {
        return Err(ConfigFileError::Empty(label));
    }
    parse_builder(&label, &text)
}

/// Parse INI text; `label` names the source in error messages.
pub fn parse_builder(label: &str, text: &str) -> Result<BridgeBuilder, ConfigFileError> {
    let ini = Ini::load_from_str(text).map_err(|err| ConfigFileError::Invalid {
        path: label.to_owned(),
        message: err.to_string(),
    })?;
    let section = ini
        .section(Some(SECTION))
        .ok_or_else(|| ConfigFileError::MissingSection(label.to_owned()))?;

    let mut builder = BridgeBuilder::new();
    let mut activation: Option<String> = None;
    let mut env_var: Option<String> = None;
    for (key, value) in section.iter() {
        let value = value.trim();
        if let Some(name) = key.strip_prefix(HEADER_PREFIX) {
            builder = builder.with_header(name, value);
            continue;
        }
        builder = match key {
            "base_url" => builder.with_base_url(value),
            "path" => builder.with_path(value),
            "origin" => builder.with_origin(value),
            "batch_interval_ms" => builder.with_batch_interval_ms(parse(key, value)?),
            "max_batch_size" => builder.with_max_batch_size(parse(key, value)?),
            "command_capacity" => builder.with_command_capacity(parse(key, value)?),
            "connect_timeout_ms" => builder.with_connect_timeout_ms(parse(key, value)?),
            "request_timeout_ms" => builder.with_request_timeout_ms(parse(key, value)?),
            "shutdown_timeout_ms" => builder.with_shutdown_timeout_ms(parse(key, value)?),
            "warn_interval_ms" => builder.with_warn_interval_ms(parse(key, value)?),
            "capture_panics" => builder.with_capture_panics(parse_bool(key, value)?),
            "announce" => builder.with_announce(parse_bool(key, value)?),
            "activation" => {
                activation = Some(value.to_ascii_lowercase());
                builder
            }
            "env_var" => {
                env_var = Some(value.to_owned());
                builder
            }
            other => return Err(ConfigFileError::UnknownKey(other.to_owned())),
        };
    }
    let policy = parse_policy(activation.as_deref(), env_var)?;
    Ok(builder.with_activation(policy))
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigFileError> {
    value.parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigFileError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn parse_policy(
    activation: Option<&str>,
    env_var: Option<String>,
) -> Result<ActivationPolicy, ConfigFileError> {
    match activation {
        Some("always") => Ok(ActivationPolicy::Always),
        Some("never") => Ok(ActivationPolicy::Never),
        None | Some("non_production") => Ok(ActivationPolicy::NonProduction {
            var: env_var.unwrap_or_else(|| DEFAULT_ENV_VAR.to_owned()),
        }),
        Some(other) => Err(invalid("activation", other)),
    }
}

fn invalid(key: &str, value: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        key: key.to_owned(),
        value: value.to_owned(),
    }
}
