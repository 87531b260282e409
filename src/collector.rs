//! Reference behaviour for the receiving end of the wire contract.
//!
//! The collector accepts `{ "logs": [...] }`, re-emits each record as a line
//! prefixed by its severity and acknowledges with `{ "ok": true }`. It refuses
//! to serve in production. This module is transport-agnostic: a host plugs
//! [`handle_request`] into whatever HTTP server it already runs.

use serde_json::{Value, json};
use thiserror::Error;

use crate::log_record::{LogBatch, LogRecord};

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

/// Parse a request body into a batch.
pub fn parse_batch(body: &[u8]) -> Result<LogBatch, CollectorError> {
    Ok(serde_json::from_slice(body)?)
}

/// `[BROWSER:<LEVEL>] arg arg ...`; strings are printed verbatim and other
/// values as pretty JSON.
pub fn render_record(record: &LogRecord) -> String {
    let mut line = format!("[BROWSER:{}]", record.level());
    for arg in record.args() {
        line.push(' ');
        match arg {
            Value::String(s) => line.push_str(s),
            Value::Object(_) | Value::Array(_) | Value::Null => {
                let pretty = serde_json::to_string_pretty(arg).unwrap_or_else(|_| arg.to_string());
                line.push_str(&pretty);
            }
            other => line.push_str(&other.to_string()),
        }
    }
    line
}

/// Response produced for one collector request.
#[derive(Clone, Debug, PartialEq)]
pub struct CollectorReply {
    pub status: u16,
    pub body: Value,
    /// Rendered output lines, one per record, in request order.
    pub lines: Vec<String>,
}

/// Handle one POSTed body.
///
/// * production ⇒ 404 `{ "error": "Not available" }`
/// * unparsable body ⇒ 400 `{ "error": "Invalid request" }`
/// * otherwise ⇒ 200 `{ "ok": true }` plus the rendered lines
pub fn handle_request(body: &[u8], production: bool) -> CollectorReply {
    if production {
        return CollectorReply {
            status: 404,
            body: json!({ "error": "Not available" }),
            lines: Vec::new(),
        };
    }
    match parse_batch(body) {
        Ok(batch) => CollectorReply {
            status: 200,
            body: json!({ "ok": true }),
            lines: batch.logs.iter().map(render_record).collect(),
        },
        Err(err) => {
            log::debug!("collector rejected request: {err}");
            CollectorReply {
                status: 400,
                body: json!({ "error": "Invalid request" }),
                lines: Vec::new(),
            }
        }
    }
}
