//! HTTP sink posting batches to the collector.
//!
//! The sink keeps a ureq `Agent` for connection pooling. Timeouts are only
//! applied when configured.

use ureq::{Agent, AgentBuilder};

use crate::config::BridgeConfig;
use crate::log_record::LogBatch;

use super::{DeliveryError, LogSink};

/// Classification of an HTTP response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    /// 2xx responses.
    Success,
    /// Anything else. Failures are never retried.
    Failure,
}

/// Classifies an HTTP status code.
///
/// * **2xx** → [`ResponseClass::Success`]
/// * **Other** → [`ResponseClass::Failure`]
pub fn classify_status(status: u16) -> ResponseClass {
    match status {
        200..=299 => ResponseClass::Success,
        _ => ResponseClass::Failure,
    }
}

/// Sink POSTing `{ "logs": [...] }` as JSON to the collector endpoint.
pub struct HttpSink {
    agent: Agent,
    url: String,
    headers: Vec<(String, String)>,
}

impl HttpSink {
    pub fn new(config: &BridgeConfig) -> Self {
        let mut builder = AgentBuilder::new();
        if let Some(timeout) = config.connect_timeout {
            builder = builder.timeout_connect(timeout);
        }
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            url: config.endpoint_url(),
            headers: config
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn post(&self, body: &str) -> Result<ureq::Response, Box<ureq::Error>> {
        let mut req = self
            .agent
            .post(&self.url)
            .set("Content-Type", "application/json");
        for (key, value) in &self.headers {
            req = req.set(key, value);
        }
        req.send_string(body).map_err(Box::new)
    }
}

impl LogSink for HttpSink {
    fn deliver(&mut self, batch: &LogBatch) -> Result<(), DeliveryError> {
        let body = serde_json::to_string(batch)?;
        match self.post(&body) {
            Ok(response) => match classify_status(response.status()) {
                ResponseClass::Success => Ok(()),
                ResponseClass::Failure => Err(DeliveryError::Status(response.status())),
            },
            Err(err) => match *err {
                ureq::Error::Status(code, _) => Err(DeliveryError::Status(code)),
                ureq::Error::Transport(transport) => {
                    Err(DeliveryError::Transport(transport.to_string()))
                }
            },
        }
    }
}

impl std::fmt::Debug for HttpSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSink").field("url", &self.url).finish()
    }
}
