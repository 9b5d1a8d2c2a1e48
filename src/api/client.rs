//! Transport adapter for the Amplitude REST API.
//!
//! One [`ApiRequest`] in, one decoded [`Payload`] or [`AmplitudeError`] out.
//! Requests are attempted exactly once.

use std::time::Instant;

use reqwest::{StatusCode, Url};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::auth::auth_headers;
use super::decode::{decode_export, ExportBatch};
use super::request::{ApiRequest, ResponseKind};
use crate::config::Config;
use crate::error::{AmplitudeError, Result};

/// Successfully decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Export(ExportBatch),
}

impl Payload {
    /// JSON view of the payload; export records become an array.
    pub fn into_json(self) -> Value {
        match self {
            Payload::Json(value) => value,
            Payload::Export(batch) => Value::Array(batch.records),
        }
    }
}

pub struct AmplitudeClient {
    base_url: Url,
    client: reqwest::Client,
}

impl AmplitudeClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            AmplitudeError::config(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AmplitudeError::config(format!(
                "invalid base URL '{}'",
                config.base_url
            )));
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(auth_headers(&config.credentials)?)
            .user_agent(concat!("amplitude_mcp/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| AmplitudeError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { base_url, client })
    }

    /// Absolute URL (without query) for a request on the configured host
    pub fn url_for(&self, request: &ApiRequest) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base was rejected in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(&request.segments);
        }
        url
    }

    pub async fn execute(&self, request: &ApiRequest) -> Result<Payload> {
        let operation = request.operation;
        let url = self.url_for(request);
        let started = Instant::now();

        debug!(
            operation,
            method = %request.method,
            path = %request.path(),
            "sending Amplitude request"
        );

        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(operation, error = %e, "Amplitude request failed");
            AmplitudeError::transport(operation, &e)
        })?;

        let status = response.status();
        debug!(
            operation,
            %status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "received Amplitude response"
        );

        if request.response == ResponseKind::Export {
            match status {
                StatusCode::NOT_FOUND => {
                    debug!(operation, "no export data in range");
                    return Ok(Payload::Export(ExportBatch::default()));
                }
                StatusCode::BAD_REQUEST => return Err(AmplitudeError::ExportTooLarge),
                StatusCode::GATEWAY_TIMEOUT => return Err(AmplitudeError::ExportTimeout),
                _ => {}
            }
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = api_error(status, &body, request.structured_errors);
            warn!(operation, %status, error = %err, "Amplitude returned an error");
            return Err(err);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AmplitudeError::transport(operation, &e))?;

        match request.response {
            ResponseKind::Json => decode_json(operation, &body).map(Payload::Json),
            ResponseKind::Export => {
                let batch = tokio::task::spawn_blocking(move || decode_export(&body))
                    .await
                    .map_err(|e| AmplitudeError::decode(operation, e))??;
                if batch.skipped_lines > 0 {
                    warn!(
                        operation,
                        skipped_lines = batch.skipped_lines,
                        records = batch.records.len(),
                        "skipped malformed export lines"
                    );
                }
                Ok(Payload::Export(batch))
            }
        }
    }
}

fn decode_json(operation: &'static str, body: &[u8]) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| AmplitudeError::decode(operation, e))
}

/// Build the error for a non-2xx response from its body, or the status line
/// when the body is empty.
pub fn api_error(status: StatusCode, body: &str, structured: bool) -> AmplitudeError {
    let body = body.trim();
    let message = if body.is_empty() {
        status_line(status)
    } else if structured {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => structured_message(&map).unwrap_or_else(|| body.to_string()),
            _ => body.to_string(),
        }
    } else {
        body.to_string()
    };

    AmplitudeError::Api {
        status: status.as_u16(),
        message,
    }
}

fn status_line(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {}", status.as_u16(), reason),
        None => status.as_u16().to_string(),
    }
}

/// `{error, code?, message?}` -> "error: message (code N)"
fn structured_message(map: &Map<String, Value>) -> Option<String> {
    let text = |key: &str| -> Option<String> {
        match map.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::String(_) | Value::Null => None,
            other => Some(other.to_string()),
        }
    };

    let mut message = text("error")?;
    if let Some(detail) = text("message").filter(|d| *d != message) {
        message.push_str(": ");
        message.push_str(&detail);
    }
    if let Some(code) = text("code") {
        message.push_str(&format!(" (code {})", code));
    }
    Some(message)
}
