use std::borrow::Cow;
use std::sync::OnceLock;
use std::time::Duration;

use http::HeaderMap;
use serde_json::Value;

use crate::errors::{ApicheckError, Result};

/// A received response. Immutable; the JSON view is decoded at most once.
#[derive(Debug)]
pub struct HttpResponse {
    status: u16,
    url: String,
    headers: HeaderMap,
    body: Vec<u8>,
    elapsed: Duration,
    json: OnceLock<std::result::Result<Value, String>>,
}

impl HttpResponse {
    pub fn new(
        status: u16,
        url: impl Into<String>,
        headers: HeaderMap,
        body: Vec<u8>,
        elapsed: Duration,
    ) -> Self {
        Self {
            status,
            url: url.into(),
            headers,
            body,
            elapsed,
            json: OnceLock::new(),
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Time until response headers arrived.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed.as_secs_f64() * 1000.0
    }

    /// Decoded body. Repeated calls return the same value (or the same decode error).
    pub fn json(&self) -> Result<&Value> {
        self.json
            .get_or_init(|| serde_json::from_slice(&self.body).map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| ApicheckError::Decode(format!("{} (from {})", e, self.url)))
    }
}
