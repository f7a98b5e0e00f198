mod middleware;
pub mod request;
pub mod response;

use std::time::{Duration, Instant};

use http::header::{AUTHORIZATION, CONTENT_TYPE};
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use reqwest_middleware::ClientWithMiddleware;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{ApicheckError, Result};

pub use request::{BasicAuth, HttpRequestSpec, RequestBody};
pub use response::HttpResponse;

/// Settings fixed for the lifetime of a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub default_headers: IndexMap<String, String>,
    pub user_agent: Option<String>,
    pub timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            default_headers: IndexMap::new(),
            user_agent: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Config> for SessionOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            default_headers: cfg.default_headers.clone(),
            user_agent: Some(cfg.user_agent.clone()),
            timeout: cfg.timeout(),
        }
    }
}

/// Pooled HTTP session. Cheap to clone; clones share one connection pool and the
/// pool is released when the last clone is dropped.
#[derive(Clone)]
pub struct Session {
    client: ClientWithMiddleware,
    timeout: Duration,
}

impl Session {
    pub fn open(opts: &SessionOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &opts.default_headers {
            headers.insert(
                HeaderName::from_bytes(key.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Some(Duration::from_secs(60)));
        if let Some(ua) = &opts.user_agent {
            builder = builder.user_agent(ua.as_str());
        }
        let client = middleware::build_client_with_logging(builder.build()?);

        info!(timeout_ms = opts.timeout.as_millis() as u64, "http session opened");
        Ok(Self {
            client,
            timeout: opts.timeout,
        })
    }

    pub fn default_timeout(&self) -> Duration {
        self.timeout
    }

    /// Perform one call. Waits for headers (and then the body) or the timeout; never retries.
    pub async fn request(&self, spec: &HttpRequestSpec) -> Result<HttpResponse> {
        let timeout = spec.request_timeout().unwrap_or(self.timeout);
        let mut req = self
            .client
            .request(spec.method().clone(), spec.url())
            .timeout(timeout);

        if !spec.query().is_empty() {
            req = req.query(spec.query());
        }
        for (key, value) in spec.headers() {
            req = req.header(
                HeaderName::from_bytes(key.as_bytes())?,
                HeaderValue::from_str(value)?,
            );
        }
        if let Some(auth) = spec.auth() {
            req = req.header(AUTHORIZATION, HeaderValue::from_str(&auth.header_value())?);
        }
        match spec.body() {
            Some(RequestBody::Json(value)) => {
                req = req
                    .header(CONTENT_TYPE, "application/json")
                    .body(serde_json::to_vec(value)?);
            }
            Some(RequestBody::Form(pairs)) => {
                req = req.form(pairs);
            }
            Some(RequestBody::Raw {
                content_type,
                content,
            }) => {
                req = req
                    .header(CONTENT_TYPE, HeaderValue::from_str(content_type)?)
                    .body(content.clone());
            }
            None => {}
        }

        let started = Instant::now();
        let resp = req
            .send()
            .await
            .map_err(|e| map_send_error(e, started.elapsed(), timeout))?;
        let elapsed = started.elapsed();

        let status = resp.status().as_u16();
        let url = resp.url().to_string();
        let headers = resp.headers().clone();
        let body = resp
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, started.elapsed(), timeout))?;

        debug!(status, elapsed_ms = elapsed.as_millis() as u64, bytes = body.len(), "response received");
        Ok(HttpResponse::new(status, url, headers, body.to_vec(), elapsed))
    }

    pub async fn get(&self, url: impl Into<String>) -> Result<HttpResponse> {
        self.request(&HttpRequestSpec::get(url)).await
    }

    pub async fn post(&self, url: impl Into<String>, body: Value) -> Result<HttpResponse> {
        self.request(&HttpRequestSpec::post(url).json(body)).await
    }

    pub async fn put(&self, url: impl Into<String>, body: Value) -> Result<HttpResponse> {
        self.request(&HttpRequestSpec::put(url).json(body)).await
    }

    pub async fn patch(&self, url: impl Into<String>, body: Value) -> Result<HttpResponse> {
        self.request(&HttpRequestSpec::patch(url).json(body)).await
    }

    pub async fn delete(&self, url: impl Into<String>) -> Result<HttpResponse> {
        self.request(&HttpRequestSpec::delete(url)).await
    }

    /// Release this handle. Pooled connections close once every clone is gone.
    pub fn close(self) {
        debug!("http session closed");
    }
}

fn map_send_error(err: reqwest_middleware::Error, elapsed: Duration, timeout: Duration) -> ApicheckError {
    match err {
        reqwest_middleware::Error::Reqwest(e) => map_reqwest_error(e, elapsed, timeout),
        reqwest_middleware::Error::Middleware(e) => ApicheckError::Network(format!("{e:#}")),
    }
}

fn map_reqwest_error(err: reqwest::Error, elapsed: Duration, timeout: Duration) -> ApicheckError {
    if err.is_timeout() {
        return ApicheckError::Timeout {
            elapsed_ms: elapsed.as_millis() as u64,
            timeout_ms: timeout.as_millis() as u64,
        };
    }
    if err.is_builder() {
        return ApicheckError::Reqwest(err);
    }
    ApicheckError::Network(error_chain(&err))
}

// reqwest's Display omits the io/dns cause, which is the useful part.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
