// src/errors/mod.rs
use thiserror::Error;

/// Main error type for apicheck operations
#[derive(Error, Debug)]
pub enum ApicheckError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {elapsed_ms}ms (timeout {timeout_ms}ms)")]
    Timeout { elapsed_ms: u64, timeout_ms: u64 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("Fixture '{fixture}' failed to construct: {reason}")]
    FixtureConstruction { fixture: String, reason: String },

    #[error("Fixture dependency cycle: {}", .0.join(" -> "))]
    FixtureCycle(Vec<String>),

    #[error("Unknown fixture: {0}")]
    UnknownFixture(String),

    #[error("Fixture '{0}' was not declared as a dependency")]
    FixtureNotDeclared(String),

    #[error("Fixture '{fixture}' is not of type {expected}")]
    FixtureType { fixture: String, expected: &'static str },

    #[error("Duplicate fixture name: {0}")]
    DuplicateFixture(String),

    #[error("Scope mismatch: process fixture '{fixture}' depends on per-test fixture '{dependency}'")]
    ScopeMismatch { fixture: String, dependency: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Invalid header name: {0}")]
    HeaderName(#[from] reqwest::header::InvalidHeaderName),

    #[error("Invalid header value: {0}")]
    HeaderValue(#[from] reqwest::header::InvalidHeaderValue),

    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("URL parse error: {0}")]
    UrlParseError(#[from] url::ParseError),
}

impl ApicheckError {
    /// Assertion errors mark a test `Failed`; everything else marks it `Errored`.
    pub fn is_assertion(&self) -> bool {
        matches!(self, ApicheckError::Assertion(_))
    }

    /// Errors that invalidate the whole run rather than a single test.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ApicheckError::ConfigError(_)
                | ApicheckError::FixtureCycle(_)
                | ApicheckError::DuplicateFixture(_)
                | ApicheckError::ScopeMismatch { .. }
                | ApicheckError::SerdeYaml(_)
                | ApicheckError::UrlParseError(_)
        )
    }

    pub fn assertion(msg: impl Into<String>) -> Self {
        ApicheckError::Assertion(msg.into())
    }
}

/// Convenience Result type that uses ApicheckError
pub type Result<T> = std::result::Result<T, ApicheckError>;

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Whether a panic message came from the `assert!` family rather than e.g. an `unwrap`.
pub(crate) fn is_assertion_panic(message: &str) -> bool {
    message.starts_with("assertion failed") || message.starts_with("assertion `left")
}
