//! Assertion helpers. Every failure is an [`ApicheckError::Assertion`], which the runner
//! classifies as `Failed` rather than `Errored`.

use std::fmt::Debug;

use serde_json::Value;

use crate::errors::{ApicheckError, Result};
use crate::http::HttpResponse;
use crate::schema::{validate, SchemaDescription, ValidationResult};

/// Default threshold used by the injectable [`ResponseTimeCheck`].
pub const DEFAULT_MAX_RESPONSE_MS: u64 = 2000;

/// Return early from a test body with an assertion failure unless `cond` holds.
#[macro_export]
macro_rules! check {
    ($cond:expr $(,)?) => {
        $crate::check!($cond, "check failed: {}", stringify!($cond))
    };
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::errors::ApicheckError::Assertion(format!($($arg)+)));
        }
    };
}

/// Like [`check!`] but compares two values and prints both on mismatch.
#[macro_export]
macro_rules! check_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::check_eq!($left, $right, "{} != {}", stringify!($left), stringify!($right))
    };
    ($left:expr, $right:expr, $($arg:tt)+) => {
        match (&$left, &$right) {
            (left, right) => {
                if !(*left == *right) {
                    return Err($crate::errors::ApicheckError::Assertion(format!(
                        "{}: left = {:?}, right = {:?}",
                        format!($($arg)+),
                        left,
                        right
                    )));
                }
            }
        }
    };
}

/// Fails if the response took `max_ms` or longer; returns elapsed milliseconds otherwise.
pub fn assert_response_time(response: &HttpResponse, max_ms: u64) -> Result<f64> {
    let elapsed_ms = response.elapsed_ms();
    if elapsed_ms >= max_ms as f64 {
        return Err(ApicheckError::Assertion(format!(
            "response time exceeded threshold: {elapsed_ms:.1}ms >= {max_ms}ms"
        )));
    }
    Ok(elapsed_ms)
}

/// Fails with every missing field, type mismatch and format violation listed.
pub fn assert_schema(value: &Value, schema: &SchemaDescription) -> Result<()> {
    match validate(value, schema) {
        ValidationResult::Valid => Ok(()),
        ValidationResult::Invalid(violations) => Err(ApicheckError::Assertion(format!(
            "JSON schema validation failed ({} issue(s)): {violations}",
            violations.len()
        ))),
    }
}

pub fn assert_status(response: &HttpResponse, expected: u16) -> Result<()> {
    if response.status() != expected {
        return Err(ApicheckError::Assertion(format!(
            "Expected {expected}, got {} from {}",
            response.status(),
            response.url()
        )));
    }
    Ok(())
}

/// Accept any of several statuses, for endpoints whose behaviour is not pinned down.
pub fn assert_status_in(response: &HttpResponse, allowed: &[u16]) -> Result<()> {
    if !allowed.contains(&response.status()) {
        return Err(ApicheckError::Assertion(format!(
            "Expected one of {allowed:?}, got {} from {}",
            response.status(),
            response.url()
        )));
    }
    Ok(())
}

/// Look up `key` in a JSON object, failing the test when it is absent.
pub fn field<'a>(value: &'a Value, key: &str) -> Result<&'a Value> {
    value
        .get(key)
        .ok_or_else(|| ApicheckError::Assertion(format!("Response missing '{key}' field")))
}

pub fn assert_fields(value: &Value, keys: &[&str]) -> Result<()> {
    let missing: Vec<&str> = keys.iter().copied().filter(|k| value.get(k).is_none()).collect();
    if !missing.is_empty() {
        return Err(ApicheckError::Assertion(format!(
            "Response missing field(s): {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

pub fn assert_eq_value<T>(actual: &T, expected: &T, what: &str) -> Result<()>
where
    T: PartialEq + Debug + ?Sized,
{
    if actual != expected {
        return Err(ApicheckError::Assertion(format!(
            "{what}: expected {expected:?}, got {actual:?}"
        )));
    }
    Ok(())
}

/// Injectable form of [`assert_response_time`] carrying a default threshold.
#[derive(Debug, Clone, Copy)]
pub struct ResponseTimeCheck {
    pub default_max_ms: u64,
}

impl Default for ResponseTimeCheck {
    fn default() -> Self {
        Self {
            default_max_ms: DEFAULT_MAX_RESPONSE_MS,
        }
    }
}

impl ResponseTimeCheck {
    pub fn within(&self, response: &HttpResponse, max_ms: u64) -> Result<f64> {
        assert_response_time(response, max_ms)
    }

    pub fn check(&self, response: &HttpResponse) -> Result<f64> {
        assert_response_time(response, self.default_max_ms)
    }
}

/// Injectable form of [`assert_schema`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaCheck;

impl SchemaCheck {
    pub fn check(&self, value: &Value, schema: &SchemaDescription) -> Result<()> {
        assert_schema(value, schema)
    }
}
