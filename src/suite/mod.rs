//! The concrete cases run against the three public services.

pub mod httpbin;
pub mod jsonplaceholder;
pub mod reqres;

use serde_json::Value;

use crate::errors::{ApicheckError, Result};
use crate::runner::TestCase;

/// Every case, in discovery order.
pub fn all() -> Vec<TestCase> {
    let mut cases = reqres::cases();
    cases.extend(jsonplaceholder::cases());
    cases.extend(httpbin::cases());
    cases
}

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| ApicheckError::Assertion(format!("'{what}' should be a list")))
}

fn as_str<'a>(value: &'a Value, what: &str) -> Result<&'a str> {
    value
        .as_str()
        .ok_or_else(|| ApicheckError::Assertion(format!("'{what}' should be a string")))
}

/// `createdAt`/`updatedAt` stamps must be RFC 3339.
fn check_timestamp(value: &Value, key: &str) -> Result<()> {
    let raw = as_str(crate::assertions::field(value, key)?, key)?;
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|_| ())
        .map_err(|e| ApicheckError::Assertion(format!("'{key}' is not an RFC 3339 timestamp ({raw}): {e}")))
}
