//! The fixture set every suite test draws from, built from a [`Config`].

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::debug;

use crate::assertions::{ResponseTimeCheck, SchemaCheck};
use crate::config::Config;
use crate::errors::Result;
use crate::fixtures::{FixtureDef, FixtureRegistry, FixtureScope};
use crate::http::{Session, SessionOptions};
use crate::schema::{post_schema, user_schema};

pub const API_SESSION: &str = "api_session";
pub const REQRES_BASE_URL: &str = "reqres_base_url";
pub const JSONPLACEHOLDER_BASE_URL: &str = "jsonplaceholder_base_url";
pub const HTTPBIN_BASE_URL: &str = "httpbin_base_url";
pub const VALID_USER_PAYLOAD: &str = "valid_user_payload";
pub const VALID_POST_PAYLOAD: &str = "valid_post_payload";
pub const USER_SCHEMA: &str = "user_schema";
pub const POST_SCHEMA: &str = "post_schema";
pub const ASSERT_RESPONSE_TIME: &str = "assert_response_time";
pub const ASSERT_JSON_SCHEMA: &str = "assert_json_schema";

pub fn valid_user_payload() -> Value {
    json!({
        "name": "QA Test User",
        "job": "Test Engineer"
    })
}

pub fn valid_post_payload() -> Value {
    json!({
        "userId": 1,
        "title": "Test Post Title",
        "body": "This is a test post body created by automated tests."
    })
}

pub fn standard_fixtures(cfg: &Config) -> Result<FixtureRegistry> {
    let mut reg = FixtureRegistry::new();
    let opts = SessionOptions::from(cfg);

    reg.register(
        FixtureDef::process(API_SESSION, move |_| Session::open(&opts)).with_teardown(
            |session: Arc<Session>| match Arc::try_unwrap(session) {
                Ok(session) => session.close(),
                Err(_) => debug!("api session still referenced at teardown"),
            },
        ),
    )?;

    for (name, url) in [
        (REQRES_BASE_URL, &cfg.reqres_url),
        (JSONPLACEHOLDER_BASE_URL, &cfg.jsonplaceholder_url),
        (HTTPBIN_BASE_URL, &cfg.httpbin_url),
    ] {
        reg.register(FixtureDef::value(name, FixtureScope::PerTest, url.clone()))?;
    }

    reg.register(FixtureDef::per_test(VALID_USER_PAYLOAD, |_| Ok(valid_user_payload())))?;
    reg.register(FixtureDef::per_test(VALID_POST_PAYLOAD, |_| Ok(valid_post_payload())))?;
    reg.register(FixtureDef::per_test(USER_SCHEMA, |_| Ok(user_schema())))?;
    reg.register(FixtureDef::per_test(POST_SCHEMA, |_| Ok(post_schema())))?;
    reg.register(FixtureDef::value(
        ASSERT_RESPONSE_TIME,
        FixtureScope::PerTest,
        ResponseTimeCheck::default(),
    ))?;
    reg.register(FixtureDef::value(ASSERT_JSON_SCHEMA, FixtureScope::PerTest, SchemaCheck))?;

    reg.validate()?;
    Ok(reg)
}
