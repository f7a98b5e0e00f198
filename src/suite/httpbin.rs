//! Request/response echo service: verbs, status codes, headers, auth, encodings.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use super::as_str;
use crate::assertions::{assert_fields, assert_status, field};
use crate::errors::Result;
use crate::fixtures::catalog::{API_SESSION, HTTPBIN_BASE_URL};
use crate::fixtures::Fixtures;
use crate::http::{HttpRequestSpec, Session};
use crate::runner::{Tag, TestCase};
use crate::{check, check_eq};

const BASE: &[&str] = &[API_SESSION, HTTPBIN_BASE_URL];

const DELAY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn cases() -> Vec<TestCase> {
    vec![
        case("get_request", &[Tag::Smoke], get_request),
        case("post_with_json", &[Tag::Smoke, Tag::Crud], post_with_json),
        case("put_request", &[Tag::Crud], put_request),
        case("delete_request", &[Tag::Crud], delete_request),
        case("status_code_404", &[Tag::Smoke], status_code_404),
        case("status_code_500", &[Tag::Negative], status_code_500),
        case("headers_validation", &[Tag::Regression], headers_validation),
        case("response_delay", &[Tag::Performance], response_delay),
        case("basic_auth_success", &[Tag::Auth], basic_auth_success),
        case("basic_auth_failure", &[Tag::Auth, Tag::Negative], basic_auth_failure),
        case("get_with_query_params", &[Tag::Regression], get_with_query_params),
        case("post_form_data", &[Tag::Regression], post_form_data),
        case("user_agent", &[Tag::Regression], user_agent),
        case("gzip_compression", &[Tag::Regression], gzip_compression),
        case("response_content_types", &[Tag::Regression], response_content_types),
        case("invalid_http_method", &[Tag::Negative], invalid_http_method),
        case("request_with_empty_body", &[Tag::Negative], request_with_empty_body),
        case("uuid_generation", &[Tag::Regression], uuid_generation),
    ]
}

fn case<F, Fut>(name: &str, tags: &[Tag], body: F) -> TestCase
where
    F: Fn(Fixtures) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    TestCase::new(format!("httpbin::{name}"), body).uses(BASE).tags(tags)
}

fn base(fx: &Fixtures) -> Result<(Arc<Session>, Arc<String>)> {
    Ok((fx.get::<Session>(API_SESSION)?, fx.get::<String>(HTTPBIN_BASE_URL)?))
}

async fn get_request(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/get")).await?;
    assert_status(&resp, 200)?;
    assert_fields(resp.json()?, &["args", "headers", "origin", "url"])
}

async fn post_with_json(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let payload = json!({
        "test_key": "test_value",
        "number": 42,
        "nested": {"inner": "data"}
    });

    let resp = session.post(format!("{url}/post"), payload.clone()).await?;
    assert_status(&resp, 200)?;

    let data = resp.json()?;
    check_eq!(field(data, "json")?, &payload, "Echoed JSON doesn't match sent payload");
    let headers = field(data, "headers")?;
    field(headers, "Content-Type").map(|_| ())
}

async fn put_request(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let payload = json!({"action": "update", "data": "test"});

    let resp = session.put(format!("{url}/put"), payload.clone()).await?;
    assert_status(&resp, 200)?;
    check_eq!(field(resp.json()?, "json")?, &payload);
    Ok(())
}

async fn delete_request(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.delete(format!("{url}/delete")).await?;
    assert_status(&resp, 200)?;
    assert_fields(resp.json()?, &["args", "headers"])
}

async fn status_code_404(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/status/404")).await?;
    assert_status(&resp, 404)
}

async fn status_code_500(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/status/500")).await?;
    assert_status(&resp, 500)
}

async fn headers_validation(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let spec = HttpRequestSpec::get(format!("{url}/headers"))
        .header("X-Custom-Header", "test-value")
        .header("User-Agent", "QA-Test-Suite/1.0");

    let resp = session.request(&spec).await?;
    assert_status(&resp, 200)?;

    let headers = field(resp.json()?, "headers")?;
    check_eq!(field(headers, "X-Custom-Header")?, &json!("test-value"));
    Ok(())
}

async fn response_delay(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let spec = HttpRequestSpec::get(format!("{url}/delay/2")).timeout(DELAY_TIMEOUT);

    let start = Instant::now();
    let resp = session.request(&spec).await?;
    let elapsed = start.elapsed().as_secs_f64();

    assert_status(&resp, 200)?;
    check!(elapsed >= 2.0, "Expected delay of ~2s, got {elapsed:.2}s");
    check!(elapsed < 3.0, "Delay too long: {elapsed:.2}s (expected ~2s)");
    Ok(())
}

async fn basic_auth_success(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let (user, pass) = ("testuser", "testpass");
    let spec = HttpRequestSpec::get(format!("{url}/basic-auth/{user}/{pass}")).basic_auth(user, pass);

    let resp = session.request(&spec).await?;
    assert_status(&resp, 200)?;

    let data = resp.json()?;
    check_eq!(field(data, "authenticated")?, &Value::Bool(true));
    check_eq!(field(data, "user")?, &json!(user));
    Ok(())
}

async fn basic_auth_failure(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let spec = HttpRequestSpec::get(format!("{url}/basic-auth/testuser/testpass"))
        .basic_auth("wrong", "credentials");

    let resp = session.request(&spec).await?;
    assert_status(&resp, 401)
}

async fn get_with_query_params(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let params = [("search", "testing"), ("limit", "10"), ("offset", "5")];
    let spec = params
        .iter()
        .fold(HttpRequestSpec::get(format!("{url}/get")), |s, (k, v)| s.param(*k, *v));

    let resp = session.request(&spec).await?;
    assert_status(&resp, 200)?;

    let args = field(resp.json()?, "args")?;
    for (key, value) in params {
        check_eq!(field(args, key)?, &json!(value), "query arg '{key}'");
    }
    Ok(())
}

async fn post_form_data(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let spec = HttpRequestSpec::post(format!("{url}/post"))
        .form([("field1", "value1"), ("field2", "value2")]);

    let resp = session.request(&spec).await?;
    assert_status(&resp, 200)?;

    let form = field(resp.json()?, "form")?;
    check_eq!(field(form, "field1")?, &json!("value1"));
    check_eq!(field(form, "field2")?, &json!("value2"));
    Ok(())
}

async fn user_agent(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/user-agent")).await?;
    assert_status(&resp, 200)?;

    let ua = as_str(field(resp.json()?, "user-agent")?, "user-agent")?;
    check!(ua.contains("QA-Test-Suite"), "Unexpected user agent: {ua}");
    Ok(())
}

async fn gzip_compression(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/gzip")).await?;
    assert_status(&resp, 200)?;
    check_eq!(field(resp.json()?, "gzipped")?, &Value::Bool(true));
    Ok(())
}

async fn response_content_types(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/json")).await?;
    assert_status(&resp, 200)?;

    let content_type = resp.header("Content-Type").unwrap_or_default();
    check!(
        content_type.contains("application/json"),
        "Expected a JSON content type, got {content_type:?}"
    );
    check!(resp.json()?.is_object(), "Expected a JSON object");
    Ok(())
}

async fn invalid_http_method(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.request(&HttpRequestSpec::patch(format!("{url}/get"))).await?;
    assert_status(&resp, 405)
}

async fn request_with_empty_body(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.post(format!("{url}/post"), json!({})).await?;
    assert_status(&resp, 200)?;
    check_eq!(field(resp.json()?, "json")?, &json!({}));
    Ok(())
}

fn is_uuid_shaped(s: &str) -> bool {
    let parts: Vec<&str> = s.split('-').collect();
    parts.len() == 5
        && parts
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(p, n)| p.len() == n && p.chars().all(|c| c.is_ascii_hexdigit()))
}

async fn uuid_generation(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/uuid")).await?;
    assert_status(&resp, 200)?;

    let uuid = as_str(field(resp.json()?, "uuid")?, "uuid")?;
    check!(is_uuid_shaped(uuid), "Not an 8-4-4-4-12 UUID: {uuid}");
    Ok(())
}
