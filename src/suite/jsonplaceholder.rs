//! Fake REST API: posts, comments and todos, with query-parameter filtering.

use std::sync::Arc;

use serde_json::{json, Value};

use super::as_array;
use crate::assertions::{assert_fields, assert_status, assert_status_in, field, ResponseTimeCheck, SchemaCheck};
use crate::errors::Result;
use crate::fixtures::catalog::{
    API_SESSION, ASSERT_JSON_SCHEMA, ASSERT_RESPONSE_TIME, JSONPLACEHOLDER_BASE_URL, POST_SCHEMA,
    VALID_POST_PAYLOAD,
};
use crate::fixtures::Fixtures;
use crate::http::{HttpRequestSpec, Session};
use crate::runner::{Tag, TestCase};
use crate::schema::SchemaDescription;
use crate::{check, check_eq};

const BASE: &[&str] = &[API_SESSION, JSONPLACEHOLDER_BASE_URL];

pub fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new("jsonplaceholder::get_all_posts", get_all_posts)
            .uses(BASE)
            .uses(&[ASSERT_RESPONSE_TIME])
            .tags(&[Tag::Smoke, Tag::Crud]),
        TestCase::new("jsonplaceholder::get_single_post", get_single_post)
            .uses(BASE)
            .uses(&[POST_SCHEMA, ASSERT_JSON_SCHEMA])
            .tags(&[Tag::Smoke, Tag::Crud]),
        TestCase::new("jsonplaceholder::filter_posts_by_user", filter_posts_by_user)
            .uses(BASE)
            .tags(&[Tag::Crud]),
        TestCase::new("jsonplaceholder::create_post", create_post)
            .uses(BASE)
            .uses(&[VALID_POST_PAYLOAD])
            .tags(&[Tag::Crud]),
        TestCase::new("jsonplaceholder::invalid_post_id", invalid_post_id)
            .uses(BASE)
            .tags(&[Tag::Negative]),
        TestCase::new("jsonplaceholder::update_post", update_post)
            .uses(BASE)
            .tags(&[Tag::Crud]),
        TestCase::new("jsonplaceholder::delete_post", delete_post)
            .uses(BASE)
            .tags(&[Tag::Crud]),
        TestCase::new("jsonplaceholder::get_comments_for_post", get_comments_for_post)
            .uses(BASE)
            .tags(&[Tag::Smoke]),
        TestCase::new("jsonplaceholder::filter_comments_by_post", filter_comments_by_post)
            .uses(BASE)
            .tags(&[Tag::Crud]),
        TestCase::new("jsonplaceholder::get_todos", get_todos)
            .uses(BASE)
            .tags(&[Tag::Smoke]),
        TestCase::new("jsonplaceholder::create_post_with_missing_fields", create_post_with_missing_fields)
            .uses(BASE)
            .tags(&[Tag::Negative]),
        TestCase::new("jsonplaceholder::malformed_json_payload", malformed_json_payload)
            .uses(BASE)
            .tags(&[Tag::Negative]),
        TestCase::new("jsonplaceholder::post_schema_compliance", post_schema_compliance)
            .uses(BASE)
            .uses(&[POST_SCHEMA, ASSERT_JSON_SCHEMA])
            .tags(&[Tag::Schema]),
        TestCase::new("jsonplaceholder::filter_todos_by_completion_status", filter_todos_by_completion_status)
            .uses(BASE)
            .tags(&[Tag::Regression]),
        TestCase::new("jsonplaceholder::response_headers", response_headers)
            .uses(BASE)
            .tags(&[Tag::Performance]),
    ]
}

fn base(fx: &Fixtures) -> Result<(Arc<Session>, Arc<String>)> {
    Ok((
        fx.get::<Session>(API_SESSION)?,
        fx.get::<String>(JSONPLACEHOLDER_BASE_URL)?,
    ))
}

async fn get_all_posts(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let timing = fx.get::<ResponseTimeCheck>(ASSERT_RESPONSE_TIME)?;

    let resp = session.get(format!("{url}/posts")).await?;
    assert_status(&resp, 200)?;
    timing.within(&resp, 1000)?;

    let posts = as_array(resp.json()?, "posts")?;
    check_eq!(posts.len(), 100, "Expected 100 posts");
    Ok(())
}

async fn get_single_post(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let schema = fx.get::<SchemaDescription>(POST_SCHEMA)?;
    let schema_check = fx.get::<SchemaCheck>(ASSERT_JSON_SCHEMA)?;

    let resp = session.get(format!("{url}/posts/1")).await?;
    assert_status(&resp, 200)?;

    let post = resp.json()?;
    check_eq!(field(post, "id")?, &json!(1), "Expected post ID 1");
    assert_fields(post, &["userId", "title", "body"])?;
    schema_check.check(post, &schema)
}

async fn filter_posts_by_user(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session
        .request(&HttpRequestSpec::get(format!("{url}/posts")).param("userId", "1"))
        .await?;
    assert_status(&resp, 200)?;

    let posts = as_array(resp.json()?, "posts")?;
    check!(!posts.is_empty(), "User should have at least one post");
    for post in posts {
        check_eq!(field(post, "userId")?, &json!(1), "Post userId mismatch");
    }
    Ok(())
}

async fn create_post(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let payload = fx.get::<Value>(VALID_POST_PAYLOAD)?;

    let resp = session.post(format!("{url}/posts"), (*payload).clone()).await?;
    assert_status(&resp, 201)?;

    let data = resp.json()?;
    field(data, "id")?;
    for key in ["userId", "title", "body"] {
        check_eq!(field(data, key)?, &payload[key], "'{key}' not echoed");
    }
    Ok(())
}

async fn invalid_post_id(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/posts/999999")).await?;
    assert_status_in(&resp, &[200, 404])?;

    if resp.status() == 200 && !resp.body().is_empty() {
        let data = resp.json()?;
        let empty = data.is_null() || data.as_object().is_some_and(|o| o.is_empty());
        check!(empty, "Expected an empty object for a missing post, got {data}");
    }
    Ok(())
}

async fn update_post(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let update = json!({
        "userId": 1,
        "id": 1,
        "title": "Updated Post Title",
        "body": "This is an updated post body."
    });

    let resp = session.put(format!("{url}/posts/1"), update.clone()).await?;
    assert_status(&resp, 200)?;

    let data = resp.json()?;
    check_eq!(field(data, "title")?, &update["title"]);
    check_eq!(field(data, "body")?, &update["body"]);
    Ok(())
}

async fn delete_post(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.delete(format!("{url}/posts/1")).await?;
    assert_status(&resp, 200)
}

async fn get_comments_for_post(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/posts/1/comments")).await?;
    assert_status(&resp, 200)?;

    let comments = as_array(resp.json()?, "comments")?;
    let Some(first) = comments.first() else {
        return Err(crate::errors::ApicheckError::assertion("Post should have comments"));
    };
    assert_fields(first, &["postId", "id", "email", "name", "body"])?;
    check_eq!(field(first, "postId")?, &json!(1));
    Ok(())
}

async fn filter_comments_by_post(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session
        .request(&HttpRequestSpec::get(format!("{url}/comments")).param("postId", "1"))
        .await?;
    assert_status(&resp, 200)?;

    for comment in as_array(resp.json()?, "comments")? {
        check_eq!(field(comment, "postId")?, &json!(1));
    }
    Ok(())
}

async fn get_todos(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/todos")).await?;
    assert_status(&resp, 200)?;

    let todos = as_array(resp.json()?, "todos")?;
    check_eq!(todos.len(), 200, "Expected 200 todos");

    let first = &todos[0];
    assert_fields(first, &["userId", "id", "title", "completed"])?;
    check!(
        field(first, "completed")?.is_boolean(),
        "'completed' should be a boolean"
    );
    Ok(())
}

// The service accepts partial payloads.
async fn create_post_with_missing_fields(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let partial = json!({
        "userId": 1,
        "title": "Post without body"
    });

    let resp = session.post(format!("{url}/posts"), partial).await?;
    assert_status(&resp, 201)?;
    field(resp.json()?, "id").map(|_| ())
}

async fn malformed_json_payload(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let spec = HttpRequestSpec::post(format!("{url}/posts")).raw("application/json", "{invalid json}");

    let resp = session.request(&spec).await?;
    assert_status_in(&resp, &[400, 422, 500])
}

async fn post_schema_compliance(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let schema = fx.get::<SchemaDescription>(POST_SCHEMA)?;
    let schema_check = fx.get::<SchemaCheck>(ASSERT_JSON_SCHEMA)?;

    let resp = session
        .request(&HttpRequestSpec::get(format!("{url}/posts")).param("_limit", "10"))
        .await?;
    assert_status(&resp, 200)?;

    for post in as_array(resp.json()?, "posts")? {
        schema_check.check(post, &schema)?;
    }
    Ok(())
}

async fn filter_todos_by_completion_status(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session
        .request(&HttpRequestSpec::get(format!("{url}/todos")).param("completed", "true"))
        .await?;
    assert_status(&resp, 200)?;

    for todo in as_array(resp.json()?, "todos")? {
        check_eq!(
            field(todo, "completed")?,
            &Value::Bool(true),
            "Todo {} should be completed",
            todo["id"]
        );
    }
    Ok(())
}

async fn response_headers(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/posts/1")).await?;
    assert_status(&resp, 200)?;

    let content_type = resp.header("content-type").unwrap_or_default();
    check!(
        content_type.contains("application/json"),
        "Expected a JSON content type, got {content_type:?}"
    );
    check!(
        resp.has_header("access-control-allow-origin"),
        "Missing CORS allow-origin header"
    );
    Ok(())
}
