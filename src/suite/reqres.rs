//! User-management API: listing with pagination, CRUD, registration and login.

use serde_json::json;

use super::{as_array, as_str, check_timestamp};
use crate::assertions::{assert_fields, assert_status, assert_status_in, field, ResponseTimeCheck, SchemaCheck};
use crate::errors::Result;
use crate::fixtures::catalog::{
    API_SESSION, ASSERT_JSON_SCHEMA, ASSERT_RESPONSE_TIME, REQRES_BASE_URL, USER_SCHEMA,
    VALID_USER_PAYLOAD,
};
use crate::fixtures::Fixtures;
use crate::http::{HttpRequestSpec, Session};
use crate::runner::{Tag, TestCase};
use crate::schema::{Format, SchemaDescription};
use crate::{check, check_eq};

const BASE: &[&str] = &[API_SESSION, REQRES_BASE_URL];

pub fn cases() -> Vec<TestCase> {
    vec![
        TestCase::new("reqres::list_users_with_pagination", list_users_with_pagination)
            .uses(BASE)
            .uses(&[ASSERT_RESPONSE_TIME])
            .tags(&[Tag::Smoke, Tag::Crud]),
        TestCase::new("reqres::get_single_user", get_single_user)
            .uses(BASE)
            .uses(&[USER_SCHEMA, ASSERT_JSON_SCHEMA])
            .tags(&[Tag::Smoke, Tag::Crud]),
        TestCase::new("reqres::user_not_found", user_not_found)
            .uses(BASE)
            .tags(&[Tag::Negative]),
        TestCase::new("reqres::create_user", create_user)
            .uses(BASE)
            .uses(&[VALID_USER_PAYLOAD])
            .tags(&[Tag::Crud]),
        TestCase::new("reqres::update_user_put", update_user_put)
            .uses(BASE)
            .tags(&[Tag::Crud]),
        TestCase::new("reqres::update_user_patch", update_user_patch)
            .uses(BASE)
            .tags(&[Tag::Crud]),
        TestCase::new("reqres::delete_user", delete_user)
            .uses(BASE)
            .tags(&[Tag::Crud]),
        TestCase::new("reqres::user_list_schema_validation", user_list_schema_validation)
            .uses(BASE)
            .tags(&[Tag::Schema]),
        TestCase::new("reqres::register_successful", register_successful)
            .uses(BASE)
            .tags(&[Tag::Auth]),
        TestCase::new("reqres::register_missing_field", register_missing_field)
            .uses(BASE)
            .tags(&[Tag::Auth, Tag::Negative]),
        TestCase::new("reqres::login_successful", login_successful)
            .uses(BASE)
            .tags(&[Tag::Auth]),
        TestCase::new("reqres::login_invalid_credentials", login_invalid_credentials)
            .uses(BASE)
            .tags(&[Tag::Auth, Tag::Negative]),
        TestCase::new("reqres::pagination_edge_case_zero", pagination_edge_case_zero)
            .uses(BASE)
            .tags(&[Tag::Negative]),
        TestCase::new("reqres::pagination_negative_page", pagination_negative_page)
            .uses(BASE)
            .tags(&[Tag::Negative]),
    ]
}

fn base(fx: &Fixtures) -> Result<(std::sync::Arc<Session>, std::sync::Arc<String>)> {
    Ok((fx.get::<Session>(API_SESSION)?, fx.get::<String>(REQRES_BASE_URL)?))
}

async fn list_users_with_pagination(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let timing = fx.get::<ResponseTimeCheck>(ASSERT_RESPONSE_TIME)?;

    let resp = session
        .request(&HttpRequestSpec::get(format!("{url}/users")).param("page", "2"))
        .await?;

    assert_status(&resp, 200)?;
    timing.within(&resp, 500)?;

    let data = resp.json()?;
    check_eq!(field(data, "page")?, &json!(2), "Expected page 2");
    let users = as_array(field(data, "data")?, "data")?;
    check!(!users.is_empty(), "User list should not be empty");
    assert_fields(data, &["total_pages", "per_page", "total"])
}

async fn get_single_user(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let schema = fx.get::<SchemaDescription>(USER_SCHEMA)?;
    let schema_check = fx.get::<SchemaCheck>(ASSERT_JSON_SCHEMA)?;

    let resp = session.get(format!("{url}/users/2")).await?;
    assert_status(&resp, 200)?;

    let user = field(resp.json()?, "data")?;
    check_eq!(field(user, "id")?, &json!(2), "Expected user ID 2");
    assert_fields(user, &["email", "first_name", "last_name", "avatar"])?;
    schema_check.check(user, &schema)
}

async fn user_not_found(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.get(format!("{url}/users/999")).await?;
    assert_status(&resp, 404)
}

async fn create_user(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let payload = fx.get::<serde_json::Value>(VALID_USER_PAYLOAD)?;

    let resp = session.post(format!("{url}/users"), (*payload).clone()).await?;
    assert_status(&resp, 201)?;

    let data = resp.json()?;
    field(data, "id")?;
    check_timestamp(data, "createdAt")?;
    check_eq!(field(data, "name")?, &payload["name"], "name not echoed");
    check_eq!(field(data, "job")?, &payload["job"], "job not echoed");
    Ok(())
}

async fn update_user_put(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let update = json!({
        "name": "Updated Name",
        "job": "Updated Job Title"
    });

    let resp = session.put(format!("{url}/users/2"), update.clone()).await?;
    assert_status(&resp, 200)?;

    let data = resp.json()?;
    check_timestamp(data, "updatedAt")?;
    check_eq!(field(data, "name")?, &update["name"]);
    check_eq!(field(data, "job")?, &update["job"]);
    Ok(())
}

async fn update_user_patch(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let partial = json!({ "job": "Senior QA Engineer" });

    let resp = session.patch(format!("{url}/users/2"), partial.clone()).await?;
    assert_status(&resp, 200)?;

    let data = resp.json()?;
    check_timestamp(data, "updatedAt")?;
    check_eq!(field(data, "job")?, &partial["job"]);
    Ok(())
}

async fn delete_user(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session.delete(format!("{url}/users/2")).await?;
    assert_status(&resp, 204)?;
    check!(resp.body().is_empty(), "Delete should return empty body, got {:?}", resp.text());
    Ok(())
}

async fn user_list_schema_validation(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session
        .request(&HttpRequestSpec::get(format!("{url}/users")).param("page", "1"))
        .await?;
    assert_status(&resp, 200)?;

    for user in as_array(field(resp.json()?, "data")?, "data")? {
        assert_fields(user, &["id", "email", "first_name", "last_name", "avatar"])?;
        let email = as_str(field(user, "email")?, "email")?;
        check!(email.contains('@'), "Invalid email format: {email}");
        let avatar = as_str(field(user, "avatar")?, "avatar")?;
        check!(Format::Uri.check(avatar), "Avatar should be a valid URL: {avatar}");
    }
    Ok(())
}

async fn register_successful(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let payload = json!({
        "email": "eve.holt@reqres.in",
        "password": "pistol"
    });

    let resp = session.post(format!("{url}/register"), payload).await?;
    assert_status(&resp, 200)?;

    let data = resp.json()?;
    field(data, "id")?;
    let token = as_str(field(data, "token")?, "token")?;
    check!(!token.is_empty(), "Token should not be empty");
    Ok(())
}

async fn register_missing_field(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session
        .post(format!("{url}/register"), json!({ "email": "eve.holt@reqres.in" }))
        .await?;
    assert_status(&resp, 400)?;
    field(resp.json()?, "error").map(|_| ())
}

async fn login_successful(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let payload = json!({
        "email": "eve.holt@reqres.in",
        "password": "cityslicka"
    });

    let resp = session.post(format!("{url}/login"), payload).await?;
    assert_status(&resp, 200)?;

    let token = as_str(field(resp.json()?, "token")?, "token")?;
    check!(!token.is_empty(), "Token should not be empty");
    Ok(())
}

async fn login_invalid_credentials(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session
        .post(format!("{url}/login"), json!({ "email": "eve.holt@reqres.in" }))
        .await?;
    assert_status(&resp, 400)?;
    field(resp.json()?, "error").map(|_| ())
}

// The service's handling of out-of-range pages is not pinned down; either answer is fine.
async fn pagination_edge_case_zero(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session
        .request(&HttpRequestSpec::get(format!("{url}/users")).param("page", "0"))
        .await?;
    assert_status_in(&resp, &[200, 400])?;
    if resp.status() == 200 {
        field(resp.json()?, "data")?;
    }
    Ok(())
}

async fn pagination_negative_page(fx: Fixtures) -> Result<()> {
    let (session, url) = base(&fx)?;
    let resp = session
        .request(&HttpRequestSpec::get(format!("{url}/users")).param("page", "-1"))
        .await?;
    assert_status_in(&resp, &[200, 400])
}
