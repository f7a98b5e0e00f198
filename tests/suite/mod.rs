use apicheck::fixtures::catalog::standard_fixtures;
use apicheck::runner::{Outcome, Runner, Selection, TestRunSummary};
use apicheck::suite;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::config_for;

/// Run the built-in cases whose names contain `filter` against `server`.
async fn run_against(server: &MockServer, filter: &str) -> TestRunSummary {
    let selection = Selection {
        patterns: vec![filter.to_string()],
        ..Default::default()
    };
    let cases = selection.apply(suite::all());
    assert_eq!(cases.len(), 1, "filter {filter} should pick exactly one case");

    let runner = Runner::new(standard_fixtures(&config_for(server)).unwrap()).unwrap();
    runner.run(&cases).await
}

fn outcome(summary: &TestRunSummary) -> &Outcome {
    &summary.reports[0].outcome
}

fn user(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "email": "janet.weaver@reqres.in",
        "first_name": "Janet",
        "last_name": "Weaver",
        "avatar": "https://reqres.in/img/faces/2-image.jpg"
    })
}

#[tokio::test]
async fn test_list_users_with_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 2,
            "per_page": 6,
            "total": 12,
            "total_pages": 2,
            "data": [user(7), user(8)]
        })))
        .mount(&server)
        .await;

    let summary = run_against(&server, "reqres::list_users_with_pagination").await;
    assert_eq!(outcome(&summary), &Outcome::Passed);
}

#[tokio::test]
async fn test_wrong_page_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "page": 1,
            "per_page": 6,
            "total": 12,
            "total_pages": 2,
            "data": [user(1)]
        })))
        .mount(&server)
        .await;

    let summary = run_against(&server, "reqres::list_users_with_pagination").await;
    match outcome(&summary) {
        Outcome::Failed(d) => assert!(d.contains("Expected page 2"), "{d}"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn test_get_single_user_validates_schema() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": user(2) })))
        .mount(&server)
        .await;

    let summary = run_against(&server, "reqres::get_single_user").await;
    assert_eq!(outcome(&summary), &Outcome::Passed);
}

#[tokio::test]
async fn test_get_single_user_schema_violation_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": 2,
                "email": "not-an-email",
                "first_name": "Janet",
                "last_name": 7,
                "avatar": "x"
            }
        })))
        .mount(&server)
        .await;

    let summary = run_against(&server, "reqres::get_single_user").await;
    match outcome(&summary) {
        Outcome::Failed(d) => {
            assert!(d.contains("last_name"), "{d}");
            assert!(d.contains("email"), "{d}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_create_user_echoes_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({"name": "QA Test User", "job": "Test Engineer"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "QA Test User",
            "job": "Test Engineer",
            "id": "412",
            "createdAt": "2024-05-01T10:20:30.123Z"
        })))
        .mount(&server)
        .await;

    let summary = run_against(&server, "reqres::create_user").await;
    assert_eq!(outcome(&summary), &Outcome::Passed);
}

#[tokio::test]
async fn test_missing_user_is_404() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/999"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({})))
        .mount(&server)
        .await;

    let summary = run_against(&server, "reqres::user_not_found").await;
    assert_eq!(outcome(&summary), &Outcome::Passed);
}

#[tokio::test]
async fn test_echo_post_with_json() {
    let server = MockServer::start().await;
    let payload = json!({"test_key": "test_value", "number": 42, "nested": {"inner": "data"}});
    Mock::given(method("POST"))
        .and(path("/post"))
        .and(body_json(&payload))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "json": payload,
            "headers": {"Content-Type": "application/json"}
        })))
        .mount(&server)
        .await;

    let summary = run_against(&server, "httpbin::post_with_json").await;
    assert_eq!(outcome(&summary), &Outcome::Passed);
}

#[tokio::test]
async fn test_login_missing_password_is_400() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Missing password"})))
        .mount(&server)
        .await;

    let summary = run_against(&server, "reqres::login_invalid_credentials").await;
    assert_eq!(outcome(&summary), &Outcome::Passed);
}

#[tokio::test]
async fn test_pagination_zero_tolerates_400() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("page", "0"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let summary = run_against(&server, "reqres::pagination_edge_case_zero").await;
    assert_eq!(outcome(&summary), &Outcome::Passed);
}

#[tokio::test]
async fn test_unreachable_service_is_an_error() {
    let server = MockServer::start().await;
    let mut cfg = config_for(&server);
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    cfg.httpbin_url = format!("http://127.0.0.1:{port}");

    let cases = Selection {
        patterns: vec!["httpbin::status_code_404".into()],
        ..Default::default()
    }
    .apply(suite::all());
    let runner = Runner::new(standard_fixtures(&cfg).unwrap()).unwrap();
    let summary = runner.run(&cases).await;

    assert!(matches!(outcome(&summary), Outcome::Errored(_)));
    assert_eq!(summary.exit_code(), 1);
}
