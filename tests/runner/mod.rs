use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use apicheck::assertions::assert_status;
use apicheck::errors::{ApicheckError, Result};
use apicheck::fixtures::catalog::{standard_fixtures, API_SESSION, REQRES_BASE_URL};
use apicheck::fixtures::{FixtureDef, FixtureRegistry, Fixtures};
use apicheck::http::Session;
use apicheck::runner::{Outcome, Runner, Tag, TestCase};
use apicheck::check_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::config_for;

async fn passes(_: Fixtures) -> Result<()> {
    Ok(())
}

async fn fails(_: Fixtures) -> Result<()> {
    check_eq!(1 + 1, 3, "arithmetic");
    Ok(())
}

async fn errors(_: Fixtures) -> Result<()> {
    Err(ApicheckError::Network("connection reset".into()))
}

async fn panics(_: Fixtures) -> Result<()> {
    assert_eq!(json!(1), json!(2));
    Ok(())
}

async fn asserts(_: Fixtures) -> Result<()> {
    let retries = 1;
    assert!(retries > 2);
    Ok(())
}

async fn unwraps_none(_: Fixtures) -> Result<()> {
    let missing: Option<u8> = None;
    missing.unwrap();
    Ok(())
}

async fn indexes_past_end(_: Fixtures) -> Result<()> {
    let empty: Vec<u8> = Vec::new();
    let _byte = empty[3];
    Ok(())
}

async fn reads_counter(fx: Fixtures) -> Result<()> {
    let n = fx.get::<usize>("counter")?;
    check_eq!(*n, 1);
    Ok(())
}

async fn needs_broken(fx: Fixtures) -> Result<()> {
    fx.get::<String>("broken")?;
    Ok(())
}

#[tokio::test]
async fn test_outcomes_are_classified() {
    let runner = Runner::new(FixtureRegistry::new()).unwrap();
    let cases = vec![
        TestCase::new("t::passes", passes),
        TestCase::new("t::fails", fails),
        TestCase::new("t::errors", errors),
        TestCase::new("t::panics", panics),
        TestCase::new("t::skipped", passes).skip("not today"),
    ];

    let summary = runner.run(&cases).await;
    assert_eq!(summary.passed(), 1);
    assert_eq!(summary.failed(), 2);
    assert_eq!(summary.errored(), 1);
    assert_eq!(summary.skipped(), 1);
    assert_eq!(summary.exit_code(), 1);

    let names: Vec<&str> = summary.reports.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["t::passes", "t::fails", "t::errors", "t::panics", "t::skipped"]);

    let failed = summary.get("t::fails").unwrap();
    assert!(failed.outcome.diagnostic().unwrap().contains("arithmetic"));
    assert_eq!(
        summary.get("t::skipped").unwrap().outcome,
        Outcome::Skipped("not today".into())
    );
}

#[tokio::test]
async fn test_assert_panics_fail_other_panics_error() {
    let runner = Runner::new(FixtureRegistry::new()).unwrap();
    let cases = vec![
        TestCase::new("t::asserts", asserts),
        TestCase::new("t::unwraps_none", unwraps_none),
        TestCase::new("t::indexes_past_end", indexes_past_end),
    ];

    let summary = runner.run(&cases).await;
    match &summary.get("t::asserts").unwrap().outcome {
        Outcome::Failed(d) => assert!(d.contains("assertion failed"), "{d}"),
        other => panic!("expected failed, got {other:?}"),
    }
    match &summary.get("t::unwraps_none").unwrap().outcome {
        Outcome::Errored(d) => assert!(d.contains("None"), "{d}"),
        other => panic!("expected errored, got {other:?}"),
    }
    match &summary.get("t::indexes_past_end").unwrap().outcome {
        Outcome::Errored(d) => assert!(d.contains("out of bounds"), "{d}"),
        other => panic!("expected errored, got {other:?}"),
    }
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.errored(), 2);
}

#[tokio::test]
async fn test_all_passed_or_skipped_exits_zero() {
    let runner = Runner::new(FixtureRegistry::new()).unwrap();
    let cases = vec![
        TestCase::new("a", passes),
        TestCase::new("b", fails).skip("known issue"),
    ];
    let summary = runner.run(&cases).await;
    assert!(summary.is_success());
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_process_fixture_built_once_across_tests() {
    let builds = Arc::new(AtomicUsize::new(0));
    let seen = builds.clone();

    let mut reg = FixtureRegistry::new();
    reg.register(FixtureDef::process("counter", move |_: &Fixtures| {
        Ok(seen.fetch_add(1, Ordering::SeqCst) + 1)
    }))
    .unwrap();

    let runner = Runner::new(reg).unwrap().with_jobs(4);
    let cases: Vec<TestCase> = (0..8)
        .map(|i| TestCase::new(format!("t::{i}"), reads_counter).uses(&["counter"]))
        .collect();

    let summary = runner.run(&cases).await;
    assert_eq!(summary.passed(), 8, "{:?}", summary.reports);
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_fixture_failure_errors_only_dependents() {
    let mut reg = FixtureRegistry::new();
    reg.register(FixtureDef::per_test("broken", |_: &Fixtures| -> Result<String> {
        Err(ApicheckError::ConfigError("no token".into()))
    }))
    .unwrap();

    let runner = Runner::new(reg).unwrap();
    let cases = vec![
        TestCase::new("t::dependent", needs_broken).uses(&["broken"]),
        TestCase::new("t::independent", passes),
        TestCase::new("t::unknown", passes).uses(&["nobody_registered_this"]),
    ];
    let summary = runner.run(&cases).await;

    match &summary.get("t::dependent").unwrap().outcome {
        Outcome::Errored(d) => assert!(d.contains("broken"), "{d}"),
        other => panic!("expected errored, got {other:?}"),
    }
    assert!(matches!(summary.get("t::unknown").unwrap().outcome, Outcome::Errored(_)));
    assert_eq!(summary.get("t::independent").unwrap().outcome, Outcome::Passed);
}

#[test]
fn test_cycle_rejected_before_running() {
    let mut reg = FixtureRegistry::new();
    reg.register(FixtureDef::per_test("a", |_: &Fixtures| Ok(1u8)).depends_on(&["b"]))
        .unwrap();
    reg.register(FixtureDef::per_test("b", |_: &Fixtures| Ok(2u8)).depends_on(&["a"]))
        .unwrap();

    let err = Runner::new(reg).err().expect("cycle detected");
    assert!(err.is_configuration());
    assert!(matches!(err, ApicheckError::FixtureCycle(_)));
}

async fn hits_status(fx: Fixtures) -> Result<()> {
    let session = fx.get::<Session>(API_SESSION)?;
    let base = fx.get::<String>(REQRES_BASE_URL)?;
    let resp = session.get(format!("{base}/status")).await?;
    assert_status(&resp, 200)
}

#[tokio::test]
async fn test_standard_fixtures_against_mock() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200))
        .expect(3)
        .mount(&server)
        .await;

    let runner = Runner::new(standard_fixtures(&config_for(&server)).unwrap())
        .unwrap()
        .with_jobs(2);
    let cases: Vec<TestCase> = ["one", "two", "three"]
        .into_iter()
        .map(|n| {
            TestCase::new(format!("mock::{n}"), hits_status)
                .uses(&[API_SESSION, REQRES_BASE_URL])
                .tags(&[Tag::Smoke])
        })
        .collect();

    let summary = runner.run(&cases).await;
    assert_eq!(summary.passed(), 3, "{:?}", summary.reports);
    // the session is torn down once the run ends
    assert!(runner.session_cache().constructed().is_empty());
}

async fn uses_scratch_then_unwraps(fx: Fixtures) -> Result<()> {
    fx.get::<u8>("scratch")?;
    let missing: Option<u8> = None;
    missing.unwrap();
    Ok(())
}

async fn uses_scratch_then_errors(fx: Fixtures) -> Result<()> {
    fx.get::<u8>("scratch")?;
    Err(ApicheckError::Network("connection reset".into()))
}

async fn uses_scratch_then_fails(fx: Fixtures) -> Result<()> {
    let n = fx.get::<u8>("scratch")?;
    check_eq!(*n, 0);
    Ok(())
}

async fn uses_scratch_and_waits(fx: Fixtures) -> Result<()> {
    fx.get::<u8>("scratch")?;
    fx.get::<u8>("shared")?;
    tokio::time::sleep(Duration::from_secs(30)).await;
    Ok(())
}

/// A per-test `scratch` fixture and a process `shared` fixture, each counting teardowns.
fn counting_registry() -> (FixtureRegistry, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let scratch_torn = Arc::new(AtomicUsize::new(0));
    let shared_torn = Arc::new(AtomicUsize::new(0));
    let (scratch, shared) = (scratch_torn.clone(), shared_torn.clone());

    let mut reg = FixtureRegistry::new();
    reg.register(
        FixtureDef::per_test("scratch", |_: &Fixtures| Ok(7u8)).with_teardown(move |_: Arc<u8>| {
            scratch.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();
    reg.register(
        FixtureDef::process("shared", |_: &Fixtures| Ok(1u8)).with_teardown(move |_: Arc<u8>| {
            shared.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();
    (reg, scratch_torn, shared_torn)
}

#[tokio::test]
async fn test_teardown_runs_whatever_the_outcome() {
    let (reg, scratch_torn, shared_torn) = counting_registry();
    let runner = Runner::new(reg).unwrap();
    let cases = vec![
        TestCase::new("t::unwraps", uses_scratch_then_unwraps).uses(&["scratch", "shared"]),
        TestCase::new("t::network", uses_scratch_then_errors).uses(&["scratch"]),
        TestCase::new("t::fails", uses_scratch_then_fails).uses(&["scratch"]),
    ];

    let summary = runner.run(&cases).await;
    assert_eq!(summary.errored(), 2, "{:?}", summary.reports);
    assert_eq!(summary.failed(), 1, "{:?}", summary.reports);
    assert_eq!(scratch_torn.load(Ordering::SeqCst), 3);
    assert_eq!(shared_torn.load(Ordering::SeqCst), 1);
    assert!(runner.session_cache().constructed().is_empty());
}

#[tokio::test]
async fn test_interrupt_aborts_body_and_tears_down() {
    let (reg, scratch_torn, shared_torn) = counting_registry();
    let runner = Runner::new(reg).unwrap();
    let cases = vec![
        TestCase::new("t::slow", uses_scratch_and_waits).uses(&["scratch", "shared"]),
        TestCase::new("t::later", passes),
    ];

    let (summary, ()) = tokio::join!(runner.run(&cases), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        runner.interrupt();
    });

    assert!(runner.is_interrupted());
    assert_eq!(
        summary.get("t::slow").unwrap().outcome,
        Outcome::Errored("interrupted".into())
    );
    assert!(matches!(summary.get("t::later").unwrap().outcome, Outcome::Skipped(_)));
    assert!(summary.duration < Duration::from_secs(30));
    assert_eq!(scratch_torn.load(Ordering::SeqCst), 1);
    assert_eq!(shared_torn.load(Ordering::SeqCst), 1);
    assert!(runner.session_cache().constructed().is_empty());
}
