//! Test registry and runner.
//!
//! Per test: `Discovered -> FixturesResolving -> FixturesReady -> Running -> Passed | Failed | Errored`,
//! or `FixturesResolving -> Errored` when a fixture cannot be built, or `Discovered -> Skipped`
//! for cases marked skip. Once a run is interrupted, bodies in flight are aborted and
//! reported `Errored`, and cases not yet started are `Skipped`.

pub mod filter;
pub mod report;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn, Instrument};

use crate::errors::{is_assertion_panic, panic_message, Result};
use crate::fixtures::{resolve, FixtureRegistry, Fixtures, SessionCache};

pub use filter::Selection;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Tag {
    Smoke,
    Crud,
    Negative,
    Auth,
    Schema,
    Regression,
    Performance,
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tag::Smoke => "smoke",
            Tag::Crud => "crud",
            Tag::Negative => "negative",
            Tag::Auth => "auth",
            Tag::Schema => "schema",
            Tag::Regression => "regression",
            Tag::Performance => "performance",
        };
        f.write_str(s)
    }
}

type TestBody = Arc<dyn Fn(Fixtures) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A registered test: name, fixture dependencies, tags, and body.
#[derive(Clone)]
pub struct TestCase {
    name: String,
    deps: Vec<String>,
    tags: Vec<Tag>,
    skip: Option<String>,
    body: TestBody,
}

impl TestCase {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Fixtures) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            deps: Vec::new(),
            tags: Vec::new(),
            skip: None,
            body: Arc::new(move |fx| body(fx).boxed()),
        }
    }

    pub fn uses(mut self, deps: &[&str]) -> Self {
        self.deps.extend(deps.iter().map(|d| d.to_string()));
        self
    }

    pub fn tags(mut self, tags: &[Tag]) -> Self {
        self.tags.extend_from_slice(tags);
        self
    }

    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.skip = Some(reason.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn deps(&self) -> &[String] {
        &self.deps
    }

    pub fn tag_list(&self) -> &[Tag] {
        &self.tags
    }

    pub fn has_tag(&self, tag: Tag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn skip_reason(&self) -> Option<&str> {
        self.skip.as_deref()
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("deps", &self.deps)
            .field("tags", &self.tags)
            .field("skip", &self.skip)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed(String),
    Skipped(String),
    Errored(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed(_) => "FAILED",
            Outcome::Skipped(_) => "SKIPPED",
            Outcome::Errored(_) => "ERROR",
        }
    }

    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed(d) | Outcome::Skipped(d) | Outcome::Errored(d) => Some(d),
        }
    }

    /// Failed or errored.
    pub fn is_problem(&self) -> bool {
        matches!(self, Outcome::Failed(_) | Outcome::Errored(_))
    }
}

#[derive(Debug, Clone)]
pub struct TestReport {
    pub name: String,
    pub tags: Vec<Tag>,
    pub outcome: Outcome,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct TestRunSummary {
    pub reports: Vec<TestReport>,
    pub duration: Duration,
}

impl TestRunSummary {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn passed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Passed))
    }
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed(_)))
    }
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped(_)))
    }
    pub fn errored(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Errored(_)))
    }

    pub fn problems(&self) -> impl Iterator<Item = &TestReport> {
        self.reports.iter().filter(|r| r.outcome.is_problem())
    }

    pub fn is_success(&self) -> bool {
        self.problems().next().is_none()
    }

    /// 0 when everything passed or was skipped, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn get(&self, name: &str) -> Option<&TestReport> {
        self.reports.iter().find(|r| r.name == name)
    }
}

pub struct Runner {
    registry: Arc<FixtureRegistry>,
    cache: Arc<SessionCache>,
    jobs: usize,
    interrupt: watch::Sender<bool>,
}

impl Runner {
    /// Fails on fixture cycles or scope mismatches, before any test runs.
    pub fn new(registry: FixtureRegistry) -> Result<Self> {
        registry.validate()?;
        Ok(Self {
            registry: Arc::new(registry),
            cache: Arc::new(SessionCache::new()),
            jobs: 1,
            interrupt: watch::channel(false).0,
        })
    }

    /// Allow up to `jobs` tests in flight. Reports keep discovery order.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn session_cache(&self) -> &SessionCache {
        &self.cache
    }

    pub async fn run(&self, cases: &[TestCase]) -> TestRunSummary {
        let t0 = Instant::now();
        info!(count = cases.len(), jobs = self.jobs, "running test cases");

        let reports: Vec<TestReport> = if self.jobs == 1 {
            let mut out = Vec::with_capacity(cases.len());
            for case in cases {
                out.push(self.run_case(case).await);
            }
            out
        } else {
            stream::iter(cases)
                .map(|case| self.run_case(case))
                .buffered(self.jobs)
                .collect()
                .await
        };

        self.teardown_session();
        TestRunSummary {
            reports,
            duration: t0.elapsed(),
        }
    }

    pub async fn run_case(&self, case: &TestCase) -> TestReport {
        let span = tracing::info_span!("test", name = %case.name);
        let t0 = Instant::now();

        let outcome = self.execute(case).instrument(span.clone()).await;
        let report = TestReport {
            name: case.name.clone(),
            tags: case.tags.clone(),
            outcome,
            duration: t0.elapsed(),
        };
        span.in_scope(|| report::log_result(&report));
        report
    }

    async fn execute(&self, case: &TestCase) -> Outcome {
        if let Some(reason) = &case.skip {
            return Outcome::Skipped(reason.clone());
        }
        if self.is_interrupted() {
            return Outcome::Skipped("run interrupted".to_string());
        }

        let resolved = match resolve(&self.registry, &self.cache, &case.deps).await {
            Ok(r) => r,
            Err(e) => return Outcome::Errored(e.to_string()),
        };
        debug!(fixtures = resolved.fixtures.len(), "fixtures ready");

        let body = case.body.clone();
        let fixtures = resolved.fixtures.clone();
        let mut task = tokio::spawn(async move { body(fixtures).await }.in_current_span());
        let mut interrupted = self.interrupt.subscribe();

        let finished = tokio::select! {
            joined = &mut task => Some(joined),
            _ = interrupted.wait_for(|stop| *stop) => None,
        };

        let outcome = match finished {
            Some(Ok(Ok(()))) => Outcome::Passed,
            Some(Ok(Err(e))) if e.is_assertion() => Outcome::Failed(e.to_string()),
            Some(Ok(Err(e))) => Outcome::Errored(e.to_string()),
            Some(Err(e)) if e.is_panic() => {
                let msg = panic_message(e.into_panic().as_ref());
                if is_assertion_panic(&msg) {
                    Outcome::Failed(format!("panicked: {msg}"))
                } else {
                    Outcome::Errored(format!("panicked: {msg}"))
                }
            }
            Some(Err(e)) => Outcome::Errored(e.to_string()),
            None => {
                task.abort();
                // the aborted body must drop its fixture handles before teardown
                let _ = task.await;
                Outcome::Errored("interrupted".to_string())
            }
        };

        resolved.teardown(&self.registry);
        outcome
    }

    /// Abort bodies in flight and skip cases not yet started. [`Runner::run`] still returns,
    /// with session fixtures torn down.
    pub fn interrupt(&self) {
        warn!("run interrupted");
        self.interrupt.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.interrupt.borrow()
    }

    /// Tear down process-scoped fixtures built so far. Called at the end of [`Runner::run`];
    /// repeated calls are no-ops.
    pub fn teardown_session(&self) {
        let built = self.cache.constructed();
        if !built.is_empty() {
            debug!(fixtures = ?built, "tearing down session fixtures");
        }
        self.cache.teardown(&self.registry);
    }
}
