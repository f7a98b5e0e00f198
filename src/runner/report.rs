use tracing::{error, info, warn};

use super::{Outcome, TestReport, TestRunSummary};

pub fn log_result(report: &TestReport) {
    let ms = report.duration.as_millis() as u64;
    match &report.outcome {
        Outcome::Passed => info!(elapsed_ms = ms, "✓ PASSED: {}", report.name),
        Outcome::Failed(d) => error!(elapsed_ms = ms, "✗ FAILED: {} - {d}", report.name),
        Outcome::Errored(d) => error!(elapsed_ms = ms, "✗ ERROR: {} - {d}", report.name),
        Outcome::Skipped(d) => warn!("⊘ SKIPPED: {} - {d}", report.name),
    }
}

/// Run totals, then every non-passing case with its full diagnostic.
pub fn log_summary(summary: &TestRunSummary) {
    info!(
        passed = summary.passed(),
        failed = summary.failed(),
        errored = summary.errored(),
        skipped = summary.skipped(),
        total_ms = summary.duration.as_millis() as u64,
        "test run finished"
    );
    for report in summary.problems() {
        error!(
            kind = report.outcome.label(),
            "{}: {}",
            report.name,
            report.outcome.diagnostic().unwrap_or_default()
        );
    }
}
