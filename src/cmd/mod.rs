use std::path::PathBuf;

use clap::Parser;
use tracing::{info, instrument, warn, Instrument};

use crate::config::load_config;
use crate::errors::Result;
use crate::fixtures::catalog::standard_fixtures;
use crate::runner::report::log_summary;
use crate::runner::{Runner, Selection, Tag};
use crate::suite;

/// Exit status after Ctrl-C.
pub const EXIT_INTERRUPTED: u8 = 130;

/// CLI
#[derive(Parser, Debug)]
#[command(
    name = "apicheck",
    version,
    about = "Black-box HTTP API tests for public REST services.",
    long_about = "Black-box HTTP API tests for public REST services.\n\n\
Runs the built-in suite against a user-management API, a fake REST API and an HTTP echo\n\
service. Base URLs come from the YAML config (--config) or APICHECK_*_URL variables."
)]
pub struct Cli {
    /// Run only tests whose name contains one of these substrings.
    #[arg(value_name = "FILTER")]
    pub filters: Vec<String>,

    /// Run only tests carrying one of these tags.
    #[arg(long = "tag", short = 'm', value_enum, value_name = "TAG")]
    pub tags: Vec<Tag>,

    /// Skip tests carrying any of these tags.
    #[arg(long = "exclude-tag", value_enum, value_name = "TAG")]
    pub exclude_tags: Vec<Tag>,

    #[arg(long = "config", short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Tests in flight at once.
    #[arg(long = "jobs", short = 'j', value_name = "N", default_value_t = 1)]
    pub jobs: usize,

    /// Print the selected test names and exit.
    #[arg(long = "list")]
    pub list: bool,

    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    pub fn selection(&self) -> Selection {
        Selection {
            patterns: self.filters.clone(),
            include_tags: self.tags.clone(),
            exclude_tags: self.exclude_tags.clone(),
        }
    }
}

/// Load config, select cases, run them, and return the process exit status.
pub async fn run(cli: Cli) -> Result<u8> {
    let run_id = nanoid::nanoid!(8);
    let span = tracing::info_span!("run", id = %run_id);
    run_inner(cli).instrument(span).await
}

#[instrument(skip_all, fields(jobs = cli.jobs))]
async fn run_inner(cli: Cli) -> Result<u8> {
    let cfg = load_config(cli.config.as_deref())?;
    info!(
        reqres = %cfg.reqres_url,
        jsonplaceholder = %cfg.jsonplaceholder_url,
        httpbin = %cfg.httpbin_url,
        "loaded config"
    );

    let cases = cli.selection().apply(suite::all());
    if cli.list {
        for case in &cases {
            let tags: Vec<String> = case.tag_list().iter().map(|t| t.to_string()).collect();
            println!("{} [{}]", case.name(), tags.join(", "));
        }
        return Ok(0);
    }
    if cases.is_empty() {
        warn!("no tests matched the selection");
    }

    let runner = Runner::new(standard_fixtures(&cfg)?)?.with_jobs(cli.jobs);

    let run = runner.run(&cases);
    tokio::pin!(run);
    let summary = tokio::select! {
        summary = &mut run => summary,
        _ = tokio::signal::ctrl_c() => {
            runner.interrupt();
            let summary = run.await;
            log_summary(&summary);
            return Ok(EXIT_INTERRUPTED);
        }
    };

    log_summary(&summary);
    Ok(summary.exit_code())
}
