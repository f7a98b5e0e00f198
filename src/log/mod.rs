// tracing_setup.rs
use tracing_error::ErrorLayer;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Layer, Registry};

/// Map CLI verbosity flags to a default filter directive.
///
/// `quiet` wins over `verbose`.
pub fn level_for(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize tracing subscriber.
///
/// Behavior:
/// - Log level is read from `APICHECK_LOG_LEVEL` if set, otherwise falls back to `RUST_LOG`
///   (via try_from_default_env), then to `default_level` (derived from `-v`/`-q`).
/// - Output format can be set via `APICHECK_LOG_FORMAT=json` to enable JSON output. Any other value uses the
///   default human-readable formatter.
pub fn init_tracing(default_level: &str) {
    let filter = match std::env::var("APICHECK_LOG_LEVEL") {
        Ok(lvl) => EnvFilter::new(lvl),
        Err(_) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
        }
    };

    let use_json = std::env::var("APICHECK_LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let fmt_layer = if use_json {
        fmt::layer()
            .json()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)
        .expect("failed to set global tracing subscriber");
}
