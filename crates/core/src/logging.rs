//! Tracing subscriber setup shared by every lumiscale surface.

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "info";
/// Quiet crates whose info-level output drowns ours.
pub const DEFAULT_NOISE_FILTER: &str = "ort=error";

/// Pick the tracing filter string with the usual priority: an explicit CLI
/// filter wins outright, then `RUST_LOG`, then the verbosity ladder. The
/// noise filter is appended to every implicit choice.
pub fn select_log_filter(
    verbose: u8,
    cli_log_filter: Option<&str>,
    rust_log_env: Option<&str>,
) -> String {
    if let Some(filter) = cli_log_filter {
        return filter.to_string();
    }

    if let Some(env_filter) = rust_log_env {
        if !env_filter.trim().is_empty() {
            return format!("{env_filter},{DEFAULT_NOISE_FILTER}");
        }
    }

    let base = match verbose {
        0 => DEFAULT_LOG_FILTER,
        1 => "debug",
        _ => "trace",
    };
    format!("{base},{DEFAULT_NOISE_FILTER}")
}

/// Install the global fmt subscriber on stderr.
pub fn init(verbose: u8, cli_log_filter: Option<&str>) {
    let filter_spec = select_log_filter(
        verbose,
        cli_log_filter,
        std::env::var("RUST_LOG").ok().as_deref(),
    );

    let env_filter = EnvFilter::try_new(&filter_spec).unwrap_or_else(|error| {
        eprintln!(
            "Invalid log filter '{filter_spec}' ({error}); falling back to '{DEFAULT_LOG_FILTER}'"
        );
        EnvFilter::new(DEFAULT_LOG_FILTER)
    });

    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!(
            "Failed to initialize tracing subscriber: {error}. Continuing without structured tracing."
        );
    }
}
