//! Tracing setup for the command-line binary.

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Maps `-v` repetitions to a default filter. `RUST_LOG` wins when set.
pub fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "issue_analytics=warn",
        1 => "issue_analytics=info",
        2 => "issue_analytics=debug,sqlx=info",
        _ => "trace",
    }
}

pub fn init_logging(verbose: u8) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level(verbose)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose >= 2)
        .with_line_number(verbose >= 3)
        .init();

    debug!("issue-analytics started with verbosity level: {}", verbose);
}
