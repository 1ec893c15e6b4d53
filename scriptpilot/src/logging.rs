//! Diagnostics for the agent, written to stderr.
//!
//! Conversation output goes to stdout; tracing never mixes with it.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when `RUST_LOG` is unset.
const DEFAULT_DIRECTIVE: &str = "warn";
/// Filter under `--quiet`; overrides `RUST_LOG`.
const QUIET_DIRECTIVE: &str = "error";

/// Install the stderr subscriber.
///
/// `quiet` keeps only errors, e.g. when `scriptpilot ask` runs inside a
/// script that parses stdout and stderr.
///
/// # Example
/// ```bash
/// RUST_LOG=scriptpilot=debug cargo run -- chat
/// ```
pub fn init(quiet: bool) {
    tracing_subscriber::registry()
        .with(filter(quiet, std::env::var("RUST_LOG").ok().as_deref()))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

fn filter(quiet: bool, env: Option<&str>) -> EnvFilter {
    if quiet {
        return EnvFilter::new(QUIET_DIRECTIVE);
    }
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}
