//! Tracing bootstrap shared by the binaries in this workspace.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const WORKSPACE_TARGETS: &[&str] = &[
    "stream_formatter",
    "generate_api",
    "generation_provider_http",
    "transcript_store",
    "chat_cli",
];

/// Build the filter: a default level per workspace crate, then `RUST_LOG`,
/// whose directives win for any target they name.
pub fn env_filter(verbose: bool) -> EnvFilter {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    filter_from(rust_log.as_deref(), verbose)
}

fn filter_from(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    let level = if verbose { "debug" } else { "info" };
    let mut directives: Vec<String> = WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{target}={level}"))
        .collect();
    if let Some(rust_log) = rust_log.map(str::trim).filter(|value| !value.is_empty()) {
        directives.push(rust_log.to_string());
    }
    EnvFilter::builder().parse_lossy(directives.join(","))
}

/// Install a stderr fmt subscriber. Calling this twice is a no-op.
pub fn init_tracing(verbose: bool) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose),
        )
        .with(env_filter(verbose))
        .try_init();
}
