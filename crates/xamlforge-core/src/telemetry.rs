//! Subscriber setup for the `xamlforge` CLI.
//!
//! The CLI maps `--verbose` to [`Level::DEBUG`] and `--json-logs` to the
//! JSON formatter. Without `RUST_LOG`, only the xamlforge crates log at the
//! chosen level; dependencies stay at `warn`. Build lifecycle events from
//! [`crate::obs`] carry the `xamlforge.build` span and its `build_id`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    format!("warn,xamlforge_core={level},xamlforge={level}", level = level.as_str().to_lowercase())
}

/// Install the global subscriber, writing to stderr.
///
/// stdout carries the build report (or its `--json` form), so log lines
/// never interleave with it. A second call is a no-op.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(layer.json().with_current_span(true)).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}
