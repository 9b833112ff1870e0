//! Structured observability hooks for the build lifecycle.
//!
//! This module provides:
//! - The build-scoped tracing span, [`build_span`]
//! - Emission functions for key lifecycle events: start, tool invocation,
//!   parse anomalies, workspace retention, cleanup failures and finish
//!
//! Filtering follows `RUST_LOG`; see [`crate::telemetry::init_tracing`].

use std::path::Path;

use tracing::{debug, info, warn};

use crate::domain::outcome::BuildRoute;

/// Span tagged with the build id. Builds instrument their future with it,
/// so every event a build emits carries `build_id`.
pub fn build_span(build_id: &str) -> tracing::Span {
    tracing::info_span!("xamlforge.build", build_id = %build_id)
}

/// Emit event: build started.
pub fn emit_build_started(assembly: &str, route: BuildRoute, sources: usize, references: usize) {
    info!(
        event = "build.started",
        assembly = %assembly,
        route = ?route,
        sources = sources,
        references = references,
    );
}

/// Emit event: external tool launched.
pub fn emit_tool_invoked(program: &Path, args: &[String]) {
    info!(
        event = "build.tool_invoked",
        program = %program.display(),
        args = %args.join(" "),
    );
}

/// Emit event: external tool exited.
pub fn emit_tool_exited(exit_code: Option<i32>, duration_ms: u64, output_bytes: usize) {
    debug!(
        event = "build.tool_exited",
        exit_code = ?exit_code,
        duration_ms = duration_ms,
        output_bytes = output_bytes,
    );
}

/// Emit event: a diagnostic-looking line was skipped.
pub fn emit_parse_anomaly(line: &str, reason: &str) {
    warn!(event = "build.parse_anomaly", line = %line, reason = %reason);
}

/// Emit event: workspace kept on disk.
pub fn emit_workspace_retained(path: &Path, reason: &str) {
    info!(event = "build.workspace_retained", path = %path.display(), reason = %reason);
}

/// Emit event: workspace removal failed (debug level, never fatal).
pub fn emit_cleanup_failed(path: &Path, error: &dyn std::fmt::Display) {
    debug!(event = "build.cleanup_failed", path = %path.display(), error = %error);
}

/// Emit event: build finished.
pub fn emit_build_finished(duration_ms: u64, errors: usize, warnings: usize, succeeded: bool) {
    info!(
        event = "build.finished",
        duration_ms = duration_ms,
        errors = errors,
        warnings = warnings,
        succeeded = succeeded,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_span_carries_id() {
        let span = build_span("test-build-id");
        span.in_scope(|| {
            emit_build_started("Demo", BuildRoute::ProjectBuild, 2, 1);
            emit_build_finished(10, 0, 1, true);
        });
    }
}
