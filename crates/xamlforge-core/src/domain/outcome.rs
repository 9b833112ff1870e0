//! Result of one build.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::diagnostic::Diagnostic;

/// How the sources were compiled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BuildRoute {
    /// Generated solution built by MSBuild.
    ProjectBuild,
    /// Plain `csc` invocation, used when there is no markup.
    DirectCompile,
}

/// Files placed at the caller's output path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Artifacts {
    /// Final assembly path.
    pub assembly: PathBuf,

    /// Final debug-symbol path, when requested and produced.
    pub debug_symbols: Option<PathBuf>,

    /// Hex SHA-256 of the assembly.
    pub assembly_sha256: String,
}

/// An output line that looked like a diagnostic but could not be parsed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParseAnomaly {
    pub line: String,
    pub reason: String,
}

/// Everything the caller learns about a build.
///
/// A build succeeded when an artifact was produced and placed and no error
/// diagnostic was reported. Warnings may be present either way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildOutcome {
    pub build_id: Uuid,

    pub route: BuildRoute,

    /// Captured tool output, trimmed.
    pub raw_output: String,

    /// Whether the tool reported failure.
    pub failed: bool,

    /// Diagnostics in output order.
    pub diagnostics: Vec<Diagnostic>,

    /// Lines skipped because their location could not be parsed.
    pub anomalies: Vec<ParseAnomaly>,

    /// Finalized artifacts, absent when the tool produced none.
    pub artifacts: Option<Artifacts>,

    /// Workspace directory left on disk for inspection.
    pub retained_workspace: Option<PathBuf>,

    /// Why the produced assembly could not be placed at the output path.
    /// The workspace is retained when this is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finalize_error: Option<String>,

    pub duration_ms: u64,

    pub finished_at: DateTime<Utc>,
}

impl BuildOutcome {
    pub fn succeeded(&self) -> bool {
        !self.failed
            && self.artifacts.is_some()
            && self.finalize_error.is_none()
            && self.error_count() == 0
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_warning())
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn assembly(&self) -> Option<&PathBuf> {
        self.artifacts.as_ref().map(|a| &a.assembly)
    }
}
