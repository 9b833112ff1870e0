//! Structured diagnostics extracted from build tool output.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single error or warning reported by the build tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,

    /// Absolute path of the file the diagnostic points at.
    pub file: PathBuf,

    /// Line number (1-indexed), when the location carried one.
    pub line: Option<u32>,

    /// Column number (1-indexed), when the location carried one.
    pub column: Option<u32>,

    /// Compiler diagnostic code (e.g. "CS1002").
    pub code: Option<String>,

    /// Human-readable message.
    pub message: String,

    /// The output line this diagnostic was parsed from.
    pub evidence: Option<String>,
}

impl Diagnostic {
    /// Sentinel reported for an unknown line or column.
    pub const UNKNOWN: i64 = -1;

    pub fn new(severity: Severity, file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            severity,
            file: file.into(),
            line: None,
            column: None,
            code: None,
            message: message.into(),
            evidence: None,
        }
    }

    /// Set line and column.
    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_evidence(mut self, evidence: impl Into<String>) -> Self {
        self.evidence = Some(evidence.into());
        self
    }

    /// Line number, or [`Diagnostic::UNKNOWN`].
    pub fn line_number(&self) -> i64 {
        self.line.map_or(Self::UNKNOWN, i64::from)
    }

    /// Column number, or [`Diagnostic::UNKNOWN`].
    pub fn column_number(&self) -> i64 {
        self.column.map_or(Self::UNKNOWN, i64::from)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

/// Renders in the canonical `file(line,col): severity code: message` form.
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let (Some(line), Some(column)) = (self.line, self.column) {
            write!(f, "({},{})", line, column)?;
        }
        write!(f, ": {}", self.severity)?;
        if let Some(code) = &self.code {
            write!(f, " {}", code)?;
        }
        write!(f, ": {}", self.message)
    }
}
