//! Diagnostic parser for MSBuild and csc console output.
//!
//! Recognizes lines of the form
//!
//! ```text
//! path(line,column): error CODE: message
//! path: warning CODE: message
//! ```
//!
//! Each line goes through four stages: locate the severity marker, split
//! into location and description, parse the optional `(line,column)` suffix,
//! and split the description into code and message. The result is a tagged
//! [`LineParse`] so callers can tell diagnostics, noise, the end-of-report
//! marker and malformed lines apart.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use path_clean::PathClean;
use regex::Regex;

use crate::domain::diagnostic::{Diagnostic, Severity};
use crate::domain::outcome::ParseAnomaly;
use crate::obs;

pub const WARNING_MARKER: &str = ": warning ";
pub const ERROR_MARKER: &str = ": error ";

/// Lines ending with this close the diagnostic section of a report.
pub const DONE_MARKER: &str = "Done building project";

/// Classification of one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineParse {
    Diagnostic(Diagnostic),
    /// Blank, banner or other non-diagnostic text.
    Skip,
    /// End of the diagnostic section; nothing after it is parsed.
    Stop,
    /// Looked like a diagnostic but the location was unparseable.
    Malformed(ParseAnomaly),
}

/// Everything extracted from one captured output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseReport {
    pub diagnostics: Vec<Diagnostic>,
    pub anomalies: Vec<ParseAnomaly>,
    /// Whether scanning ended at a `Done building project` line.
    pub stopped_at_summary: bool,
}

/// Location part of a diagnostic line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Location<'a> {
    Path(&'a str),
    Positioned { path: &'a str, line: u32, column: u32 },
}

/// Turns build output into [`Diagnostic`]s.
#[derive(Debug, Clone)]
pub struct DiagnosticParser {
    base_dir: PathBuf,
}

impl DiagnosticParser {
    /// Relative file paths are resolved against `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Parse a full captured output.
    ///
    /// Malformed lines are skipped and recorded; they never abort the parse.
    pub fn parse(&self, output: &str) -> ParseReport {
        let mut report = ParseReport::default();
        for raw in output.lines() {
            match self.parse_line(raw) {
                LineParse::Diagnostic(diagnostic) => report.diagnostics.push(diagnostic),
                LineParse::Skip => {}
                LineParse::Stop => {
                    report.stopped_at_summary = true;
                    break;
                }
                LineParse::Malformed(anomaly) => {
                    obs::emit_parse_anomaly(&anomaly.line, &anomaly.reason);
                    report.anomalies.push(anomaly);
                }
            }
        }
        report
    }

    /// Classify a single line.
    pub fn parse_line(&self, raw: &str) -> LineParse {
        let line = raw.trim();
        if line.is_empty() {
            return LineParse::Skip;
        }
        if line.ends_with(DONE_MARKER) {
            return LineParse::Stop;
        }

        let Some((severity, location, description)) = split_at_marker(line) else {
            return LineParse::Skip;
        };

        let location = match parse_location(location) {
            Ok(location) => location,
            Err(reason) => {
                return LineParse::Malformed(ParseAnomaly {
                    line: line.to_string(),
                    reason,
                })
            }
        };

        let (code, message) = split_code(description);
        let mut diagnostic = match location {
            Location::Path(path) => Diagnostic::new(severity, self.resolve(path), message),
            Location::Positioned { path, line, column } => {
                Diagnostic::new(severity, self.resolve(path), message).with_position(line, column)
            }
        };
        if let Some(code) = code {
            diagnostic = diagnostic.with_code(code);
        }
        LineParse::Diagnostic(diagnostic.with_evidence(line))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        absolutize(&self.base_dir, Path::new(path))
    }
}

/// Stage 1 and 2: find the first warning marker, else the first error
/// marker, and split around it.
fn split_at_marker(line: &str) -> Option<(Severity, &str, &str)> {
    let (severity, marker, at) = match line.find(WARNING_MARKER) {
        Some(at) => (Severity::Warning, WARNING_MARKER, at),
        None => (Severity::Error, ERROR_MARKER, line.find(ERROR_MARKER)?),
    };
    Some((severity, &line[..at], &line[at + marker.len()..]))
}

fn position_regex() -> Option<&'static Regex> {
    static POSITION: OnceLock<Option<Regex>> = OnceLock::new();
    POSITION
        .get_or_init(|| Regex::new(r"^(?P<path>.*)\((?P<position>[^()]*)\)$").ok())
        .as_ref()
}

/// Stage 3: a location ending in `)` must carry `(line,column)`; MSBuild's
/// range form `(line,column,endLine,endColumn)` is accepted and truncated.
fn parse_location(location: &str) -> Result<Location<'_>, String> {
    if !location.ends_with(')') {
        return Ok(Location::Path(location.trim()));
    }

    let captures = position_regex()
        .and_then(|re| re.captures(location))
        .ok_or_else(|| format!("unbalanced parenthesis in location {:?}", location))?;
    let (Some(path), Some(position)) = (captures.name("path"), captures.name("position")) else {
        return Err(format!("unrecognized location {:?}", location));
    };

    let numbers = position
        .as_str()
        .split(',')
        .map(|n| n.trim().parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| format!("non-numeric position ({})", position.as_str()))?;

    match numbers.as_slice() {
        [line, column, ..] => Ok(Location::Positioned {
            path: path.as_str().trim(),
            line: *line,
            column: *column,
        }),
        _ => Err(format!(
            "position ({}) needs a line and a column",
            position.as_str()
        )),
    }
}

/// Stage 4: `CODE: message`. Without a colon the whole text is the message.
fn split_code(description: &str) -> (Option<String>, String) {
    match description.split_once(':') {
        Some((code, message)) => {
            let code = code.trim();
            let code = (!code.is_empty()).then(|| code.to_string());
            (code, message.trim().to_string())
        }
        None => (None, description.trim().to_string()),
    }
}

/// Join `path` onto `base` when relative and fold `.` and `..` lexically.
/// The file does not need to exist.
pub fn absolutize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    joined.clean()
}
