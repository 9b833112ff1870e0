//! Error taxonomy for xamlforge.
//!
//! Only environment-level problems surface as errors. A build that the
//! external tool reports as failed is data, carried in
//! [`BuildOutcome`](crate::domain::outcome::BuildOutcome).

use std::path::PathBuf;

/// Errors in configuration or templates, raised before any build I/O.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{template} template is missing required placeholder {placeholder}")]
    MissingPlaceholder {
        template: &'static str,
        placeholder: &'static str,
    },

    #[error("failed to read template override {path}: {source}")]
    TemplateUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Errors produced while constructing a [`BuildRequest`](crate::domain::request::BuildRequest).
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("build request has no source files")]
    NoSources,

    #[error("build request has no output path")]
    MissingOutput,

    #[error("output path {0} has no usable file name")]
    InvalidOutputPath(PathBuf),

    #[error("more than one application-root markup file: {first} and {second}")]
    MultipleApplicationRoots { first: PathBuf, second: PathBuf },

    #[error("application root {0} is not a markup file")]
    ApplicationRootNotMarkup(PathBuf),

    #[error("application root {0} is not one of the request's sources")]
    UnknownApplicationRoot(PathBuf),
}

/// Errors that abort a build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid build request: {0}")]
    Request(#[from] RequestError),

    #[error("workspace {path} could not be prepared: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("build tool not found: {0}")]
    ToolNotFound(PathBuf),

    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("build tool timed out after {elapsed_ms}ms (limit {limit_ms}ms)")]
    TimedOut { elapsed_ms: u64, limit_ms: u64 },

    #[error("build cancelled")]
    Cancelled,

    #[error("failed to place artifact {from} at {to}: {source}")]
    Finalize {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for build operations.
pub type BuildResult<T> = std::result::Result<T, BuildError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_placeholder_display() {
        let err = ConfigError::MissingPlaceholder {
            template: "project",
            placeholder: "$SOURCE_FILES$",
        };
        assert_eq!(
            err.to_string(),
            "project template is missing required placeholder $SOURCE_FILES$"
        );
    }

    #[test]
    fn test_build_error_wraps_request_error() {
        let err: BuildError = RequestError::NoSources.into();
        assert!(err.to_string().contains("no source files"));
        assert!(matches!(err, BuildError::Request(RequestError::NoSources)));
    }

    #[test]
    fn test_timeout_display() {
        let err = BuildError::TimedOut {
            elapsed_ms: 5001,
            limit_ms: 5000,
        };
        assert!(err.to_string().contains("limit 5000ms"));
    }
}
