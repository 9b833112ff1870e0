//! Domain model: requests, diagnostics, outcomes and errors.

pub mod diagnostic;
pub mod error;
pub mod outcome;
pub mod request;

pub use diagnostic::{Diagnostic, Severity};
pub use error::{BuildError, BuildResult, ConfigError, RequestError};
pub use outcome::{Artifacts, BuildOutcome, BuildRoute, ParseAnomaly};
pub use request::{
    BuildRequest, BuildRequestBuilder, MarkupRole, OutputKind, SourceFile, SourceKind,
};
