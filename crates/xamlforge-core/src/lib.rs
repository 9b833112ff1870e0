//! xamlforge core library
//!
//! Compiles C# sources together with XAML markup by synthesizing a solution
//! and project from templates, running MSBuild over them in a throwaway
//! workspace, turning its console output into structured diagnostics and
//! moving the produced assembly to the requested location. Requests without
//! markup are compiled with `csc` directly.
//!
//! The entry point is [`XamlCompiler`].

pub mod config;
pub mod direct;
pub mod domain;
pub mod finalizer;
pub mod invoker;
pub mod obs;
pub mod parser;
pub mod pipeline;
pub mod telemetry;
pub mod template;
pub mod workspace;

pub use config::CompilerConfig;

pub use domain::{
    Artifacts, BuildError, BuildOutcome, BuildRequest, BuildRequestBuilder, BuildResult,
    BuildRoute, ConfigError, Diagnostic, MarkupRole, OutputKind, ParseAnomaly, RequestError,
    Severity, SourceFile, SourceKind,
};

pub use invoker::{
    cancel_pair, CancelHandle, CancelSignal, ProcessRunner, ToolInvocation, ToolOutput,
    ToolRunner,
};

pub use parser::{DiagnosticParser, LineParse, ParseReport};

pub use pipeline::XamlCompiler;

pub use template::{RenderedProject, Templates};
