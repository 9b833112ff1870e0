//! Build request: the immutable input of one compilation job.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::RequestError;

/// Marker found in the root element of an application definition.
const APPLICATION_ROOT_MARKER: &str = "<Application x:Class";

/// Role of a markup file inside the generated project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MarkupRole {
    /// Ordinary page or window.
    Page,
    /// The single entry-point application definition.
    ApplicationRoot,
}

/// What a source file is, as far as project synthesis cares.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// C# code file.
    Code,
    /// XAML markup file.
    Markup(MarkupRole),
    /// Anything else; compiled as a plain item.
    Other,
}

impl SourceKind {
    /// Classify a path by extension. Markup defaults to a page.
    pub fn classify(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("cs") => SourceKind::Code,
            Some("xaml") => SourceKind::Markup(MarkupRole::Page),
            _ => SourceKind::Other,
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, SourceKind::Markup(_))
    }

    pub fn is_application_root(&self) -> bool {
        matches!(self, SourceKind::Markup(MarkupRole::ApplicationRoot))
    }
}

/// One source file of a request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl SourceFile {
    /// Create a source entry, classifying it by extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = SourceKind::classify(&path);
        Self { path, kind }
    }

    /// Override the classified kind.
    pub fn with_kind(mut self, kind: SourceKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Kind of assembly to produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    ConsoleExe,
    WindowedExe,
    Library,
}

impl OutputKind {
    /// Pick the output kind the way a code provider does: executables are
    /// windowed when `/target:winexe` appears among the free-form options.
    pub fn resolve(generate_executable: bool, compiler_options: Option<&str>) -> Self {
        if !generate_executable {
            return OutputKind::Library;
        }
        match compiler_options {
            Some(opts) if opts.contains("/target:winexe") => OutputKind::WindowedExe,
            _ => OutputKind::ConsoleExe,
        }
    }

    /// Value of the MSBuild `OutputType` property.
    pub fn msbuild_type(&self) -> &'static str {
        match self {
            OutputKind::ConsoleExe => "Exe",
            OutputKind::WindowedExe => "WinExe",
            OutputKind::Library => "Library",
        }
    }

    /// Value of the `csc /target:` switch.
    pub fn csc_target(&self) -> &'static str {
        match self {
            OutputKind::ConsoleExe => "exe",
            OutputKind::WindowedExe => "winexe",
            OutputKind::Library => "library",
        }
    }

    /// File extension of the produced assembly.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputKind::ConsoleExe | OutputKind::WindowedExe => "exe",
            OutputKind::Library => "dll",
        }
    }

    pub fn is_executable(&self) -> bool {
        !matches!(self, OutputKind::Library)
    }
}

/// A complete, validated set of inputs for one build.
///
/// Constructed through [`BuildRequest::builder`]; at most one source carries
/// the application-root tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    sources: Vec<SourceFile>,
    output: PathBuf,
    assembly_name: String,
    kind: OutputKind,
    references: Vec<PathBuf>,
    debug: bool,
    compiler_options: Option<String>,
}

impl BuildRequest {
    pub fn builder() -> BuildRequestBuilder {
        BuildRequestBuilder::default()
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    /// Final path the caller wants the assembly at.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Assembly name, i.e. the output file stem.
    pub fn assembly_name(&self) -> &str {
        &self.assembly_name
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub fn references(&self) -> &[PathBuf] {
        &self.references
    }

    /// Whether debug information (and unoptimized code) was requested.
    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn compiler_options(&self) -> Option<&str> {
        self.compiler_options.as_deref()
    }

    pub fn application_root(&self) -> Option<&SourceFile> {
        self.sources.iter().find(|s| s.kind.is_application_root())
    }

    /// True when any source is markup, which needs a full project build.
    pub fn needs_project_build(&self) -> bool {
        self.sources.iter().any(|s| s.kind.is_markup())
    }

    /// File name of the assembly as the build tool produces it.
    pub fn artifact_file_name(&self) -> String {
        format!("{}.{}", self.assembly_name, self.kind.extension())
    }
}

/// Builder for [`BuildRequest`].
#[derive(Debug, Default)]
pub struct BuildRequestBuilder {
    sources: Vec<SourceFile>,
    output: Option<PathBuf>,
    kind: Option<OutputKind>,
    generate_executable: bool,
    references: Vec<PathBuf>,
    debug: bool,
    compiler_options: Option<String>,
    application_root: Option<PathBuf>,
    detect_root: bool,
}

impl BuildRequestBuilder {
    /// Add a source file, classified by extension.
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(SourceFile::new(path));
        self
    }

    /// Add an already classified source file.
    pub fn source_file(mut self, file: SourceFile) -> Self {
        self.sources.push(file);
        self
    }

    pub fn sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources.extend(paths.into_iter().map(SourceFile::new));
        self
    }

    pub fn reference(mut self, path: impl Into<PathBuf>) -> Self {
        self.references.push(path.into());
        self
    }

    pub fn references<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.references.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Set the output kind explicitly. Takes precedence over
    /// [`executable`](Self::executable) and compiler options.
    pub fn kind(mut self, kind: OutputKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Produce an executable; windowed if the options ask for `/target:winexe`.
    pub fn executable(mut self, generate_executable: bool) -> Self {
        self.generate_executable = generate_executable;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn compiler_options(mut self, options: impl Into<String>) -> Self {
        self.compiler_options = Some(options.into());
        self
    }

    /// Tag the given markup source as the application root.
    pub fn application_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.application_root = Some(path.into());
        self
    }

    /// Tag the first markup file whose content declares an `<Application>`
    /// root element, unless a root was set explicitly.
    pub fn detect_application_root(mut self) -> Self {
        self.detect_root = true;
        self
    }

    pub fn build(mut self) -> Result<BuildRequest, RequestError> {
        if self.sources.is_empty() {
            return Err(RequestError::NoSources);
        }
        let output = self.output.take().ok_or(RequestError::MissingOutput)?;
        let assembly_name = output
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| RequestError::InvalidOutputPath(output.clone()))?
            .to_string();

        if let Some(root) = self.application_root.take() {
            let source = self
                .sources
                .iter_mut()
                .find(|s| s.path == root)
                .ok_or_else(|| RequestError::UnknownApplicationRoot(root.clone()))?;
            if !source.kind.is_markup() {
                return Err(RequestError::ApplicationRootNotMarkup(root));
            }
            source.kind = SourceKind::Markup(MarkupRole::ApplicationRoot);
        } else if self.detect_root && !self.sources.iter().any(|s| s.kind.is_application_root()) {
            if let Some(source) = self.sources.iter_mut().find(|s| declares_application(s)) {
                debug!(path = %source.path.display(), "detected application root markup");
                source.kind = SourceKind::Markup(MarkupRole::ApplicationRoot);
            }
        }

        let mut roots = self.sources.iter().filter(|s| s.kind.is_application_root());
        if let (Some(first), Some(second)) = (roots.next(), roots.next()) {
            return Err(RequestError::MultipleApplicationRoots {
                first: first.path.clone(),
                second: second.path.clone(),
            });
        }

        let kind = self.kind.unwrap_or_else(|| {
            OutputKind::resolve(self.generate_executable, self.compiler_options.as_deref())
        });

        Ok(BuildRequest {
            sources: self.sources,
            output,
            assembly_name,
            kind,
            references: self.references,
            debug: self.debug,
            compiler_options: self.compiler_options,
        })
    }
}

/// Unreadable markup is treated as an ordinary page.
fn declares_application(source: &SourceFile) -> bool {
    if !source.kind.is_markup() {
        return false;
    }
    match std::fs::read_to_string(&source.path) {
        Ok(content) => content.contains(APPLICATION_ROOT_MARKER),
        Err(e) => {
            debug!(path = %source.path.display(), error = %e, "markup not readable for root detection");
            false
        }
    }
}
