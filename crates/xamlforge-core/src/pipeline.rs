//! Build orchestration: one request in, one [`BuildOutcome`] out.
//!
//! Markup requests go through project synthesis and MSBuild. Requests
//! without markup are handed to `csc` directly. Both routes share the
//! workspace, parser and finalizer.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::config::CompilerConfig;
use crate::direct;
use crate::domain::error::{BuildError, BuildResult};
use crate::domain::outcome::{BuildOutcome, BuildRoute};
use crate::domain::request::BuildRequest;
use crate::finalizer;
use crate::invoker::{CancelSignal, ProcessRunner, ToolInvocation, ToolOutput, ToolRunner};
use crate::obs;
use crate::parser::{DiagnosticParser, ParseReport};
use crate::template::{RenderedProject, Templates};
use crate::workspace::BuildWorkspace;

/// Compiles C# and XAML sources by driving an external build tool.
///
/// Holds no per-build state; one instance can serve any number of
/// concurrent builds.
#[derive(Clone)]
pub struct XamlCompiler {
    config: CompilerConfig,
    runner: Arc<dyn ToolRunner>,
    templates: Option<Templates>,
}

impl std::fmt::Debug for XamlCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XamlCompiler")
            .field("config", &self.config)
            .field("templates", &self.templates.is_some())
            .finish()
    }
}

impl XamlCompiler {
    /// Compiler that launches real processes.
    pub fn new(config: CompilerConfig) -> Self {
        Self::with_runner(config, Arc::new(ProcessRunner))
    }

    /// Compiler with a custom tool runner.
    pub fn with_runner(config: CompilerConfig, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            config,
            runner,
            templates: None,
        }
    }

    /// Use these templates instead of loading them from configuration.
    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Render the descriptors a project build of `request` would use,
    /// targeting `dir`, without touching the disk.
    pub fn render(&self, request: &BuildRequest, dir: &Path) -> BuildResult<RenderedProject> {
        Ok(self.templates()?.render(request, dir))
    }

    pub async fn compile(&self, request: &BuildRequest) -> BuildResult<BuildOutcome> {
        self.compile_with_cancel(request, &CancelSignal::never()).await
    }

    /// Compile, giving up with [`BuildError::Cancelled`] once `cancel` fires.
    pub async fn compile_with_cancel(
        &self,
        request: &BuildRequest,
        cancel: &CancelSignal,
    ) -> BuildResult<BuildOutcome> {
        let build_id = Uuid::new_v4();
        let span = obs::build_span(&build_id.to_string());
        self.run(build_id, request, cancel).instrument(span).await
    }

    /// Compile several requests concurrently. Results keep request order.
    pub async fn compile_many(&self, requests: &[BuildRequest]) -> Vec<BuildResult<BuildOutcome>> {
        join_all(requests.iter().map(|request| self.compile(request))).await
    }

    fn templates(&self) -> BuildResult<Templates> {
        match &self.templates {
            Some(templates) => Ok(templates.clone()),
            None => Ok(Templates::load(&self.config)?),
        }
    }

    async fn run(
        &self,
        build_id: Uuid,
        request: &BuildRequest,
        cancel: &CancelSignal,
    ) -> BuildResult<BuildOutcome> {
        let start = Instant::now();
        let route = if request.needs_project_build() {
            BuildRoute::ProjectBuild
        } else {
            BuildRoute::DirectCompile
        };
        obs::emit_build_started(
            request.assembly_name(),
            route,
            request.sources().len(),
            request.references().len(),
        );

        // Template problems must surface before anything is written.
        let templates = match route {
            BuildRoute::ProjectBuild => Some(self.templates()?),
            BuildRoute::DirectCompile => None,
        };

        let workspace = BuildWorkspace::allocate(&self.config.workspace_root());
        workspace.prepare().await?;

        let invocation = match self.invocation(request, &workspace, templates.as_ref()).await {
            Ok(invocation) => invocation,
            Err(e) => {
                workspace.cleanup().await;
                return Err(e);
            }
        };

        let output = match self.runner.run(&invocation, cancel).await {
            Ok(output) => output,
            Err(e) => {
                self.abandon(&workspace, &e).await;
                return Err(e);
            }
        };

        let failed = match route {
            BuildRoute::ProjectBuild => output.reports_failure(),
            BuildRoute::DirectCompile => !output.exited_successfully(),
        };
        let report = self.diagnostics(route, failed, &output);

        // A placement failure still reports what the tool said.
        let (artifacts, retained_workspace, finalize_error) =
            match finalizer::finalize(request, &workspace, self.config.keep_workspace).await {
                Ok(placed) => (placed.artifacts, placed.retained_workspace, None),
                Err(e) => {
                    warn!(error = %e, "artifact placement failed");
                    (None, Some(workspace.path().to_path_buf()), Some(e.to_string()))
                }
            };

        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = BuildOutcome {
            build_id,
            route,
            raw_output: output.report().to_string(),
            failed,
            diagnostics: report.diagnostics,
            anomalies: report.anomalies,
            artifacts,
            retained_workspace,
            finalize_error,
            duration_ms,
            finished_at: Utc::now(),
        };

        obs::emit_build_finished(
            duration_ms,
            outcome.error_count(),
            outcome.warning_count(),
            outcome.succeeded(),
        );
        Ok(outcome)
    }

    async fn invocation(
        &self,
        request: &BuildRequest,
        workspace: &BuildWorkspace,
        templates: Option<&Templates>,
    ) -> BuildResult<ToolInvocation> {
        match templates {
            Some(templates) => {
                let rendered = templates.render(request, workspace.path());
                let written = workspace.write(&rendered).await?;
                Ok(ToolInvocation::msbuild(
                    &self.config.msbuild_path,
                    &written.solution_path,
                    workspace.path(),
                )
                .with_timeout(self.config.timeout()))
            }
            None => Ok(direct::csc_invocation(&self.config, request, workspace.path())),
        }
    }

    /// MSBuild output is only scanned when the build reports failure; csc
    /// output is always scanned so warnings survive a successful compile.
    fn diagnostics(&self, route: BuildRoute, failed: bool, output: &ToolOutput) -> ParseReport {
        let scan = match route {
            BuildRoute::ProjectBuild => failed,
            BuildRoute::DirectCompile => true,
        };
        if !scan {
            return ParseReport::default();
        }
        DiagnosticParser::new(self.config.resolve_base_dir()).parse(output.report())
    }

    /// Interrupted builds keep their workspace; anything else cleans up.
    async fn abandon(&self, workspace: &BuildWorkspace, error: &BuildError) {
        match error {
            BuildError::TimedOut { .. } | BuildError::Cancelled => {
                info!(error = %error, "build interrupted");
                obs::emit_workspace_retained(workspace.path(), "build interrupted");
            }
            _ => workspace.cleanup().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records invocations and replies with a fixed output.
    struct ScriptedRunner {
        stdout: String,
        exit_code: i32,
        produce: bool,
        seen: Mutex<Vec<ToolInvocation>>,
    }

    impl ScriptedRunner {
        fn new(stdout: &str, exit_code: i32, produce: bool) -> Arc<Self> {
            Arc::new(Self {
                stdout: stdout.to_string(),
                exit_code,
                produce,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ToolRunner for ScriptedRunner {
        async fn run(&self, invocation: &ToolInvocation, _cancel: &CancelSignal) -> BuildResult<ToolOutput> {
            self.seen.lock().unwrap().push(invocation.clone());
            if self.produce {
                for name in ["App.exe", "Lib.dll"] {
                    std::fs::write(invocation.working_dir.join(name), b"assembly").unwrap();
                }
            }
            Ok(ToolOutput {
                stdout: self.stdout.clone(),
                stderr: String::new(),
                exit_code: Some(self.exit_code),
                duration_ms: 1,
            })
        }
    }

    fn config(root: &Path) -> CompilerConfig {
        CompilerConfig::default()
            .with_temp_root(root.join("tmp"))
            .with_msbuild("/tools/msbuild")
            .with_csc("/tools/csc")
            .with_diagnostic_base_dir("/src")
    }

    #[tokio::test]
    async fn test_markup_request_uses_msbuild() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new("Build succeeded.", 0, true);
        let compiler = XamlCompiler::with_runner(config(root.path()), runner.clone());
        let request = BuildRequest::builder()
            .sources(["/src/App.xaml", "/src/App.xaml.cs"])
            .output(root.path().join("App.exe"))
            .kind(crate::domain::request::OutputKind::WindowedExe)
            .build()
            .unwrap();

        let outcome = compiler.compile(&request).await.expect("compile");
        assert_eq!(outcome.route, BuildRoute::ProjectBuild);
        assert!(outcome.succeeded());

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen[0].program, Path::new("/tools/msbuild"));
        assert!(seen[0].args.last().unwrap().ends_with("App.sln"));
    }

    #[tokio::test]
    async fn test_code_only_request_uses_csc_and_keeps_warnings() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new("a.cs(3,1): warning CS0168: unused", 0, true);
        let compiler = XamlCompiler::with_runner(config(root.path()), runner.clone());
        let request = BuildRequest::builder()
            .source("/src/a.cs")
            .output(root.path().join("Lib.dll"))
            .build()
            .unwrap();

        let outcome = compiler.compile(&request).await.expect("compile");
        assert_eq!(outcome.route, BuildRoute::DirectCompile);
        assert!(outcome.succeeded());
        assert_eq!(outcome.warning_count(), 1);
        assert_eq!(outcome.diagnostics[0].file, Path::new("/src/a.cs"));
        assert_eq!(runner.seen.lock().unwrap()[0].program, Path::new("/tools/csc"));
    }

    #[tokio::test]
    async fn test_successful_project_build_ignores_diagnostic_text() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::new("a.cs(3,1): warning CS0168: unused\nBuild succeeded.", 0, true);
        let compiler = XamlCompiler::with_runner(config(root.path()), runner);
        let request = BuildRequest::builder()
            .source("/src/Page.xaml")
            .output(root.path().join("Lib.dll"))
            .build()
            .unwrap();

        let outcome = compiler.compile(&request).await.expect("compile");
        assert!(!outcome.failed);
        assert!(outcome.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_template_fails_before_io() {
        let root = tempfile::tempdir().unwrap();
        let template = root.path().join("xaml.template");
        std::fs::write(&template, "<Project>$NAME$</Project>").unwrap();
        let runner = ScriptedRunner::new("", 0, true);
        let compiler = XamlCompiler::with_runner(
            config(root.path()).with_template_override(&template),
            runner.clone(),
        );
        let request = BuildRequest::builder()
            .source("/src/Page.xaml")
            .output(root.path().join("Lib.dll"))
            .build()
            .unwrap();

        let err = compiler.compile(&request).await.unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
        assert!(runner.seen.lock().unwrap().is_empty());
        assert!(!root.path().join("tmp").exists());
    }

    #[test]
    fn test_render_is_pure() {
        let compiler = XamlCompiler::new(CompilerConfig::default());
        let request = BuildRequest::builder()
            .sources(["/src/App.xaml", "/src/App.xaml.cs"])
            .output("/out/App.exe")
            .build()
            .unwrap();
        let dir = Path::new("/nonexistent/ws");
        let first = compiler.render(&request, dir).unwrap();
        let second = compiler.render(&request, dir).unwrap();
        assert_eq!(first, second);
        assert!(!dir.exists());
    }
}
