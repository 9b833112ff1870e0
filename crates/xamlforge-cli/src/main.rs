//! xamlforge - compile C# and XAML sources through MSBuild
//!
//! ## Commands
//!
//! - `build`: compile sources into an executable or library
//! - `render`: print the solution and project a build would generate
//! - `parse`: extract diagnostics from a saved build log

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Level};

use xamlforge_core::{
    cancel_pair, BuildOutcome, BuildRequest, CompilerConfig, DiagnosticParser, OutputKind,
    XamlCompiler,
};

#[derive(Parser)]
#[command(name = "xamlforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build C# and XAML sources with MSBuild", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile sources into an assembly
    Build {
        #[command(flatten)]
        request: RequestArgs,

        #[command(flatten)]
        tools: ToolArgs,

        /// Abort the build after this many seconds
        #[arg(long, env = "XAMLFORGE_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,

        /// Leave the workspace on disk after the build
        #[arg(long)]
        keep_workspace: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the descriptors a build would generate, without building
    Render {
        #[command(flatten)]
        request: RequestArgs,

        /// Project template override
        #[arg(long, env = "XAMLFORGE_TEMPLATE")]
        template: Option<PathBuf>,

        /// Directory the rendered project would build into
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// Extract diagnostics from a saved build log
    Parse {
        /// Log file to read
        log: PathBuf,

        /// Directory relative paths in the log are resolved against
        #[arg(long)]
        base_dir: Option<PathBuf>,

        /// Print diagnostics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Source files (.cs and .xaml)
    #[arg(required = true)]
    sources: Vec<PathBuf>,

    /// Output assembly path
    #[arg(short, long)]
    out: PathBuf,

    /// Kind of assembly to produce
    #[arg(short, long, value_enum, default_value_t = KindArg::Windowed)]
    kind: KindArg,

    /// Referenced assembly (repeatable)
    #[arg(short = 'r', long = "ref")]
    references: Vec<PathBuf>,

    /// Emit debug information and skip optimization
    #[arg(long)]
    debug: bool,

    /// Markup file holding the application definition
    #[arg(long, conflicts_with = "detect_app_root")]
    app_root: Option<PathBuf>,

    /// Find the application definition by scanning markup content
    #[arg(long)]
    detect_app_root: bool,

    /// Extra compiler options, passed through on the direct route
    #[arg(long, allow_hyphen_values = true)]
    options: Option<String>,
}

#[derive(Args)]
struct ToolArgs {
    /// MSBuild executable
    #[arg(long, env = "XAMLFORGE_MSBUILD")]
    msbuild: Option<PathBuf>,

    /// C# compiler for builds without markup
    #[arg(long, env = "XAMLFORGE_CSC")]
    csc: Option<PathBuf>,

    /// Project template override
    #[arg(long, env = "XAMLFORGE_TEMPLATE")]
    template: Option<PathBuf>,

    /// Parent directory for build workspaces
    #[arg(long, env = "XAMLFORGE_TEMP_ROOT")]
    temp_root: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Console,
    Windowed,
    Library,
}

impl From<KindArg> for OutputKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Console => OutputKind::ConsoleExe,
            KindArg::Windowed => OutputKind::WindowedExe,
            KindArg::Library => OutputKind::Library,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    xamlforge_core::telemetry::init_tracing(cli.json_logs, level);

    match cli.command {
        Commands::Build {
            request,
            tools,
            timeout_secs,
            keep_workspace,
            json,
        } => {
            let config = build_config(&tools, timeout_secs, keep_workspace)?;
            cmd_build(config, &request, json).await
        }
        Commands::Render {
            request,
            template,
            dir,
        } => {
            let mut config = CompilerConfig::from_env().context("Invalid environment configuration")?;
            if let Some(template) = template {
                config = config.with_template_override(template);
            }
            cmd_render(config, &request, &dir)
        }
        Commands::Parse {
            log,
            base_dir,
            json,
        } => cmd_parse(&log, base_dir, json).await,
    }
}

/// Environment first, then explicit flags.
fn build_config(tools: &ToolArgs, timeout_secs: Option<u64>, keep_workspace: bool) -> Result<CompilerConfig> {
    let mut config = CompilerConfig::from_env().context("Invalid environment configuration")?;
    if let Some(msbuild) = &tools.msbuild {
        config = config.with_msbuild(msbuild);
    }
    if let Some(csc) = &tools.csc {
        config = config.with_csc(csc);
    }
    if let Some(template) = &tools.template {
        config = config.with_template_override(template);
    }
    if let Some(root) = &tools.temp_root {
        config = config.with_temp_root(root);
    }
    if let Some(secs) = timeout_secs.filter(|s| *s > 0) {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if keep_workspace {
        config = config.keep_workspace(true);
    }
    Ok(config)
}

fn build_request(args: &RequestArgs) -> Result<BuildRequest> {
    let mut builder = BuildRequest::builder()
        .sources(args.sources.iter().cloned())
        .references(args.references.iter().cloned())
        .output(&args.out)
        .kind(args.kind.into())
        .debug(args.debug);
    if let Some(root) = &args.app_root {
        builder = builder.application_root(root);
    }
    if args.detect_app_root {
        builder = builder.detect_application_root();
    }
    if let Some(options) = &args.options {
        builder = builder.compiler_options(options);
    }
    builder.build().context("Invalid build request")
}

async fn cmd_build(config: CompilerConfig, args: &RequestArgs, json: bool) -> Result<()> {
    let request = build_request(args)?;
    let compiler = XamlCompiler::new(config);

    let (handle, cancel) = cancel_pair();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling build");
            handle.cancel();
        }
    });

    let result = compiler.compile_with_cancel(&request, &cancel).await;
    ctrl_c.abort();
    let outcome = result.context("Build could not run")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    if outcome.succeeded() {
        Ok(())
    } else {
        anyhow::bail!("Build failed")
    }
}

fn print_outcome(outcome: &BuildOutcome) {
    for diagnostic in &outcome.diagnostics {
        println!("{}", diagnostic);
    }
    for anomaly in &outcome.anomalies {
        println!("skipped: {} ({})", anomaly.line, anomaly.reason);
    }
    if !outcome.diagnostics.is_empty() {
        println!();
    }

    match &outcome.artifacts {
        Some(artifacts) => {
            println!("Assembly: {}", artifacts.assembly.display());
            if let Some(pdb) = &artifacts.debug_symbols {
                println!("Symbols:  {}", pdb.display());
            }
            println!("SHA-256:  {}", artifacts.assembly_sha256);
        }
        None => match &outcome.finalize_error {
            Some(error) => println!("Assembly not placed: {}", error),
            None => println!("No assembly produced"),
        },
    }
    if let Some(dir) = &outcome.retained_workspace {
        println!("Workspace kept at {}", dir.display());
    }

    println!(
        "Status: {} ({} errors, {} warnings, {}ms)",
        if outcome.succeeded() { "✓ SUCCEEDED" } else { "✗ FAILED" },
        outcome.error_count(),
        outcome.warning_count(),
        outcome.duration_ms
    );
}

fn cmd_render(config: CompilerConfig, args: &RequestArgs, dir: &Path) -> Result<()> {
    let request = build_request(args)?;
    let compiler = XamlCompiler::new(config);
    let rendered = compiler
        .render(&request, dir)
        .context("Failed to render project")?;

    println!("# {}", rendered.solution_file_name);
    println!("{}", rendered.solution);
    println!("# {}", rendered.project_file_name);
    println!("{}", rendered.project);
    Ok(())
}

async fn cmd_parse(log: &Path, base_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let text = tokio::fs::read_to_string(log)
        .await
        .with_context(|| format!("Failed to read {}", log.display()))?;

    let base_dir = match base_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };
    let report = DiagnosticParser::new(base_dir).parse(&text);
    info!(
        diagnostics = report.diagnostics.len(),
        skipped = report.anomalies.len(),
        "log parsed"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&report.diagnostics)?);
    } else {
        for diagnostic in &report.diagnostics {
            println!("{}", diagnostic);
        }
    }
    Ok(())
}
