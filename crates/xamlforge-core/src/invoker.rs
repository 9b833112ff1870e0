//! External build tool invocation.
//!
//! [`ToolRunner`] is the seam between the pipeline and the outside world.
//! [`ProcessRunner`] launches the tool with tokio, drains stdout and stderr
//! line by line while waiting for exit, and enforces an optional deadline and
//! a cancellation signal by killing the child.

use std::future::pending;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::domain::error::{BuildError, BuildResult};
use crate::obs;

/// Trailing text MSBuild prints when a build fails.
pub const FAILURE_SENTINEL: &str = "-- FAILED.";

/// Configuration name shared by the solution and project templates.
pub const BUILD_CONFIGURATION: &str = "CSSBuild";

/// Sender half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiver half of a cancellation signal; cheap to clone.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without cancelling.
                pending::<()>().await;
            }
        }
    }
}

/// Create a linked cancel handle and signal.
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// A fully specified tool launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub timeout: Option<Duration>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.into(),
            timeout: None,
        }
    }

    /// Clean-then-build of `solution` in the fixed configuration, Any CPU,
    /// minimal verbosity.
    pub fn msbuild(program: &Path, solution: &Path, working_dir: &Path) -> Self {
        let args = vec![
            "/nologo".to_string(),
            "/verbosity:minimal".to_string(),
            "/t:Clean,Build".to_string(),
            format!("/p:Configuration={}", BUILD_CONFIGURATION),
            "/p:Platform=Any CPU".to_string(),
            solution.display().to_string(),
        ];
        Self::new(program, args, working_dir)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// What a tool run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Standard output, one `\n` per line, trimmed.
    pub stdout: String,

    /// Standard error, kept apart from the build report.
    pub stderr: String,

    /// Exit code; `None` when terminated by a signal.
    pub exit_code: Option<i32>,

    pub duration_ms: u64,
}

impl ToolOutput {
    /// Captured stdout without surrounding whitespace.
    pub fn report(&self) -> &str {
        self.stdout.trim()
    }

    /// Whether the output ends with the MSBuild failure sentinel, ignoring
    /// trailing whitespace.
    pub fn reports_failure(&self) -> bool {
        self.report().ends_with(FAILURE_SENTINEL)
    }

    pub fn exited_successfully(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs an external build tool.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, invocation: &ToolInvocation, cancel: &CancelSignal) -> BuildResult<ToolOutput>;
}

/// [`ToolRunner`] backed by a real child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

enum Exit {
    Finished(std::io::Result<(String, String, ExitStatus)>),
    TimedOut,
    Cancelled,
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation, cancel: &CancelSignal) -> BuildResult<ToolOutput> {
        if cancel.is_cancelled() {
            return Err(BuildError::Cancelled);
        }

        let start = Instant::now();
        obs::emit_tool_invoked(&invocation.program, &invocation.args);

        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::NotFound {
                    BuildError::ToolNotFound(invocation.program.clone())
                } else {
                    BuildError::Spawn {
                        program: invocation.program.clone(),
                        source,
                    }
                }
            })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        // Both pipes are drained while waiting so a full pipe buffer can
        // never stall the child.
        let drain_and_wait = async {
            let (stdout, stderr, status) = tokio::join!(
                drain_lines(stdout_pipe),
                drain_lines(stderr_pipe),
                child.wait()
            );
            Ok::<_, std::io::Error>((stdout?, stderr?, status?))
        };

        let exit = tokio::select! {
            result = drain_and_wait => Exit::Finished(result),
            _ = deadline(invocation.timeout) => Exit::TimedOut,
            _ = cancel.cancelled() => Exit::Cancelled,
        };

        let (stdout, stderr, status) = match exit {
            Exit::Finished(result) => result?,
            Exit::TimedOut => {
                kill(&mut child).await;
                return Err(BuildError::TimedOut {
                    elapsed_ms: start.elapsed().as_millis() as u64,
                    limit_ms: invocation.timeout.map_or(0, |t| t.as_millis() as u64),
                });
            }
            Exit::Cancelled => {
                kill(&mut child).await;
                return Err(BuildError::Cancelled);
            }
        };

        let output = ToolOutput {
            stdout: stdout.trim().to_string(),
            stderr,
            exit_code: status.code(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        obs::emit_tool_exited(output.exit_code, output.duration_ms, output.stdout.len());
        Ok(output)
    }
}

async fn kill(child: &mut tokio::process::Child) {
    if let Err(e) = child.kill().await {
        debug!(error = %e, "failed to kill build tool");
    }
}

async fn deadline(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => pending::<()>().await,
    }
}

/// Read `pipe` to end of stream, normalizing line endings to `\n`.
/// Bytes that are not UTF-8 are replaced rather than failing the build.
async fn drain_lines<R>(pipe: Option<R>) -> std::io::Result<String>
where
    R: AsyncRead + Unpin,
{
    let Some(pipe) = pipe else {
        return Ok(String::new());
    };
    let mut reader = BufReader::new(pipe);
    let mut buf = Vec::new();
    let mut text = String::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\r', '\n']);
        trace!(line = %line, "tool output");
        text.push_str(line);
        text.push('\n');
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_msbuild_arguments() {
        let inv = ToolInvocation::msbuild(
            Path::new("/tools/MSBuild.exe"),
            Path::new("/tmp/ws/Demo.sln"),
            Path::new("/tmp/ws"),
        );
        assert_eq!(
            inv.args,
            vec![
                "/nologo",
                "/verbosity:minimal",
                "/t:Clean,Build",
                "/p:Configuration=CSSBuild",
                "/p:Platform=Any CPU",
                "/tmp/ws/Demo.sln",
            ]
        );
        assert_eq!(inv.working_dir, PathBuf::from("/tmp/ws"));
        assert!(inv.timeout.is_none());
    }

    #[test]
    fn test_reports_failure_only_on_trailing_sentinel() {
        let mut output = ToolOutput {
            stdout: "a.cs(1,1): error CS1002: ; expected\nDone building project \"Demo.csproj\" -- FAILED.".to_string(),
            stderr: String::new(),
            exit_code: Some(1),
            duration_ms: 1,
        };
        assert!(output.reports_failure());

        output.stdout.push_str("\r\n\n");
        assert!(output.reports_failure());
        assert!(output.report().ends_with("-- FAILED."));

        output.stdout = "-- FAILED. but then more text".to_string();
        assert!(!output.reports_failure());

        output.stdout = String::new();
        assert!(!output.reports_failure());
    }

    #[tokio::test]
    async fn test_cancel_signal() {
        let (handle, signal) = cancel_pair();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
        signal.cancelled().await;
    }

    #[tokio::test]
    async fn test_never_signal_does_not_fire() {
        let signal = CancelSignal::never();
        let fired = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(fired.is_err());
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let inv = ToolInvocation::new("/definitely/not/a/tool", Vec::new(), dir.path());
        let err = ProcessRunner.run(&inv, &CancelSignal::never()).await.unwrap_err();
        assert!(matches!(err, BuildError::ToolNotFound(_)));
    }

    #[cfg(unix)]
    fn sh(script: &str, dir: &Path) -> ToolInvocation {
        ToolInvocation::new("sh", vec!["-c".to_string(), script.to_string()], dir)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_and_trims_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh("printf '\\n  first\\r\\nsecond\\n\\n'; echo oops >&2", dir.path());
        let output = ProcessRunner.run(&inv, &CancelSignal::never()).await.expect("run");
        assert_eq!(output.stdout, "first\nsecond");
        assert_eq!(output.stderr, "oops\n");
        assert!(output.exited_successfully());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "here").unwrap();
        let output = ProcessRunner
            .run(&sh("cat marker.txt", dir.path()), &CancelSignal::never())
            .await
            .expect("run");
        assert_eq!(output.stdout, "here");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_large_output_does_not_deadlock() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh("i=0; while [ $i -lt 20000 ]; do echo line $i; echo err $i >&2; i=$((i+1)); done", dir.path())
            .with_timeout(Some(Duration::from_secs(60)));
        let output = ProcessRunner.run(&inv, &CancelSignal::never()).await.expect("run");
        assert_eq!(output.stdout.lines().count(), 20000);
        assert!(output.stdout.ends_with("line 19999"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = ProcessRunner
            .run(&sh("echo 'Build -- FAILED.'; exit 1", dir.path()), &CancelSignal::never())
            .await
            .expect("run");
        assert_eq!(output.exit_code, Some(1));
        assert!(output.reports_failure());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_tool() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh("echo started; sleep 30", dir.path()).with_timeout(Some(Duration::from_millis(200)));
        let start = Instant::now();
        let err = ProcessRunner.run(&inv, &CancelSignal::never()).await.unwrap_err();
        assert!(matches!(err, BuildError::TimedOut { limit_ms: 200, .. }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_kills_tool() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, signal) = cancel_pair();
        let inv = sh("sleep 30", dir.path());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            handle.cancel();
        });
        let err = ProcessRunner.run(&inv, &signal).await.unwrap_err();
        canceller.await.unwrap();
        assert!(matches!(err, BuildError::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_does_not_spawn() {
        let (handle, signal) = cancel_pair();
        handle.cancel();
        let inv = ToolInvocation::new("/definitely/not/a/tool", Vec::new(), ".");
        let err = ProcessRunner.run(&inv, &signal).await.unwrap_err();
        assert!(matches!(err, BuildError::Cancelled));
    }
}
