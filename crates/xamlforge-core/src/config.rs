//! Compiler configuration.
//!
//! Everything the pipeline needs from its environment lives here: where the
//! build tools are, where workspaces go, which template to use and how long a
//! build may run. [`CompilerConfig::from_env`] reads the `XAMLFORGE_*`
//! variables; the CLI layers its own flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

pub const ENV_MSBUILD: &str = "XAMLFORGE_MSBUILD";
pub const ENV_RUNTIME_DIR: &str = "XAMLFORGE_RUNTIME_DIR";
pub const ENV_CSC: &str = "XAMLFORGE_CSC";
pub const ENV_TEMPLATE: &str = "XAMLFORGE_TEMPLATE";
pub const ENV_CSSCRIPT_DIR: &str = "CSSCRIPT_DIR";
pub const ENV_TEMP_ROOT: &str = "XAMLFORGE_TEMP_ROOT";
pub const ENV_TIMEOUT_SECS: &str = "XAMLFORGE_TIMEOUT_SECS";
pub const ENV_KEEP_WORKSPACE: &str = "XAMLFORGE_KEEP_WORKSPACE";

/// Directory under the temp root that holds all build workspaces.
pub const DEFAULT_NAMESPACE: &str = "xamlforge";

/// File name of the build tool inside a runtime installation directory.
const MSBUILD_EXE: &str = "MSBuild.exe";

/// Configuration for [`XamlCompiler`](crate::pipeline::XamlCompiler).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompilerConfig {
    /// MSBuild executable.
    pub msbuild_path: PathBuf,

    /// C# compiler used when a request has no markup.
    pub csc_path: PathBuf,

    /// Project template override; used only if the file exists.
    pub template_override: Option<PathBuf>,

    /// Parent of the workspace namespace directory.
    pub temp_root: PathBuf,

    /// Namespace directory under `temp_root`.
    pub workspace_namespace: String,

    /// Build deadline in milliseconds; `None` waits forever.
    pub timeout_ms: Option<u64>,

    /// Directory relative diagnostic paths are resolved against.
    /// Defaults to the process working directory.
    pub diagnostic_base_dir: Option<PathBuf>,

    /// Keep workspaces even after a successful build.
    pub keep_workspace: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            msbuild_path: PathBuf::from("msbuild"),
            csc_path: PathBuf::from("csc"),
            template_override: None,
            temp_root: std::env::temp_dir(),
            workspace_namespace: DEFAULT_NAMESPACE.to_string(),
            timeout_ms: None,
            diagnostic_base_dir: None,
            keep_workspace: false,
        }
    }
}

impl CompilerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_MSBUILD) {
            config.msbuild_path = PathBuf::from(path);
        } else if let Some(runtime_dir) = lookup(ENV_RUNTIME_DIR) {
            config.msbuild_path = Path::new(&runtime_dir).join(MSBUILD_EXE);
        }

        if let Some(path) = lookup(ENV_CSC) {
            config.csc_path = PathBuf::from(path);
        }

        config.template_override = lookup(ENV_TEMPLATE).map(PathBuf::from).or_else(|| {
            lookup(ENV_CSSCRIPT_DIR).map(|dir| Path::new(&dir).join("Lib").join("xaml.template"))
        });

        if let Some(root) = lookup(ENV_TEMP_ROOT) {
            config.temp_root = PathBuf::from(root);
        }

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
                var: ENV_TIMEOUT_SECS,
                value: raw.clone(),
            })?;
            config.timeout_ms = (secs > 0).then_some(secs.saturating_mul(1000));
        }

        if let Some(raw) = lookup(ENV_KEEP_WORKSPACE) {
            config.keep_workspace = parse_flag(&raw).ok_or(ConfigError::InvalidEnv {
                var: ENV_KEEP_WORKSPACE,
                value: raw,
            })?;
        }

        Ok(config)
    }

    pub fn with_msbuild(mut self, path: impl Into<PathBuf>) -> Self {
        self.msbuild_path = path.into();
        self
    }

    pub fn with_csc(mut self, path: impl Into<PathBuf>) -> Self {
        self.csc_path = path.into();
        self
    }

    pub fn with_template_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.template_override = Some(path.into());
        self
    }

    pub fn with_temp_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.temp_root = path.into();
        self
    }

    /// Deadline with millisecond precision. Anything shorter than 1ms
    /// becomes 1ms.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.timeout_ms = Some(ms.max(1));
        self
    }

    pub fn with_diagnostic_base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.diagnostic_base_dir = Some(path.into());
        self
    }

    pub fn keep_workspace(mut self, keep: bool) -> Self {
        self.keep_workspace = keep;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Directory holding every workspace of this configuration.
    pub fn workspace_root(&self) -> PathBuf {
        self.temp_root.join(&self.workspace_namespace)
    }

    /// Base directory for resolving relative diagnostic paths.
    pub fn resolve_base_dir(&self) -> PathBuf {
        self.diagnostic_base_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
