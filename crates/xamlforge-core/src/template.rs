//! Solution and project descriptor synthesis.
//!
//! Templates are plain text with `$PLACEHOLDER$` markers. Rendering is pure:
//! the same request, templates and workspace directory always yield the same
//! bytes.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::CompilerConfig;
use crate::domain::error::ConfigError;
use crate::domain::request::{BuildRequest, MarkupRole, SourceFile, SourceKind};

/// Placeholder names understood by the renderer.
pub mod placeholder {
    pub const PROJECT_FILE: &str = "$PROJECT_FILE$";
    pub const NAME: &str = "$NAME$";
    pub const TYPE: &str = "$TYPE$";
    pub const DEBUG: &str = "$DEBUG$";
    pub const DEBUG_TYPE: &str = "$DEBUG_TYPE$";
    pub const DEBUG_CONST: &str = "$DEBUG_CONST$";
    pub const OPTIMIZE: &str = "$OPTIMIZE$";
    pub const OUTPUT_DIR: &str = "$OUTPUT_DIR$";
    /// Misspelled form found in older override templates.
    pub const OUTPUT_DIR_LEGACY: &str = "$OUPTUT_DIR$";
    pub const MIN_CLR_VER: &str = "$MIN_CLR_VER$";
    pub const IMPORT_PROJECT: &str = "$IMPORT_PROJECT$";
    pub const REFERENCES: &str = "$REFERENCES$";
    pub const SOURCE_FILES: &str = "$SOURCE_FILES$";
}

const REQUIRED_PROJECT_PLACEHOLDERS: &[&str] = &[
    placeholder::NAME,
    placeholder::TYPE,
    placeholder::DEBUG,
    placeholder::DEBUG_TYPE,
    placeholder::DEBUG_CONST,
    placeholder::OPTIMIZE,
    placeholder::MIN_CLR_VER,
    placeholder::IMPORT_PROJECT,
    placeholder::REFERENCES,
    placeholder::SOURCE_FILES,
];

const MIN_FRAMEWORK_ELEMENT: &str =
    "<MinFrameworkVersionRequired>4.0</MinFrameworkVersionRequired>";

/// Built-in solution template.
pub const SOLUTION_TEMPLATE: &str = r#"Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio 14
VisualStudioVersion = 14.0.25123.0
MinimumVisualStudioVersion = 10.0.40219.1
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "xamlforge", "$PROJECT_FILE$", "{31BEEBF9-835A-4A03-BBB6-EFC6A9CB293F}"
EndProject
Global
	GlobalSection(SolutionConfigurationPlatforms) = preSolution
		CSSBuild|Any CPU = CSSBuild|Any CPU
	EndGlobalSection
	GlobalSection(ProjectConfigurationPlatforms) = postSolution
		{31BEEBF9-835A-4A03-BBB6-EFC6A9CB293F}.CSSBuild|Any CPU.ActiveCfg = CSSBuild|Any CPU
		{31BEEBF9-835A-4A03-BBB6-EFC6A9CB293F}.CSSBuild|Any CPU.Build.0 = CSSBuild|Any CPU
	EndGlobalSection
	GlobalSection(SolutionProperties) = preSolution
		HideSolutionNode = FALSE
	EndGlobalSection
EndGlobal"#;

/// Built-in WPF project template.
pub const PROJECT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Project DefaultTargets="Build" xmlns="http://schemas.microsoft.com/developer/msbuild/2003" ToolsVersion="4.0">
  <PropertyGroup>
    <Configuration Condition=" '$(Configuration)' == '' ">CSSBuild</Configuration>
    <Platform Condition=" '$(Platform)' == '' ">AnyCPU</Platform>
    <ProjectGuid>{31BEEBF9-835A-4A03-BBB6-EFC6A9CB293F}</ProjectGuid>
    <ProjectTypeGuids>{60dc8134-eba5-43b8-bcc9-bb4bc16c2548};{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}</ProjectTypeGuids>
    <AssemblyName>$NAME$</AssemblyName>
    <WarningLevel>4</WarningLevel>
    <OutputType>$TYPE$</OutputType>
    $MIN_CLR_VER$
    <TargetFrameworkVersion>v4.0</TargetFrameworkVersion>
  </PropertyGroup>
  <PropertyGroup Condition=" '$(Configuration)|$(Platform)' == 'CSSBuild|AnyCPU' ">
    <DebugSymbols>$DEBUG$</DebugSymbols>
    $DEBUG_TYPE$
    <Optimize>$OPTIMIZE$</Optimize>
    <OutputPath>$OUTPUT_DIR$</OutputPath>
    <DefineConstants>$DEBUG_CONST$TRACE</DefineConstants>
  </PropertyGroup>
  <ItemGroup>
    $REFERENCES$
  </ItemGroup>
  <ItemGroup>
    $SOURCE_FILES$
  </ItemGroup>
  <Import Project="$(MSBuildBinPath)\Microsoft.CSharp.targets" />
  $IMPORT_PROJECT$
</Project>"#;

/// Descriptor texts for one build, ready to be written to its workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedProject {
    /// Workspace directory that owns the descriptors.
    pub dir: PathBuf,
    pub solution_file_name: String,
    pub project_file_name: String,
    pub solution: String,
    pub project: String,
}

impl RenderedProject {
    pub fn solution_path(&self) -> PathBuf {
        self.dir.join(&self.solution_file_name)
    }

    pub fn project_path(&self) -> PathBuf {
        self.dir.join(&self.project_file_name)
    }
}

/// A validated pair of solution and project templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    solution: String,
    project: String,
}

impl Templates {
    /// The built-in templates.
    pub fn builtin() -> Self {
        Self {
            solution: SOLUTION_TEMPLATE.to_string(),
            project: PROJECT_TEMPLATE.to_string(),
        }
    }

    /// Validate custom templates.
    pub fn new(solution: impl Into<String>, project: impl Into<String>) -> Result<Self, ConfigError> {
        let templates = Self {
            solution: solution.into(),
            project: project.into(),
        };
        templates.validate()?;
        Ok(templates)
    }

    /// Built-in solution template plus the configured project override, if
    /// that file exists.
    pub fn load(config: &CompilerConfig) -> Result<Self, ConfigError> {
        match config.template_override.as_deref() {
            Some(path) if path.is_file() => {
                debug!(path = %path.display(), "using project template override");
                let project = std::fs::read_to_string(path).map_err(|source| {
                    ConfigError::TemplateUnreadable {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                Self::new(SOLUTION_TEMPLATE, project)
            }
            _ => Ok(Self::builtin()),
        }
    }

    pub fn project_template(&self) -> &str {
        &self.project
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.solution.contains(placeholder::PROJECT_FILE) {
            return Err(ConfigError::MissingPlaceholder {
                template: "solution",
                placeholder: placeholder::PROJECT_FILE,
            });
        }
        for &name in REQUIRED_PROJECT_PLACEHOLDERS {
            if !self.project.contains(name) {
                return Err(ConfigError::MissingPlaceholder {
                    template: "project",
                    placeholder: name,
                });
            }
        }
        if !self.project.contains(placeholder::OUTPUT_DIR)
            && !self.project.contains(placeholder::OUTPUT_DIR_LEGACY)
        {
            return Err(ConfigError::MissingPlaceholder {
                template: "project",
                placeholder: placeholder::OUTPUT_DIR,
            });
        }
        Ok(())
    }

    /// Render descriptors for `request` whose build output goes to `dir`.
    pub fn render(&self, request: &BuildRequest, dir: &Path) -> RenderedProject {
        let name = request.assembly_name();
        let project_file_name = format!("{}.csproj", name);
        let solution_file_name = format!("{}.sln", name);
        let debug = request.debug();
        let output_dir = dir.display().to_string();

        let solution = self
            .solution
            .replace(placeholder::PROJECT_FILE, &xml_escape(&project_file_name));

        // Item blocks go in last so paths are never re-scanned for markers.
        let project = self
            .project
            .replace(placeholder::NAME, &xml_escape(name))
            .replace(
                placeholder::DEBUG_TYPE,
                if debug { "<DebugType>full</DebugType>" } else { "" },
            )
            .replace(placeholder::OPTIMIZE, if debug { "false" } else { "true" })
            .replace(placeholder::DEBUG_CONST, if debug { "DEBUG;" } else { "" })
            .replace(placeholder::DEBUG, if debug { "true" } else { "false" })
            .replace(placeholder::OUTPUT_DIR, &xml_escape(&output_dir))
            .replace(placeholder::OUTPUT_DIR_LEGACY, &xml_escape(&output_dir))
            .replace(placeholder::TYPE, request.kind().msbuild_type())
            .replace(placeholder::MIN_CLR_VER, MIN_FRAMEWORK_ELEMENT)
            .replace(placeholder::IMPORT_PROJECT, "")
            .replace(placeholder::REFERENCES, &render_references(request.references()))
            .replace(placeholder::SOURCE_FILES, &render_sources(request.sources()));

        RenderedProject {
            dir: dir.to_path_buf(),
            solution_file_name,
            project_file_name,
            solution,
            project,
        }
    }
}

impl Default for Templates {
    fn default() -> Self {
        Self::builtin()
    }
}

fn render_references(references: &[PathBuf]) -> String {
    let mut block = String::new();
    for reference in references {
        let full = reference.display().to_string();
        let file_name = reference
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| full.clone());
        block.push_str(&format!(
            "<Reference Include=\"{}\">\n  <SpecificVersion>False</SpecificVersion>\n  <HintPath>{}</HintPath>\n</Reference>\n",
            xml_escape(&file_name),
            xml_escape(&full)
        ));
    }
    block
}

fn render_sources(sources: &[SourceFile]) -> String {
    let mut block = String::new();
    for source in sources {
        let path = source.path.display().to_string();
        let path = xml_escape(&path);
        match source.kind {
            SourceKind::Code => block.push_str(&format!(
                "<Compile Include=\"{}\">\n  <SubType>Code</SubType>\n</Compile>\n",
                path
            )),
            SourceKind::Markup(MarkupRole::ApplicationRoot) => {
                block.push_str(&format!("<ApplicationDefinition Include=\"{}\" />\n", path))
            }
            SourceKind::Markup(MarkupRole::Page) => {
                block.push_str(&format!("<Page Include=\"{}\" />\n", path))
            }
            SourceKind::Other => block.push_str(&format!("<Compile Include=\"{}\" />\n", path)),
        }
    }
    block
}

fn xml_escape(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['&', '<', '>', '"']) {
        return Cow::Borrowed(raw);
    }
    let mut escaped = String::with_capacity(raw.len() + 8);
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}
