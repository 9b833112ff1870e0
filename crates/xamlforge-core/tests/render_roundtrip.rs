//! Rendering a request and reading the generated project back must recover
//! the references (as a set) and the sources (in order).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use regex::Regex;
use xamlforge_core::{BuildRequest, OutputKind, Templates};

fn item_includes(project: &str) -> Vec<(String, String)> {
    let re = Regex::new(r#"<(Compile|Page|ApplicationDefinition) Include="([^"]*)""#).unwrap();
    re.captures_iter(project)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

fn hint_paths(project: &str) -> BTreeSet<String> {
    let re = Regex::new(r"<HintPath>([^<]*)</HintPath>").unwrap();
    re.captures_iter(project).map(|c| c[1].to_string()).collect()
}

#[test]
fn references_and_sources_survive_rendering() {
    let references = [
        "/lib/PresentationCore.dll",
        "/lib/PresentationFramework.dll",
        "/lib/WindowsBase.dll",
        "/opt/vendor/Charts.dll",
    ];
    let request = BuildRequest::builder()
        .source("/src/App.xaml")
        .source("/src/App.xaml.cs")
        .source("/src/MainWindow.xaml")
        .source("/src/MainWindow.xaml.cs")
        .source("/src/Resources.resx")
        .references(references)
        .output("/out/Viewer.exe")
        .kind(OutputKind::WindowedExe)
        .application_root("/src/App.xaml")
        .build()
        .unwrap();

    let rendered = Templates::builtin().render(&request, Path::new("/tmp/ws"));

    let expected_refs: BTreeSet<String> = references.iter().map(|r| r.to_string()).collect();
    assert_eq!(hint_paths(&rendered.project), expected_refs);

    let items = item_includes(&rendered.project);
    let expected_items: Vec<(String, String)> = [
        ("ApplicationDefinition", "/src/App.xaml"),
        ("Compile", "/src/App.xaml.cs"),
        ("Page", "/src/MainWindow.xaml"),
        ("Compile", "/src/MainWindow.xaml.cs"),
        ("Compile", "/src/Resources.resx"),
    ]
    .iter()
    .map(|(k, p)| (k.to_string(), p.to_string()))
    .collect();
    assert_eq!(items, expected_items);

    assert_eq!(rendered.project_path(), PathBuf::from("/tmp/ws/Viewer.csproj"));
    assert!(rendered.solution.contains("\"Viewer.csproj\""));
    assert!(rendered.project.contains("<OutputPath>/tmp/ws</OutputPath>"));
    assert!(rendered.project.contains("<OutputType>WinExe</OutputType>"));
}

#[test]
fn detected_application_root_is_rendered_as_definition() {
    let dir = tempfile::tempdir().unwrap();
    let app = dir.path().join("Shell.xaml");
    let page = dir.path().join("Page.xaml");
    std::fs::write(
        &app,
        r#"<Application x:Class="Demo.Shell" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml" />"#,
    )
    .unwrap();
    std::fs::write(
        &page,
        r#"<Page x:Class="Demo.Page" xmlns:x="http://schemas.microsoft.com/winfx/2006/xaml" />"#,
    )
    .unwrap();

    let request = BuildRequest::builder()
        .source(&page)
        .source(&app)
        .output(dir.path().join("Demo.exe"))
        .detect_application_root()
        .build()
        .unwrap();
    let rendered = Templates::builtin().render(&request, dir.path());

    let items = item_includes(&rendered.project);
    assert_eq!(items[0], ("Page".to_string(), page.display().to_string()));
    assert_eq!(
        items[1],
        ("ApplicationDefinition".to_string(), app.display().to_string())
    );
}

#[test]
fn no_placeholder_survives_rendering() {
    let request = BuildRequest::builder()
        .source("/src/Lib.cs")
        .output("/out/Lib.dll")
        .debug(true)
        .build()
        .unwrap();
    let rendered = Templates::builtin().render(&request, Path::new("/tmp/ws"));
    let leftover = Regex::new(r"\$[A-Z_]+\$").unwrap();
    assert!(!leftover.is_match(&rendered.project), "{}", rendered.project);
    assert!(!leftover.is_match(&rendered.solution));
}
