//! Parsing realistic MSBuild console logs.

use std::path::PathBuf;

use xamlforge_core::{DiagnosticParser, LineParse, Severity};

const MSBUILD_LOG: &str = "\
Microsoft (R) Build Engine version 4.8.3761.0\r
  Viewer -> obj\\CSSBuild\\Viewer.g.cs\r
\r
Views/MainWindow.xaml.cs(42,17): error CS0103: The name 'InitializeComponent' does not exist in the current context [/tmp/ws/Viewer.csproj]\r
Views/MainWindow.xaml(8,5): error MC3072: The property 'Foo' does not exist in XML namespace 'http://schemas.microsoft.com/winfx/2006/xaml/presentation'. Line 8 Position 5.\r
Models/Item.cs(3,1,3,20): warning CS0105: The using directive for 'System' appeared previously in this namespace\r
CSC : error CS2001: Source file 'Missing.cs' could not be found.\r
Done building project \"Viewer.csproj\" -- FAILED.\r
\r
Build FAILED.\r
\r
Views/MainWindow.xaml.cs(42,17): error CS0103: The name 'InitializeComponent' does not exist in the current context\r
    1 Warning(s)\r
    3 Error(s)\r
    Done building project\r
Views/Late.cs(1,1): error CS9999: never reported\r
-- FAILED.";

#[test]
fn parses_a_failed_msbuild_log() {
    let parser = DiagnosticParser::new("/home/dev/viewer");
    let report = parser.parse(MSBUILD_LOG);

    assert!(report.stopped_at_summary);
    assert!(report.anomalies.is_empty());

    let codes: Vec<_> = report
        .diagnostics
        .iter()
        .map(|d| d.code.clone().unwrap_or_default())
        .collect();
    assert_eq!(codes, ["CS0103", "MC3072", "CS0105", "CS2001", "CS0103"]);

    let first = &report.diagnostics[0];
    assert_eq!(first.severity, Severity::Error);
    assert_eq!(first.file, PathBuf::from("/home/dev/viewer/Views/MainWindow.xaml.cs"));
    assert_eq!((first.line, first.column), (Some(42), Some(17)));
    assert!(first.message.starts_with("The name 'InitializeComponent'"));

    let markup = &report.diagnostics[1];
    assert_eq!(markup.file, PathBuf::from("/home/dev/viewer/Views/MainWindow.xaml"));
    assert!(markup.message.contains("Line 8 Position 5."));

    let range = &report.diagnostics[2];
    assert_eq!(range.severity, Severity::Warning);
    assert_eq!((range.line, range.column), (Some(3), Some(1)));

    let tool = &report.diagnostics[3];
    assert_eq!(tool.file, PathBuf::from("/home/dev/viewer/CSC"));
    assert_eq!(tool.line_number(), -1);
    assert_eq!(tool.column_number(), -1);
    assert_eq!(tool.message, "Source file 'Missing.cs' could not be found.");
}

#[test]
fn diagnostics_render_back_to_console_form() {
    let parser = DiagnosticParser::new("/w");
    let LineParse::Diagnostic(d) = parser.parse_line("foo.cs(10,5): error CS1002: ; expected") else {
        panic!("expected a diagnostic");
    };
    assert_eq!(d.to_string(), "/w/foo.cs(10,5): error CS1002: ; expected");

    let LineParse::Diagnostic(d) = parser.parse_line("bar.cs: error CS0001: something") else {
        panic!("expected a diagnostic");
    };
    assert_eq!(d.to_string(), "/w/bar.cs: error CS0001: something");
}

#[test]
fn diagnostics_serialize_with_optional_position() {
    let parser = DiagnosticParser::new("/w");
    let report = parser.parse("bar.cs: warning CS0001: something");
    let json = serde_json::to_value(&report.diagnostics[0]).unwrap();
    assert_eq!(json["severity"], "warning");
    assert_eq!(json["file"], "/w/bar.cs");
    assert!(json["line"].is_null());
    assert_eq!(json["code"], "CS0001");
}
