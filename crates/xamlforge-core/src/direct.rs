//! Plain `csc` invocation for requests without markup.
//!
//! No project synthesis happens on this route: the compiler writes the
//! assembly straight into the workspace and the finalizer takes it from there.

use std::path::Path;

use crate::config::CompilerConfig;
use crate::domain::request::BuildRequest;
use crate::invoker::ToolInvocation;

/// Build the compiler command line for `request`, emitting into `workspace`.
pub fn csc_invocation(config: &CompilerConfig, request: &BuildRequest, workspace: &Path) -> ToolInvocation {
    let output = workspace.join(request.artifact_file_name());

    let mut args = vec![
        "/nologo".to_string(),
        format!("/target:{}", request.kind().csc_target()),
        format!("/out:{}", output.display()),
    ];

    if request.debug() {
        args.extend(
            ["/debug+", "/debug:full", "/optimize-", "/define:DEBUG;TRACE"]
                .into_iter()
                .map(String::from),
        );
    } else {
        args.extend(["/optimize+", "/define:TRACE"].into_iter().map(String::from));
    }

    args.extend(
        request
            .references()
            .iter()
            .map(|r| format!("/reference:{}", r.display())),
    );

    // The target is already fixed by the output kind.
    if let Some(options) = request.compiler_options() {
        args.extend(
            options
                .split_whitespace()
                .filter(|opt| !opt.starts_with("/target:"))
                .map(String::from),
        );
    }

    args.extend(request.sources().iter().map(|s| s.path.display().to_string()));

    ToolInvocation::new(&config.csc_path, args, workspace).with_timeout(config.timeout())
}
