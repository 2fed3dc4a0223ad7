//! Subprocess execution with timing and debug logging.
//!
//! This is the **only** way to run external commands in erk. All command
//! execution must go through [`run`] (or [`run_checked`]) to ensure
//! consistent logging and context-prefixed error reporting.
//!
//! ```text
//! $ git status [my-feature]          # with context
//! $ gh pr list                       # without context
//! [erk-trace] context=my-feature cmd="..." dur=12.3ms ok=true
//! ```
//!
//! The `context` parameter is typically the worktree name for git commands,
//! or `None` for standalone CLI tools like `gh` and `gt`.

use std::process::{Command, Output};

use crate::error::ErkError;

/// Render a command and its arguments as a single display string.
pub fn display_command(cmd: &Command) -> String {
    let program = cmd.get_program().to_string_lossy();
    let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy()).collect();
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Execute a command, logging invocation and timing.
pub fn run(cmd: &mut Command, context: Option<&str>) -> std::io::Result<Output> {
    use std::time::Instant;

    let cmd_str = display_command(cmd);
    match context {
        Some(ctx) => log::debug!("$ {} [{}]", cmd_str, ctx),
        None => log::debug!("$ {}", cmd_str),
    }

    let t0 = Instant::now();
    let result = cmd.output();
    let duration_ms = t0.elapsed().as_secs_f64() * 1000.0;

    match (&result, context) {
        (Ok(output), Some(ctx)) => log::debug!(
            "[erk-trace] context={} cmd=\"{}\" dur={:.1}ms ok={}",
            ctx,
            cmd_str,
            duration_ms,
            output.status.success()
        ),
        (Ok(output), None) => log::debug!(
            "[erk-trace] cmd=\"{}\" dur={:.1}ms ok={}",
            cmd_str,
            duration_ms,
            output.status.success()
        ),
        (Err(e), Some(ctx)) => log::debug!(
            "[erk-trace] context={} cmd=\"{}\" dur={:.1}ms err=\"{}\"",
            ctx,
            cmd_str,
            duration_ms,
            e
        ),
        (Err(e), None) => log::debug!(
            "[erk-trace] cmd=\"{}\" dur={:.1}ms err=\"{}\"",
            cmd_str,
            duration_ms,
            e
        ),
    }

    result
}

/// Execute a command and require a zero exit status.
///
/// Non-zero exits become [`ErkError::CommandFailed`] carrying the full
/// command line and trimmed stderr. Spawn failures for a missing binary
/// become [`ErkError::ToolMissing`].
pub fn run_checked(cmd: &mut Command, context: Option<&str>) -> Result<Output, ErkError> {
    let cmd_str = display_command(cmd);
    let program = cmd.get_program().to_string_lossy().into_owned();

    let output = run(cmd, context).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ErkError::ToolMissing { tool: program }
        } else {
            ErkError::CommandFailed {
                command: cmd_str.clone(),
                exit_code: None,
                stderr: e.to_string(),
            }
        }
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // Some tools print errors to stdout (e.g. `git commit` with nothing
        // to commit); keep both streams in the report.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = [stderr.trim(), stdout.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        return Err(ErkError::CommandFailed {
            command: cmd_str,
            exit_code: output.status.code(),
            stderr: message,
        });
    }

    Ok(output)
}

/// Run a command and return trimmed stdout on success.
pub fn run_stdout(cmd: &mut Command, context: Option<&str>) -> Result<String, ErkError> {
    let output = run_checked(cmd, context)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_args() {
        let mut cmd = Command::new("git");
        cmd.args(["worktree", "list"]);
        assert_eq!(display_command(&cmd), "git worktree list");
    }

    #[test]
    fn display_bare_program() {
        let cmd = Command::new("gh");
        assert_eq!(display_command(&cmd), "gh");
    }

    #[test]
    fn missing_binary_maps_to_tool_missing() {
        let mut cmd = Command::new("erk-definitely-not-a-real-binary");
        let err = run_checked(&mut cmd, None).unwrap_err();
        match err {
            ErkError::ToolMissing { tool } => {
                assert_eq!(tool, "erk-definitely-not-a-real-binary")
            }
            other => panic!("expected ToolMissing, got {other:?}"),
        }
    }
}
