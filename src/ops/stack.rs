//! Stacked-branch capability over the external stack tool (`gt`).
//!
//! Optional: availability is gated by the `use-stack-tool` flag in the
//! global config, so every method is best-effort from the caller's view.

use std::path::Path;
use std::process::Command;

use crate::error::ErkError;

use super::runner;

pub trait Stack: Send + Sync {
    /// Branch names in the current stack, trunk-first.
    fn current_stack(&self, root: &Path) -> Result<Vec<String>, ErkError>;
    fn is_tracked(&self, root: &Path, branch: &str) -> Result<bool, ErkError>;
    fn restack(&self, root: &Path) -> Result<(), ErkError>;
    fn move_onto(&self, root: &Path, base: &str) -> Result<(), ErkError>;
    fn sync(&self, root: &Path) -> Result<(), ErkError>;
    fn up(&self, root: &Path) -> Result<(), ErkError>;
    fn down(&self, root: &Path) -> Result<(), ErkError>;
    /// Submit every branch of the stack as PRs.
    fn submit_stack(&self, root: &Path) -> Result<(), ErkError>;
}

pub struct GraphiteStack;

impl GraphiteStack {
    fn gt(root: &Path) -> Command {
        let mut cmd = Command::new("gt");
        cmd.current_dir(root);
        cmd
    }
}

impl Stack for GraphiteStack {
    fn current_stack(&self, root: &Path) -> Result<Vec<String>, ErkError> {
        let mut cmd = Self::gt(root);
        cmd.args(["log", "short"]);
        let stdout = runner::run_stdout(&mut cmd, None)?;
        Ok(parse_stack_log(&stdout))
    }

    fn is_tracked(&self, root: &Path, branch: &str) -> Result<bool, ErkError> {
        Ok(self.current_stack(root)?.iter().any(|b| b == branch))
    }

    fn restack(&self, root: &Path) -> Result<(), ErkError> {
        let mut cmd = Self::gt(root);
        cmd.arg("restack");
        runner::run_checked(&mut cmd, None).map(|_| ())
    }

    fn move_onto(&self, root: &Path, base: &str) -> Result<(), ErkError> {
        let mut cmd = Self::gt(root);
        cmd.args(["move", "--onto", base]);
        runner::run_checked(&mut cmd, None).map(|_| ())
    }

    fn sync(&self, root: &Path) -> Result<(), ErkError> {
        let mut cmd = Self::gt(root);
        cmd.args(["sync", "--force"]);
        runner::run_checked(&mut cmd, None).map(|_| ())
    }

    fn up(&self, root: &Path) -> Result<(), ErkError> {
        let mut cmd = Self::gt(root);
        cmd.arg("up");
        runner::run_checked(&mut cmd, None).map(|_| ())
    }

    fn down(&self, root: &Path) -> Result<(), ErkError> {
        let mut cmd = Self::gt(root);
        cmd.arg("down");
        runner::run_checked(&mut cmd, None).map(|_| ())
    }

    fn submit_stack(&self, root: &Path) -> Result<(), ErkError> {
        let mut cmd = Self::gt(root);
        cmd.args(["submit", "--stack", "--no-interactive"]);
        runner::run_checked(&mut cmd, None).map(|_| ())
    }
}

/// Parse `gt log short` output into branch names, trunk-first.
///
/// The tool prints the stack top-down with tree glyphs:
///
/// ```text
/// ◉  feature-b
/// ◯  feature-a
/// ◯  main
/// ```
fn parse_stack_log(output: &str) -> Vec<String> {
    let mut branches: Vec<String> = output
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_start_matches(['◉', '◯', '│', '─', '*', ' ', '\t']);
            let name = trimmed.split_whitespace().next()?;
            (!name.is_empty()).then(|| name.to_string())
        })
        .collect();
    branches.reverse();
    branches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stack_log_trunk_first() {
        let output = "◉  feature-b\n◯  feature-a\n◯  main\n";
        assert_eq!(parse_stack_log(output), vec!["main", "feature-a", "feature-b"]);
    }

    #[test]
    fn parses_stack_log_with_annotations() {
        let output = "◉  top (current)\n◯  main\n";
        assert_eq!(parse_stack_log(output), vec!["main", "top"]);
    }

    #[test]
    fn empty_log_is_empty_stack() {
        assert!(parse_stack_log("").is_empty());
    }
}
