//! Printing capability wrappers.
//!
//! Every call emits a one-line command trace in dim style on stderr (the
//! user stream). When the wrapped stack includes a DryRun layer, traces
//! for suppressed writes carry a bright-cyan "(dry run)" marker before the
//! green check.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ErkError;
use crate::styling::{DRY_RUN_MARKER, SUCCESS, TRACE, eprintln};

use super::git::{FileStatus, Git, WorktreeInfo};
use super::host::{Host, Issue, IssueComment, IssueRef, PullRequest, WorkflowRun};
use super::stack::Stack;

/// Render one trace line for a completed call.
///
/// `suppressed` is true for write operations intercepted by DryRun: the
/// command did not actually run, so the trace gets the marker. Successful
/// calls end with a green check.
fn render_trace(command: &str, suppressed: bool, ok: bool) -> String {
    let marker = if suppressed {
        format!(" {DRY_RUN_MARKER}(dry run){DRY_RUN_MARKER:#}")
    } else {
        String::new()
    };
    if ok {
        format!("  {TRACE}{command}{TRACE:#}{marker} {SUCCESS}✓{SUCCESS:#}")
    } else {
        format!("  {TRACE}{command}{TRACE:#}{marker}")
    }
}

fn trace<T>(command: &str, suppressed: bool, result: &Result<T, ErkError>) {
    eprintln!("{}", render_trace(command, suppressed, result.is_ok()));
}

// ============================================================================
// Git
// ============================================================================

pub struct PrintingGit {
    inner: Arc<dyn Git>,
    dry_run: bool,
}

impl PrintingGit {
    /// `dry_run` must reflect whether a DryRun wrapper sits below this one.
    pub fn new(inner: Arc<dyn Git>, dry_run: bool) -> Self {
        Self { inner, dry_run }
    }
}

impl Git for PrintingGit {
    fn list_worktrees(&self, root: &Path) -> Result<Vec<WorktreeInfo>, ErkError> {
        let result = self.inner.list_worktrees(root);
        trace("git worktree list --porcelain", false, &result);
        result
    }

    fn add_worktree(
        &self,
        root: &Path,
        path: &Path,
        branch: &str,
        create_from: Option<&str>,
    ) -> Result<(), ErkError> {
        let result = self.inner.add_worktree(root, path, branch, create_from);
        let command = match create_from {
            Some(base) => format!("git worktree add -b {branch} {} {base}", path.display()),
            None => format!("git worktree add {} {branch}", path.display()),
        };
        trace(&command, self.dry_run, &result);
        result
    }

    fn move_worktree(&self, root: &Path, from: &Path, to: &Path) -> Result<(), ErkError> {
        let result = self.inner.move_worktree(root, from, to);
        trace(
            &format!("git worktree move {} {}", from.display(), to.display()),
            self.dry_run,
            &result,
        );
        result
    }

    fn remove_worktree(&self, root: &Path, path: &Path, force: bool) -> Result<(), ErkError> {
        let result = self.inner.remove_worktree(root, path, force);
        let force_flag = if force { " --force" } else { "" };
        trace(
            &format!("git worktree remove{force_flag} {}", path.display()),
            self.dry_run,
            &result,
        );
        result
    }

    fn prune_worktrees(&self, root: &Path) -> Result<(), ErkError> {
        let result = self.inner.prune_worktrees(root);
        trace("git worktree prune", self.dry_run, &result);
        result
    }

    fn create_branch(&self, root: &Path, name: &str, start: &str) -> Result<(), ErkError> {
        let result = self.inner.create_branch(root, name, start);
        trace(&format!("git branch {name} {start}"), self.dry_run, &result);
        result
    }

    fn checkout_branch(&self, root: &Path, name: &str) -> Result<(), ErkError> {
        let result = self.inner.checkout_branch(root, name);
        trace(&format!("git checkout {name}"), self.dry_run, &result);
        result
    }

    fn delete_branch(&self, root: &Path, name: &str, force: bool) -> Result<(), ErkError> {
        let result = self.inner.delete_branch(root, name, force);
        let flag = if force { "-D" } else { "-d" };
        trace(&format!("git branch {flag} {name}"), self.dry_run, &result);
        result
    }

    fn rename_branch(&self, root: &Path, old: &str, new: &str) -> Result<(), ErkError> {
        let result = self.inner.rename_branch(root, old, new);
        trace(&format!("git branch -m {old} {new}"), self.dry_run, &result);
        result
    }

    fn branch_exists(&self, root: &Path, name: &str) -> Result<bool, ErkError> {
        let result = self.inner.branch_exists(root, name);
        trace(
            &format!("git show-ref --verify refs/heads/{name}"),
            false,
            &result,
        );
        result
    }

    fn current_branch(&self, root: &Path) -> Result<Option<String>, ErkError> {
        let result = self.inner.current_branch(root);
        trace("git branch --show-current", false, &result);
        result
    }

    fn default_branch(&self, root: &Path) -> Result<Option<String>, ErkError> {
        let result = self.inner.default_branch(root);
        trace("git symbolic-ref refs/remotes/origin/HEAD", false, &result);
        result
    }

    fn git_common_dir(&self, root: &Path) -> Result<PathBuf, ErkError> {
        let result = self.inner.git_common_dir(root);
        trace("git rev-parse --git-common-dir", false, &result);
        result
    }

    fn toplevel(&self, from: &Path) -> Result<PathBuf, ErkError> {
        let result = self.inner.toplevel(from);
        trace("git rev-parse --show-toplevel", false, &result);
        result
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.inner.path_exists(path)
    }

    fn file_status(&self, root: &Path) -> Result<FileStatus, ErkError> {
        let result = self.inner.file_status(root);
        trace("git status --porcelain", false, &result);
        result
    }
}

// ============================================================================
// Host
// ============================================================================

pub struct PrintingHost {
    inner: Arc<dyn Host>,
    dry_run: bool,
}

impl PrintingHost {
    pub fn new(inner: Arc<dyn Host>, dry_run: bool) -> Self {
        Self { inner, dry_run }
    }
}

impl Host for PrintingHost {
    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[&str],
    ) -> Result<IssueRef, ErkError> {
        let result = self.inner.create_issue(title, body, labels);
        trace(
            &format!("gh issue create --title {title:?}"),
            self.dry_run,
            &result,
        );
        result
    }

    fn get_issue(&self, number: u64) -> Result<Issue, ErkError> {
        let result = self.inner.get_issue(number);
        trace(&format!("gh issue view {number}"), false, &result);
        result
    }

    fn update_issue_body(&self, number: u64, body: &str) -> Result<(), ErkError> {
        let result = self.inner.update_issue_body(number, body);
        trace(&format!("gh issue edit {number}"), self.dry_run, &result);
        result
    }

    fn close_issue(&self, number: u64, comment: Option<&str>) -> Result<(), ErkError> {
        let result = self.inner.close_issue(number, comment);
        trace(&format!("gh issue close {number}"), self.dry_run, &result);
        result
    }

    fn add_comment(&self, number: u64, body: &str) -> Result<(), ErkError> {
        let result = self.inner.add_comment(number, body);
        trace(&format!("gh issue comment {number}"), self.dry_run, &result);
        result
    }

    fn list_comments(&self, number: u64) -> Result<Vec<IssueComment>, ErkError> {
        let result = self.inner.list_comments(number);
        trace(&format!("gh issue view {number} --json comments"), false, &result);
        result
    }

    fn ensure_label(&self, name: &str, color: &str, description: &str) -> Result<(), ErkError> {
        let result = self.inner.ensure_label(name, color, description);
        trace(&format!("gh label create {name}"), self.dry_run, &result);
        result
    }

    fn pr_for_branch(&self, branch: &str) -> Result<Option<PullRequest>, ErkError> {
        let result = self.inner.pr_for_branch(branch);
        trace(&format!("gh pr list --head {branch}"), false, &result);
        result
    }

    fn close_pr(&self, number: u64, comment: Option<&str>) -> Result<(), ErkError> {
        let result = self.inner.close_pr(number, comment);
        trace(&format!("gh pr close {number}"), self.dry_run, &result);
        result
    }

    fn dispatch_workflow(
        &self,
        workflow: &str,
        inputs: &[(&str, String)],
    ) -> Result<(), ErkError> {
        let result = self.inner.dispatch_workflow(workflow, inputs);
        trace(&format!("gh workflow run {workflow}"), self.dry_run, &result);
        result
    }

    fn latest_run_for_workflow(&self, workflow: &str) -> Result<Option<WorkflowRun>, ErkError> {
        let result = self.inner.latest_run_for_workflow(workflow);
        trace(&format!("gh run list --workflow {workflow}"), false, &result);
        result
    }

    fn current_user(&self) -> Result<String, ErkError> {
        let result = self.inner.current_user();
        trace("gh api user", false, &result);
        result
    }
}

// ============================================================================
// Stack
// ============================================================================

pub struct PrintingStack {
    inner: Arc<dyn Stack>,
    dry_run: bool,
}

impl PrintingStack {
    pub fn new(inner: Arc<dyn Stack>, dry_run: bool) -> Self {
        Self { inner, dry_run }
    }
}

impl Stack for PrintingStack {
    fn current_stack(&self, root: &Path) -> Result<Vec<String>, ErkError> {
        let result = self.inner.current_stack(root);
        trace("gt log short", false, &result);
        result
    }

    fn is_tracked(&self, root: &Path, branch: &str) -> Result<bool, ErkError> {
        self.inner.is_tracked(root, branch)
    }

    fn restack(&self, root: &Path) -> Result<(), ErkError> {
        let result = self.inner.restack(root);
        trace("gt restack", self.dry_run, &result);
        result
    }

    fn move_onto(&self, root: &Path, base: &str) -> Result<(), ErkError> {
        let result = self.inner.move_onto(root, base);
        trace(&format!("gt move --onto {base}"), self.dry_run, &result);
        result
    }

    fn sync(&self, root: &Path) -> Result<(), ErkError> {
        let result = self.inner.sync(root);
        trace("gt sync --force", self.dry_run, &result);
        result
    }

    fn up(&self, root: &Path) -> Result<(), ErkError> {
        let result = self.inner.up(root);
        trace("gt up", self.dry_run, &result);
        result
    }

    fn down(&self, root: &Path) -> Result<(), ErkError> {
        let result = self.inner.down(root);
        trace("gt down", self.dry_run, &result);
        result
    }

    fn submit_stack(&self, root: &Path) -> Result<(), ErkError> {
        let result = self.inner.submit_stack(root);
        trace("gt submit --stack --no-interactive", self.dry_run, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fake::FakeGit;

    /// Strip ANSI escape sequences for content assertions.
    fn strip_ansi(s: &str) -> String {
        let mut out = String::new();
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                for esc in chars.by_ref() {
                    if esc.is_ascii_alphabetic() {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    #[test]
    fn dry_run_trace_carries_marker_and_check() {
        let line = render_trace("git worktree remove /erks/repo/foo", true, true);
        assert_eq!(
            strip_ansi(&line),
            "  git worktree remove /erks/repo/foo (dry run) ✓"
        );
    }

    #[test]
    fn plain_trace_has_no_marker() {
        let line = render_trace("git worktree list --porcelain", false, true);
        assert_eq!(strip_ansi(&line), "  git worktree list --porcelain ✓");
    }

    #[test]
    fn failed_call_has_no_check() {
        let line = render_trace("git branch -d main", false, false);
        assert_eq!(strip_ansi(&line), "  git branch -d main");
    }

    #[test]
    fn printing_wrapper_delegates() {
        let fake = Arc::new(FakeGit::builder().branch("main").build());
        let printing = PrintingGit::new(fake.clone(), false);
        assert!(printing.branch_exists(Path::new("/repo"), "main").unwrap());
        printing.delete_branch(Path::new("/repo"), "main", false).unwrap();
        assert_eq!(fake.deleted_branches(), vec!["main"]);
    }
}
