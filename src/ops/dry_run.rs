//! DryRun capability wrappers.
//!
//! Reads pass through to the wrapped implementation; destructive
//! operations record the intent and return plausible results. A DryRun
//! wrapper must never mutate external state.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::ErkError;

use super::git::{FileStatus, Git, WorktreeInfo};
use super::host::{Host, Issue, IssueComment, IssueRef, PullRequest, WorkflowRun};
use super::stack::Stack;

/// Shared record of suppressed write operations, one line per intent.
#[derive(Clone, Default)]
pub struct RecordedIntents {
    intents: Arc<Mutex<Vec<String>>>,
}

impl RecordedIntents {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, intent: impl Into<String>) {
        self.intents.lock().unwrap().push(intent.into());
    }

    pub fn list(&self) -> Vec<String> {
        self.intents.lock().unwrap().clone()
    }
}

// ============================================================================
// Git
// ============================================================================

pub struct DryRunGit {
    inner: Arc<dyn Git>,
    intents: RecordedIntents,
}

impl DryRunGit {
    pub fn new(inner: Arc<dyn Git>, intents: RecordedIntents) -> Self {
        Self { inner, intents }
    }
}

impl Git for DryRunGit {
    fn list_worktrees(&self, root: &Path) -> Result<Vec<WorktreeInfo>, ErkError> {
        self.inner.list_worktrees(root)
    }

    fn add_worktree(
        &self,
        _root: &Path,
        path: &Path,
        branch: &str,
        create_from: Option<&str>,
    ) -> Result<(), ErkError> {
        match create_from {
            Some(base) => self.intents.record(format!(
                "git worktree add -b {branch} {} {base}",
                path.display()
            )),
            None => self
                .intents
                .record(format!("git worktree add {} {branch}", path.display())),
        }
        Ok(())
    }

    fn move_worktree(&self, _root: &Path, from: &Path, to: &Path) -> Result<(), ErkError> {
        self.intents
            .record(format!("git worktree move {} {}", from.display(), to.display()));
        Ok(())
    }

    fn remove_worktree(&self, _root: &Path, path: &Path, force: bool) -> Result<(), ErkError> {
        let force_flag = if force { " --force" } else { "" };
        self.intents
            .record(format!("git worktree remove{force_flag} {}", path.display()));
        Ok(())
    }

    fn prune_worktrees(&self, _root: &Path) -> Result<(), ErkError> {
        self.intents.record("git worktree prune");
        Ok(())
    }

    fn create_branch(&self, _root: &Path, name: &str, start: &str) -> Result<(), ErkError> {
        self.intents.record(format!("git branch {name} {start}"));
        Ok(())
    }

    fn checkout_branch(&self, _root: &Path, name: &str) -> Result<(), ErkError> {
        self.intents.record(format!("git checkout {name}"));
        Ok(())
    }

    fn delete_branch(&self, _root: &Path, name: &str, force: bool) -> Result<(), ErkError> {
        let flag = if force { "-D" } else { "-d" };
        self.intents.record(format!("git branch {flag} {name}"));
        Ok(())
    }

    fn rename_branch(&self, _root: &Path, old: &str, new: &str) -> Result<(), ErkError> {
        self.intents.record(format!("git branch -m {old} {new}"));
        Ok(())
    }

    fn branch_exists(&self, root: &Path, name: &str) -> Result<bool, ErkError> {
        self.inner.branch_exists(root, name)
    }

    fn current_branch(&self, root: &Path) -> Result<Option<String>, ErkError> {
        self.inner.current_branch(root)
    }

    fn default_branch(&self, root: &Path) -> Result<Option<String>, ErkError> {
        self.inner.default_branch(root)
    }

    fn git_common_dir(&self, root: &Path) -> Result<PathBuf, ErkError> {
        self.inner.git_common_dir(root)
    }

    fn toplevel(&self, from: &Path) -> Result<PathBuf, ErkError> {
        self.inner.toplevel(from)
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.inner.path_exists(path)
    }

    fn file_status(&self, root: &Path) -> Result<FileStatus, ErkError> {
        self.inner.file_status(root)
    }
}

// ============================================================================
// Host
// ============================================================================

pub struct DryRunHost {
    inner: Arc<dyn Host>,
    intents: RecordedIntents,
}

impl DryRunHost {
    pub fn new(inner: Arc<dyn Host>, intents: RecordedIntents) -> Self {
        Self { inner, intents }
    }
}

impl Host for DryRunHost {
    fn create_issue(
        &self,
        title: &str,
        _body: &str,
        labels: &[&str],
    ) -> Result<IssueRef, ErkError> {
        self.intents.record(format!(
            "gh issue create --title {title} --label {}",
            labels.join(",")
        ));
        Ok(IssueRef {
            number: 0,
            url: "https://example.invalid/issues/0".to_string(),
        })
    }

    fn get_issue(&self, number: u64) -> Result<Issue, ErkError> {
        self.inner.get_issue(number)
    }

    fn update_issue_body(&self, number: u64, _body: &str) -> Result<(), ErkError> {
        self.intents.record(format!("gh issue edit {number} --body …"));
        Ok(())
    }

    fn close_issue(&self, number: u64, _comment: Option<&str>) -> Result<(), ErkError> {
        self.intents.record(format!("gh issue close {number}"));
        Ok(())
    }

    fn add_comment(&self, number: u64, _body: &str) -> Result<(), ErkError> {
        self.intents
            .record(format!("gh issue comment {number} --body …"));
        Ok(())
    }

    fn list_comments(&self, number: u64) -> Result<Vec<IssueComment>, ErkError> {
        self.inner.list_comments(number)
    }

    fn ensure_label(&self, name: &str, color: &str, _description: &str) -> Result<(), ErkError> {
        self.intents
            .record(format!("gh label create {name} --color {color}"));
        Ok(())
    }

    fn pr_for_branch(&self, branch: &str) -> Result<Option<PullRequest>, ErkError> {
        self.inner.pr_for_branch(branch)
    }

    fn close_pr(&self, number: u64, _comment: Option<&str>) -> Result<(), ErkError> {
        self.intents.record(format!("gh pr close {number}"));
        Ok(())
    }

    fn dispatch_workflow(
        &self,
        workflow: &str,
        inputs: &[(&str, String)],
    ) -> Result<(), ErkError> {
        let rendered: Vec<String> = inputs.iter().map(|(k, v)| format!("{k}={v}")).collect();
        self.intents.record(format!(
            "gh workflow run {workflow} {}",
            rendered.join(" ")
        ));
        Ok(())
    }

    fn latest_run_for_workflow(&self, workflow: &str) -> Result<Option<WorkflowRun>, ErkError> {
        self.inner.latest_run_for_workflow(workflow)
    }

    fn current_user(&self) -> Result<String, ErkError> {
        self.inner.current_user()
    }
}

// ============================================================================
// Stack
// ============================================================================

pub struct DryRunStack {
    inner: Arc<dyn Stack>,
    intents: RecordedIntents,
}

impl DryRunStack {
    pub fn new(inner: Arc<dyn Stack>, intents: RecordedIntents) -> Self {
        Self { inner, intents }
    }
}

impl Stack for DryRunStack {
    fn current_stack(&self, root: &Path) -> Result<Vec<String>, ErkError> {
        self.inner.current_stack(root)
    }

    fn is_tracked(&self, root: &Path, branch: &str) -> Result<bool, ErkError> {
        self.inner.is_tracked(root, branch)
    }

    fn restack(&self, _root: &Path) -> Result<(), ErkError> {
        self.intents.record("gt restack");
        Ok(())
    }

    fn move_onto(&self, _root: &Path, base: &str) -> Result<(), ErkError> {
        self.intents.record(format!("gt move --onto {base}"));
        Ok(())
    }

    fn sync(&self, _root: &Path) -> Result<(), ErkError> {
        self.intents.record("gt sync --force");
        Ok(())
    }

    fn up(&self, _root: &Path) -> Result<(), ErkError> {
        self.intents.record("gt up");
        Ok(())
    }

    fn down(&self, _root: &Path) -> Result<(), ErkError> {
        self.intents.record("gt down");
        Ok(())
    }

    fn submit_stack(&self, _root: &Path) -> Result<(), ErkError> {
        self.intents.record("gt submit --stack --no-interactive");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::fake::FakeGit;

    #[test]
    fn dry_run_git_records_writes_without_mutating() {
        let fake = Arc::new(FakeGit::builder().branch("main").build());
        let intents = RecordedIntents::new();
        let dry = DryRunGit::new(fake.clone(), intents.clone());

        dry.delete_branch(Path::new("/repo"), "main", false).unwrap();
        dry.remove_worktree(Path::new("/repo"), Path::new("/erks/repo/foo"), false)
            .unwrap();

        // The fake's mutation trackers stay empty
        assert!(fake.deleted_branches().is_empty());
        assert!(fake.removed_worktrees().is_empty());
        // ...but the intents were captured
        assert_eq!(
            intents.list(),
            vec![
                "git branch -d main",
                "git worktree remove /erks/repo/foo"
            ]
        );
    }

    #[test]
    fn dry_run_git_passes_reads_through() {
        let fake = Arc::new(FakeGit::builder().branch("main").build());
        let dry = DryRunGit::new(fake, RecordedIntents::new());
        assert!(dry.branch_exists(Path::new("/repo"), "main").unwrap());
        assert!(!dry.branch_exists(Path::new("/repo"), "missing").unwrap());
    }
}
