//! In-memory capability implementations for tests.
//!
//! Initial state is constructor-only (via builders consumed before
//! construction); there are no post-construction setup methods. Mutation
//! operations update the in-memory state and also record the call in
//! read-only mutation-tracking sequences, so tests can assert both on the
//! resulting state and on exactly which writes happened.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ErkError;

use super::git::{FileStatus, Git, WorktreeInfo};
use super::host::{
    Host, Issue, IssueComment, IssueRef, IssueState, PullRequest, WorkflowRun,
};
use super::stack::Stack;

// ============================================================================
// FakeGit
// ============================================================================

#[derive(Default)]
struct GitState {
    branches: HashSet<String>,
    worktrees: Vec<WorktreeInfo>,
    default_branch: Option<String>,
    statuses: HashMap<PathBuf, FileStatus>,
    existing_paths: HashSet<PathBuf>,
    // Mutation trackers
    added_worktrees: Vec<(PathBuf, String)>,
    removed_worktrees: Vec<PathBuf>,
    moved_worktrees: Vec<(PathBuf, PathBuf)>,
    created_branches: Vec<String>,
    deleted_branches: Vec<String>,
    renamed_branches: Vec<(String, String)>,
    checkouts: Vec<String>,
    prune_count: u32,
}

pub struct FakeGit {
    root: PathBuf,
    state: Mutex<GitState>,
}

#[derive(Default)]
pub struct FakeGitBuilder {
    root: Option<PathBuf>,
    state: GitState,
}

impl FakeGitBuilder {
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    pub fn branch(mut self, name: impl Into<String>) -> Self {
        self.state.branches.insert(name.into());
        self
    }

    pub fn default_branch(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.state.branches.insert(name.clone());
        self.state.default_branch = Some(name);
        self
    }

    pub fn worktree(mut self, path: impl Into<PathBuf>, branch: impl Into<String>) -> Self {
        let path = path.into();
        let branch = branch.into();
        self.state.branches.insert(branch.clone());
        self.state.existing_paths.insert(path.clone());
        self.state.worktrees.push(WorktreeInfo {
            path,
            head: "0000000000000000000000000000000000000000".into(),
            branch: Some(branch),
            is_root: self.state.worktrees.is_empty(),
        });
        self
    }

    pub fn status(mut self, path: impl Into<PathBuf>, status: FileStatus) -> Self {
        self.state.statuses.insert(path.into(), status);
        self
    }

    pub fn existing_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.state.existing_paths.insert(path.into());
        self
    }

    pub fn build(self) -> FakeGit {
        let root = self.root.unwrap_or_else(|| PathBuf::from("/repo"));
        let mut state = self.state;
        state.existing_paths.insert(root.clone());
        FakeGit {
            root,
            state: Mutex::new(state),
        }
    }
}

impl FakeGit {
    pub fn builder() -> FakeGitBuilder {
        FakeGitBuilder::default()
    }

    pub fn added_worktrees(&self) -> Vec<(PathBuf, String)> {
        self.state.lock().unwrap().added_worktrees.clone()
    }

    pub fn removed_worktrees(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().removed_worktrees.clone()
    }

    pub fn moved_worktrees(&self) -> Vec<(PathBuf, PathBuf)> {
        self.state.lock().unwrap().moved_worktrees.clone()
    }

    pub fn created_branches(&self) -> Vec<String> {
        self.state.lock().unwrap().created_branches.clone()
    }

    pub fn deleted_branches(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_branches.clone()
    }

    pub fn renamed_branches(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().renamed_branches.clone()
    }

    pub fn checkouts(&self) -> Vec<String> {
        self.state.lock().unwrap().checkouts.clone()
    }

    pub fn prune_count(&self) -> u32 {
        self.state.lock().unwrap().prune_count
    }
}

impl Git for FakeGit {
    fn list_worktrees(&self, _root: &Path) -> Result<Vec<WorktreeInfo>, ErkError> {
        Ok(self.state.lock().unwrap().worktrees.clone())
    }

    fn add_worktree(
        &self,
        _root: &Path,
        path: &Path,
        branch: &str,
        create_from: Option<&str>,
    ) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        if state.existing_paths.contains(path) {
            return Err(ErkError::DestinationExists {
                path: path.to_path_buf(),
            });
        }
        match create_from {
            Some(_) => {
                if state.branches.contains(branch) {
                    return Err(ErkError::BranchExists {
                        branch: branch.to_string(),
                    });
                }
                state.branches.insert(branch.to_string());
                state.created_branches.push(branch.to_string());
            }
            None => {
                if !state.branches.contains(branch) {
                    return Err(ErkError::CommandFailed {
                        command: format!("git worktree add {} {branch}", path.display()),
                        exit_code: Some(128),
                        stderr: format!("fatal: invalid reference: {branch}"),
                    });
                }
            }
        }
        state.existing_paths.insert(path.to_path_buf());
        state.worktrees.push(WorktreeInfo {
            path: path.to_path_buf(),
            head: "0000000000000000000000000000000000000000".into(),
            branch: Some(branch.to_string()),
            is_root: false,
        });
        state
            .added_worktrees
            .push((path.to_path_buf(), branch.to_string()));
        Ok(())
    }

    fn move_worktree(&self, _root: &Path, from: &Path, to: &Path) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.worktrees.iter_mut().find(|w| w.path == from) else {
            return Err(ErkError::WorktreeNotFound {
                name: from.display().to_string(),
            });
        };
        entry.path = to.to_path_buf();
        state.existing_paths.remove(from);
        state.existing_paths.insert(to.to_path_buf());
        state
            .moved_worktrees
            .push((from.to_path_buf(), to.to_path_buf()));
        Ok(())
    }

    fn remove_worktree(&self, _root: &Path, path: &Path, _force: bool) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        let before = state.worktrees.len();
        state.worktrees.retain(|w| w.path != path);
        if state.worktrees.len() == before {
            return Err(ErkError::WorktreeNotFound {
                name: path.display().to_string(),
            });
        }
        state.existing_paths.remove(path);
        state.removed_worktrees.push(path.to_path_buf());
        Ok(())
    }

    fn prune_worktrees(&self, _root: &Path) -> Result<(), ErkError> {
        self.state.lock().unwrap().prune_count += 1;
        Ok(())
    }

    fn create_branch(&self, _root: &Path, name: &str, _start: &str) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        if !state.branches.insert(name.to_string()) {
            return Err(ErkError::BranchExists {
                branch: name.to_string(),
            });
        }
        state.created_branches.push(name.to_string());
        Ok(())
    }

    fn checkout_branch(&self, _root: &Path, name: &str) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        if !state.branches.contains(name) {
            return Err(ErkError::CommandFailed {
                command: format!("git checkout {name}"),
                exit_code: Some(1),
                stderr: format!("error: pathspec '{name}' did not match"),
            });
        }
        state.checkouts.push(name.to_string());
        Ok(())
    }

    fn delete_branch(&self, _root: &Path, name: &str, _force: bool) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        if !state.branches.remove(name) {
            return Err(ErkError::CommandFailed {
                command: format!("git branch -d {name}"),
                exit_code: Some(1),
                stderr: format!("error: branch '{name}' not found"),
            });
        }
        state.deleted_branches.push(name.to_string());
        Ok(())
    }

    fn rename_branch(&self, _root: &Path, old: &str, new: &str) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        if !state.branches.remove(old) {
            return Err(ErkError::CommandFailed {
                command: format!("git branch -m {old} {new}"),
                exit_code: Some(1),
                stderr: format!("error: branch '{old}' not found"),
            });
        }
        state.branches.insert(new.to_string());
        for wt in &mut state.worktrees {
            if wt.branch.as_deref() == Some(old) {
                wt.branch = Some(new.to_string());
            }
        }
        state
            .renamed_branches
            .push((old.to_string(), new.to_string()));
        Ok(())
    }

    fn branch_exists(&self, _root: &Path, name: &str) -> Result<bool, ErkError> {
        Ok(self.state.lock().unwrap().branches.contains(name))
    }

    fn current_branch(&self, root: &Path) -> Result<Option<String>, ErkError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .worktrees
            .iter()
            .find(|w| w.path == root)
            .and_then(|w| w.branch.clone())
            .or_else(|| state.default_branch.clone()))
    }

    fn default_branch(&self, _root: &Path) -> Result<Option<String>, ErkError> {
        Ok(self.state.lock().unwrap().default_branch.clone())
    }

    fn git_common_dir(&self, _root: &Path) -> Result<PathBuf, ErkError> {
        Ok(self.root.join(".git"))
    }

    fn toplevel(&self, _from: &Path) -> Result<PathBuf, ErkError> {
        Ok(self.root.clone())
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.state.lock().unwrap().existing_paths.contains(path)
    }

    fn file_status(&self, root: &Path) -> Result<FileStatus, ErkError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .statuses
            .get(root)
            .cloned()
            .unwrap_or_default())
    }
}

// ============================================================================
// FakeHost
// ============================================================================

#[derive(Default)]
struct HostState {
    issues: HashMap<u64, Issue>,
    comments: HashMap<u64, Vec<IssueComment>>,
    prs: HashMap<String, PullRequest>,
    runs: HashMap<String, WorkflowRun>,
    next_number: u64,
    // Mutation trackers
    created_issues: Vec<u64>,
    closed_issues: Vec<u64>,
    updated_bodies: Vec<u64>,
    added_comments: Vec<(u64, String)>,
    ensured_labels: Vec<String>,
    closed_prs: Vec<u64>,
    dispatched: Vec<(String, Vec<(String, String)>)>,
}

pub struct FakeHost {
    user: String,
    state: Mutex<HostState>,
}

#[derive(Default)]
pub struct FakeHostBuilder {
    user: Option<String>,
    state: HostState,
}

impl FakeHostBuilder {
    pub fn user(mut self, login: impl Into<String>) -> Self {
        self.user = Some(login.into());
        self
    }

    pub fn issue(mut self, issue: Issue) -> Self {
        self.state.next_number = self.state.next_number.max(issue.number);
        self.state.issues.insert(issue.number, issue);
        self
    }

    pub fn comment(mut self, number: u64, body: impl Into<String>) -> Self {
        self.state
            .comments
            .entry(number)
            .or_default()
            .push(IssueComment { body: body.into() });
        self
    }

    pub fn pr(mut self, branch: impl Into<String>, pr: PullRequest) -> Self {
        self.state.prs.insert(branch.into(), pr);
        self
    }

    pub fn run(mut self, workflow: impl Into<String>, run: WorkflowRun) -> Self {
        self.state.runs.insert(workflow.into(), run);
        self
    }

    pub fn build(self) -> FakeHost {
        let mut state = self.state;
        state.next_number += 1;
        FakeHost {
            user: self.user.unwrap_or_else(|| "tester".to_string()),
            state: Mutex::new(state),
        }
    }
}

impl FakeHost {
    pub fn builder() -> FakeHostBuilder {
        FakeHostBuilder::default()
    }

    pub fn created_issues(&self) -> Vec<u64> {
        self.state.lock().unwrap().created_issues.clone()
    }

    pub fn closed_issues(&self) -> Vec<u64> {
        self.state.lock().unwrap().closed_issues.clone()
    }

    pub fn added_comments(&self) -> Vec<(u64, String)> {
        self.state.lock().unwrap().added_comments.clone()
    }

    pub fn ensured_labels(&self) -> Vec<String> {
        self.state.lock().unwrap().ensured_labels.clone()
    }

    pub fn closed_prs(&self) -> Vec<u64> {
        self.state.lock().unwrap().closed_prs.clone()
    }

    pub fn dispatched(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.state.lock().unwrap().dispatched.clone()
    }

    pub fn updated_bodies(&self) -> Vec<u64> {
        self.state.lock().unwrap().updated_bodies.clone()
    }

    /// Direct read access for assertions.
    pub fn issue(&self, number: u64) -> Option<Issue> {
        self.state.lock().unwrap().issues.get(&number).cloned()
    }

    pub fn comments_of(&self, number: u64) -> Vec<IssueComment> {
        self.state
            .lock()
            .unwrap()
            .comments
            .get(&number)
            .cloned()
            .unwrap_or_default()
    }
}

impl Host for FakeHost {
    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[&str],
    ) -> Result<IssueRef, ErkError> {
        let mut state = self.state.lock().unwrap();
        let number = state.next_number;
        state.next_number += 1;
        let url = format!("https://github.com/example/repo/issues/{number}");
        state.issues.insert(
            number,
            Issue {
                number,
                title: title.to_string(),
                body: body.to_string(),
                state: IssueState::Open,
                labels: labels.iter().map(|l| l.to_string()).collect(),
                url: url.clone(),
            },
        );
        state.created_issues.push(number);
        Ok(IssueRef { number, url })
    }

    fn get_issue(&self, number: u64) -> Result<Issue, ErkError> {
        self.state
            .lock()
            .unwrap()
            .issues
            .get(&number)
            .cloned()
            .ok_or(ErkError::IssueNotFound { number })
    }

    fn update_issue_body(&self, number: u64, body: &str) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        let issue = state
            .issues
            .get_mut(&number)
            .ok_or(ErkError::IssueNotFound { number })?;
        issue.body = body.to_string();
        state.updated_bodies.push(number);
        Ok(())
    }

    fn close_issue(&self, number: u64, comment: Option<&str>) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        let issue = state
            .issues
            .get_mut(&number)
            .ok_or(ErkError::IssueNotFound { number })?;
        issue.state = IssueState::Closed;
        if let Some(comment) = comment {
            state.comments.entry(number).or_default().push(IssueComment {
                body: comment.to_string(),
            });
        }
        state.closed_issues.push(number);
        Ok(())
    }

    fn add_comment(&self, number: u64, body: &str) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        if !state.issues.contains_key(&number) {
            return Err(ErkError::IssueNotFound { number });
        }
        state.comments.entry(number).or_default().push(IssueComment {
            body: body.to_string(),
        });
        state.added_comments.push((number, body.to_string()));
        Ok(())
    }

    fn list_comments(&self, number: u64) -> Result<Vec<IssueComment>, ErkError> {
        let state = self.state.lock().unwrap();
        if !state.issues.contains_key(&number) {
            return Err(ErkError::IssueNotFound { number });
        }
        Ok(state.comments.get(&number).cloned().unwrap_or_default())
    }

    fn ensure_label(&self, name: &str, _color: &str, _description: &str) -> Result<(), ErkError> {
        self.state
            .lock()
            .unwrap()
            .ensured_labels
            .push(name.to_string());
        Ok(())
    }

    fn pr_for_branch(&self, branch: &str) -> Result<Option<PullRequest>, ErkError> {
        Ok(self.state.lock().unwrap().prs.get(branch).cloned())
    }

    fn close_pr(&self, number: u64, _comment: Option<&str>) -> Result<(), ErkError> {
        let mut state = self.state.lock().unwrap();
        for pr in state.prs.values_mut() {
            if pr.number == number {
                pr.state = "CLOSED".to_string();
            }
        }
        state.closed_prs.push(number);
        Ok(())
    }

    fn dispatch_workflow(
        &self,
        workflow: &str,
        inputs: &[(&str, String)],
    ) -> Result<(), ErkError> {
        self.state.lock().unwrap().dispatched.push((
            workflow.to_string(),
            inputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));
        Ok(())
    }

    fn latest_run_for_workflow(&self, workflow: &str) -> Result<Option<WorkflowRun>, ErkError> {
        Ok(self.state.lock().unwrap().runs.get(workflow).cloned())
    }

    fn current_user(&self) -> Result<String, ErkError> {
        Ok(self.user.clone())
    }
}

// ============================================================================
// FakeStack
// ============================================================================

#[derive(Default)]
struct StackState {
    stack: Vec<String>,
    restacks: u32,
    syncs: u32,
    moves: Vec<String>,
    submits: u32,
}

pub struct FakeStack {
    state: Mutex<StackState>,
}

impl FakeStack {
    pub fn new(stack: Vec<String>) -> Self {
        Self {
            state: Mutex::new(StackState {
                stack,
                ..Default::default()
            }),
        }
    }

    pub fn restacks(&self) -> u32 {
        self.state.lock().unwrap().restacks
    }

    pub fn syncs(&self) -> u32 {
        self.state.lock().unwrap().syncs
    }

    pub fn moves(&self) -> Vec<String> {
        self.state.lock().unwrap().moves.clone()
    }

    pub fn submits(&self) -> u32 {
        self.state.lock().unwrap().submits
    }
}

impl Stack for FakeStack {
    fn current_stack(&self, _root: &Path) -> Result<Vec<String>, ErkError> {
        Ok(self.state.lock().unwrap().stack.clone())
    }

    fn is_tracked(&self, _root: &Path, branch: &str) -> Result<bool, ErkError> {
        Ok(self.state.lock().unwrap().stack.iter().any(|b| b == branch))
    }

    fn restack(&self, _root: &Path) -> Result<(), ErkError> {
        self.state.lock().unwrap().restacks += 1;
        Ok(())
    }

    fn move_onto(&self, _root: &Path, base: &str) -> Result<(), ErkError> {
        self.state.lock().unwrap().moves.push(base.to_string());
        Ok(())
    }

    fn sync(&self, _root: &Path) -> Result<(), ErkError> {
        self.state.lock().unwrap().syncs += 1;
        Ok(())
    }

    fn up(&self, _root: &Path) -> Result<(), ErkError> {
        Ok(())
    }

    fn down(&self, _root: &Path) -> Result<(), ErkError> {
        Ok(())
    }

    fn submit_stack(&self, _root: &Path) -> Result<(), ErkError> {
        self.state.lock().unwrap().submits += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_git_tracks_worktree_lifecycle() {
        let git = FakeGit::builder()
            .root("/repo")
            .default_branch("main")
            .worktree("/repo", "main")
            .build();

        git.add_worktree(
            Path::new("/repo"),
            Path::new("/erks/repo/feat"),
            "feat",
            Some("main"),
        )
        .unwrap();
        assert_eq!(git.added_worktrees().len(), 1);
        assert!(git.branch_exists(Path::new("/repo"), "feat").unwrap());

        git.remove_worktree(Path::new("/repo"), Path::new("/erks/repo/feat"), false)
            .unwrap();
        git.delete_branch(Path::new("/repo"), "feat", false).unwrap();

        assert_eq!(git.removed_worktrees(), vec![PathBuf::from("/erks/repo/feat")]);
        assert_eq!(git.deleted_branches(), vec!["feat"]);
        let names: Vec<_> = git
            .list_worktrees(Path::new("/repo"))
            .unwrap()
            .into_iter()
            .filter_map(|w| w.branch)
            .collect();
        assert_eq!(names, vec!["main"]);
    }

    #[test]
    fn fake_git_rejects_duplicate_paths() {
        let git = FakeGit::builder().worktree("/repo", "main").build();
        let err = git
            .add_worktree(Path::new("/repo"), Path::new("/repo"), "other", Some("main"))
            .unwrap_err();
        assert!(matches!(err, ErkError::DestinationExists { .. }));
    }

    #[test]
    fn fake_host_issue_lifecycle() {
        let host = FakeHost::builder().user("alice").build();
        let created = host.create_issue("Plan", "body", &["erk-plan"]).unwrap();
        assert_eq!(created.number, 1);

        host.add_comment(created.number, "first comment").unwrap();
        host.close_issue(created.number, Some("done")).unwrap();

        let issue = host.issue(created.number).unwrap();
        assert_eq!(issue.state, IssueState::Closed);
        assert_eq!(host.comments_of(created.number).len(), 2);
        assert_eq!(host.created_issues(), vec![1]);
        assert_eq!(host.closed_issues(), vec![1]);
        assert_eq!(host.current_user().unwrap(), "alice");
    }

    #[test]
    fn fake_host_numbers_continue_after_seeded_issues() {
        let host = FakeHost::builder()
            .issue(Issue {
                number: 41,
                title: "old".into(),
                body: String::new(),
                state: IssueState::Open,
                labels: vec![],
                url: "https://github.com/example/repo/issues/41".into(),
            })
            .build();
        let created = host.create_issue("new", "", &[]).unwrap();
        assert_eq!(created.number, 42);
    }

    #[test]
    fn fake_stack_reports_membership() {
        let stack = FakeStack::new(vec!["main".into(), "feat-1".into()]);
        assert!(stack.is_tracked(Path::new("/repo"), "feat-1").unwrap());
        assert!(!stack.is_tracked(Path::new("/repo"), "feat-2").unwrap());
    }
}
