//! Git capability: the version-control operations the core consumes.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ErkError;

use super::runner;

/// One entry from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub is_root: bool,
}

/// Working-tree state parsed from `git status --porcelain`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct FileStatus {
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
}

impl FileStatus {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.modified.is_empty() && self.untracked.is_empty()
    }
}

/// Version-control capability. Paths are absolute; failures surface as
/// domain errors.
pub trait Git: Send + Sync {
    fn list_worktrees(&self, root: &Path) -> Result<Vec<WorktreeInfo>, ErkError>;

    /// Add a worktree at `path` on `branch`. With `create_from`, the branch
    /// is created from that ref; otherwise the existing branch is checked
    /// out into the new worktree.
    fn add_worktree(
        &self,
        root: &Path,
        path: &Path,
        branch: &str,
        create_from: Option<&str>,
    ) -> Result<(), ErkError>;

    fn move_worktree(&self, root: &Path, from: &Path, to: &Path) -> Result<(), ErkError>;
    fn remove_worktree(&self, root: &Path, path: &Path, force: bool) -> Result<(), ErkError>;
    fn prune_worktrees(&self, root: &Path) -> Result<(), ErkError>;

    fn create_branch(&self, root: &Path, name: &str, start: &str) -> Result<(), ErkError>;
    fn checkout_branch(&self, root: &Path, name: &str) -> Result<(), ErkError>;
    fn delete_branch(&self, root: &Path, name: &str, force: bool) -> Result<(), ErkError>;
    fn rename_branch(&self, root: &Path, old: &str, new: &str) -> Result<(), ErkError>;
    fn branch_exists(&self, root: &Path, name: &str) -> Result<bool, ErkError>;
    fn current_branch(&self, root: &Path) -> Result<Option<String>, ErkError>;

    /// Default branch from `refs/remotes/origin/HEAD`, if resolvable.
    fn default_branch(&self, root: &Path) -> Result<Option<String>, ErkError>;

    fn git_common_dir(&self, root: &Path) -> Result<PathBuf, ErkError>;

    /// Canonical repository root via `git rev-parse --show-toplevel`.
    fn toplevel(&self, from: &Path) -> Result<PathBuf, ErkError>;

    fn path_exists(&self, path: &Path) -> bool;
    fn file_status(&self, root: &Path) -> Result<FileStatus, ErkError>;
}

/// The real implementation: shells out to `git`.
pub struct RealGit;

impl RealGit {
    fn git(root: &Path) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(root);
        cmd
    }

    fn context(root: &Path) -> String {
        root.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string())
    }
}

impl Git for RealGit {
    fn list_worktrees(&self, root: &Path) -> Result<Vec<WorktreeInfo>, ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["worktree", "list", "--porcelain"]);
        let stdout = runner::run_stdout(&mut cmd, Some(&Self::context(root)))?;
        Ok(parse_worktree_porcelain(&stdout))
    }

    fn add_worktree(
        &self,
        root: &Path,
        path: &Path,
        branch: &str,
        create_from: Option<&str>,
    ) -> Result<(), ErkError> {
        let mut cmd = Self::git(root);
        match create_from {
            Some(base) => {
                cmd.args(["worktree", "add", "-b", branch])
                    .arg(path)
                    .arg(base);
            }
            None => {
                cmd.args(["worktree", "add"]).arg(path).arg(branch);
            }
        }
        runner::run_checked(&mut cmd, Some(&Self::context(root)))?;
        Ok(())
    }

    fn move_worktree(&self, root: &Path, from: &Path, to: &Path) -> Result<(), ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["worktree", "move"]).arg(from).arg(to);
        runner::run_checked(&mut cmd, Some(&Self::context(root)))?;
        Ok(())
    }

    fn remove_worktree(&self, root: &Path, path: &Path, force: bool) -> Result<(), ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["worktree", "remove"]);
        if force {
            cmd.arg("--force");
        }
        cmd.arg(path);
        runner::run_checked(&mut cmd, Some(&Self::context(root)))?;
        Ok(())
    }

    fn prune_worktrees(&self, root: &Path) -> Result<(), ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["worktree", "prune"]);
        runner::run_checked(&mut cmd, Some(&Self::context(root)))?;
        Ok(())
    }

    fn create_branch(&self, root: &Path, name: &str, start: &str) -> Result<(), ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["branch", name, start]);
        runner::run_checked(&mut cmd, Some(&Self::context(root)))?;
        Ok(())
    }

    fn checkout_branch(&self, root: &Path, name: &str) -> Result<(), ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["checkout", name]);
        runner::run_checked(&mut cmd, Some(&Self::context(root)))?;
        Ok(())
    }

    fn delete_branch(&self, root: &Path, name: &str, force: bool) -> Result<(), ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["branch", if force { "-D" } else { "-d" }, name]);
        runner::run_checked(&mut cmd, Some(&Self::context(root)))?;
        Ok(())
    }

    fn rename_branch(&self, root: &Path, old: &str, new: &str) -> Result<(), ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["branch", "-m", old, new]);
        runner::run_checked(&mut cmd, Some(&Self::context(root)))?;
        Ok(())
    }

    fn branch_exists(&self, root: &Path, name: &str) -> Result<bool, ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["show-ref", "--verify", "--quiet"])
            .arg(format!("refs/heads/{name}"));
        let output = runner::run(&mut cmd, Some(&Self::context(root))).map_err(|e| {
            ErkError::CommandFailed {
                command: "git show-ref".into(),
                exit_code: None,
                stderr: e.to_string(),
            }
        })?;
        Ok(output.status.success())
    }

    fn current_branch(&self, root: &Path) -> Result<Option<String>, ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["branch", "--show-current"]);
        let stdout = runner::run_stdout(&mut cmd, Some(&Self::context(root)))?;
        // Empty output means detached HEAD
        Ok((!stdout.is_empty()).then_some(stdout))
    }

    fn default_branch(&self, root: &Path) -> Result<Option<String>, ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["symbolic-ref", "refs/remotes/origin/HEAD"]);
        match runner::run(&mut cmd, Some(&Self::context(root))) {
            Ok(output) if output.status.success() => {
                let full = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok(full
                    .strip_prefix("refs/remotes/origin/")
                    .map(|s| s.to_string()))
            }
            // Unset origin/HEAD is not an error; the caller falls back
            Ok(_) => Ok(None),
            Err(e) => Err(ErkError::CommandFailed {
                command: "git symbolic-ref refs/remotes/origin/HEAD".into(),
                exit_code: None,
                stderr: e.to_string(),
            }),
        }
    }

    fn git_common_dir(&self, root: &Path) -> Result<PathBuf, ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["rev-parse", "--git-common-dir"]);
        let stdout = runner::run_stdout(&mut cmd, Some(&Self::context(root)))?;
        let path = PathBuf::from(stdout);
        let absolute = if path.is_relative() {
            root.join(path)
        } else {
            path
        };
        dunce::canonicalize(&absolute).map_err(|e| ErkError::CommandFailed {
            command: "git rev-parse --git-common-dir".into(),
            exit_code: None,
            stderr: e.to_string(),
        })
    }

    fn toplevel(&self, from: &Path) -> Result<PathBuf, ErkError> {
        let mut cmd = Self::git(from);
        cmd.args(["rev-parse", "--show-toplevel"]);
        let stdout = runner::run_stdout(&mut cmd, Some(&Self::context(from)))?;
        Ok(PathBuf::from(stdout))
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn file_status(&self, root: &Path) -> Result<FileStatus, ErkError> {
        let mut cmd = Self::git(root);
        cmd.args(["status", "--porcelain"]);
        let stdout = runner::run_stdout(&mut cmd, Some(&Self::context(root)))?;
        Ok(parse_status_porcelain(&stdout))
    }
}

/// Parse `git worktree list --porcelain` output. The first entry is the
/// main worktree; bare entries are skipped.
pub fn parse_worktree_porcelain(output: &str) -> Vec<WorktreeInfo> {
    let mut result = Vec::new();
    let mut first = true;

    for record in output.split("\n\n") {
        let mut path = None;
        let mut head = String::new();
        let mut branch = None;
        let mut bare = false;

        for line in record.lines() {
            if let Some(p) = line.strip_prefix("worktree ") {
                path = Some(PathBuf::from(p));
            } else if let Some(h) = line.strip_prefix("HEAD ") {
                head = h.to_string();
            } else if let Some(b) = line.strip_prefix("branch ") {
                branch = Some(b.strip_prefix("refs/heads/").unwrap_or(b).to_string());
            } else if line == "bare" {
                bare = true;
            }
        }

        let Some(path) = path else { continue };
        let is_root = first;
        first = false;
        if bare {
            continue;
        }
        result.push(WorktreeInfo {
            path,
            head,
            branch,
            is_root,
        });
    }

    result
}

/// Parse `git status --porcelain` into staged / modified / untracked lists.
///
/// Column one is the index status, column two the working tree. A path can
/// appear in both staged and modified (e.g. `MM`).
pub fn parse_status_porcelain(output: &str) -> FileStatus {
    let mut status = FileStatus::default();

    for line in output.lines() {
        if line.len() < 3 {
            continue;
        }
        let index = line.as_bytes()[0] as char;
        let worktree = line.as_bytes()[1] as char;
        let path = line[3..].to_string();

        if index == '?' && worktree == '?' {
            status.untracked.push(path);
            continue;
        }
        if index != ' ' && index != '?' {
            status.staged.push(path.clone());
        }
        if worktree != ' ' && worktree != '?' {
            status.modified.push(path);
        }
    }

    status
}
