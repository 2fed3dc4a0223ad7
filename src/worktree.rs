//! Worktree naming rules and the managed-worktree lifecycle.

use std::path::{Path, PathBuf};

use crate::context::Context;
use crate::error::ErkError;
use crate::ops::runner;
use crate::ops::{Git, Host, WorktreeInfo};
use crate::plan::{PlanFolder, PlanStore, Progress};
use crate::shell::shell_command;

/// Maximum length of a worktree name.
pub const MAX_NAME_LEN: usize = 31;

/// Fallback when a title sanitizes to nothing.
const FALLBACK_NAME: &str = "work";

/// Reserved name for the repository's root worktree.
pub const ROOT_NAME: &str = "root";

/// Derive a worktree name from a plan title.
///
/// Lowercase; everything outside `[a-z0-9-]` becomes `-`; consecutive
/// dashes collapse; leading/trailing dashes are stripped; the result is
/// truncated to [`MAX_NAME_LEN`] and re-stripped. Empty results fall back
/// to `"work"`. The function is idempotent.
pub fn sanitize_worktree_name(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for ch in title.to_lowercase().chars() {
        let mapped = if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            ch
        } else {
            '-'
        };
        if mapped == '-' && out.ends_with('-') {
            continue;
        }
        out.push(mapped);
    }

    let mut name: String = out.trim_matches('-').to_string();
    if name.len() > MAX_NAME_LEN {
        name.truncate(MAX_NAME_LEN);
        name = name.trim_end_matches('-').to_string();
    }
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name
    }
}

/// Check legality of an explicit worktree name.
///
/// Explicit names are validated, not rewritten: `.` is allowed (e.g.
/// `v2.1-fixes`) but path separators, reserved names, and anything outside
/// `[a-z0-9.-]` are rejected.
pub fn validate_worktree_name(name: &str) -> Result<(), ErkError> {
    let reject = |reason: &str| {
        Err(ErkError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        })
    };

    if name.is_empty() {
        return reject("name is empty");
    }
    if name == "." || name == ".." {
        return reject("name is a path shorthand");
    }
    if name == ROOT_NAME {
        return reject("'root' is reserved for the repository root");
    }
    if name.starts_with('/') || name.contains('/') {
        return reject("name must not contain '/'");
    }
    if name.len() > MAX_NAME_LEN {
        return reject("name is longer than 31 characters");
    }
    if name.starts_with('-') || name.ends_with('-') {
        return reject("name must not begin or end with '-'");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return reject("name may only contain lowercase letters, digits, '.' and '-'");
    }
    Ok(())
}

/// Request shape for [`WorktreeManager::create`]: either an explicit name
/// or a title to sanitize, optionally seeded with a plan body.
#[derive(Debug, Clone, Default)]
pub struct CreateRequest {
    pub name: Option<String>,
    pub title: Option<String>,
    pub plan_body: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedWorktree {
    pub name: String,
    pub path: PathBuf,
    pub branch: String,
    pub created_branch: bool,
    /// Rendered env, in declaration order (also materialized on disk)
    pub env: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOutcome {
    pub name: String,
    pub branch_deleted: bool,
    /// Where the shell should relocate when the cwd was inside the target
    pub relocate_to: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConsolidateReport {
    pub absorbed: Vec<String>,
    pub failures: Vec<(String, String)>,
}

/// Lifecycle operations over the erks tree. Holds a reference to the
/// per-invocation [`Context`] only.
pub struct WorktreeManager<'a> {
    ctx: &'a Context,
}

impl<'a> WorktreeManager<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// All managed worktrees: entries of `git worktree list` whose paths
    /// live under the erks dir, plus the root worktree.
    pub fn list(&self) -> Result<Vec<WorktreeInfo>, ErkError> {
        let repo = self.ctx.repo()?;
        let all = self.ctx.git.list_worktrees(&repo.root)?;
        Ok(all
            .into_iter()
            .filter(|wt| wt.is_root || wt.path.starts_with(&repo.erks_dir))
            .collect())
    }

    /// Find a managed worktree by name.
    pub fn find(&self, name: &str) -> Result<WorktreeInfo, ErkError> {
        let repo = self.ctx.repo()?;
        if name == ROOT_NAME {
            return self
                .list()?
                .into_iter()
                .find(|wt| wt.is_root)
                .ok_or_else(|| ErkError::WorktreeNotFound {
                    name: name.to_string(),
                });
        }
        let target = repo.erks_dir.join(name);
        self.list()?
            .into_iter()
            .find(|wt| wt.path == target)
            .ok_or_else(|| ErkError::WorktreeNotFound {
                name: name.to_string(),
            })
    }

    /// The worktree containing `cwd`, if any (longest path match wins).
    pub fn current(&self) -> Result<Option<WorktreeInfo>, ErkError> {
        let cwd = &self.ctx.cwd;
        let mut best: Option<WorktreeInfo> = None;
        for wt in self.list()? {
            if cwd.starts_with(&wt.path)
                && best
                    .as_ref()
                    .is_none_or(|b| wt.path.components().count() > b.path.components().count())
            {
                best = Some(wt);
            }
        }
        Ok(best)
    }

    /// Display name of a managed worktree: the directory basename, or
    /// `"root"` for the repository root.
    pub fn display_name(wt: &WorktreeInfo) -> String {
        if wt.is_root {
            ROOT_NAME.to_string()
        } else {
            wt.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| wt.path.display().to_string())
        }
    }

    pub fn create(&self, request: CreateRequest) -> Result<CreatedWorktree, ErkError> {
        let repo = self.ctx.repo()?;
        if !self.ctx.git.path_exists(&self.ctx.config.erks_root) {
            return Err(ErkError::NotInitialized);
        }

        let name = match (&request.name, &request.title) {
            (Some(name), _) => {
                validate_worktree_name(name)?;
                name.clone()
            }
            (None, Some(title)) => {
                let name = sanitize_worktree_name(title);
                validate_worktree_name(&name)?;
                name
            }
            (None, None) => {
                return Err(ErkError::InvalidName {
                    name: String::new(),
                    reason: "either a name or a title is required".to_string(),
                });
            }
        };

        let target = repo.erks_dir.join(&name);
        if self.ctx.git.path_exists(&target) {
            return Err(ErkError::DestinationExists { path: target });
        }

        // Reuse an existing branch of the same name, or create from trunk.
        let branch_exists = self.ctx.git.branch_exists(&repo.root, &name)?;
        let created_branch = !branch_exists;
        if branch_exists {
            self.ctx.git.add_worktree(&repo.root, &target, &name, None)?;
        } else {
            let trunk = self.ctx.trunk()?.to_string();
            self.ctx
                .git
                .add_worktree(&repo.root, &target, &name, Some(&trunk))?;
        }

        // In dry-run the directory was never created; everything that
        // touches the filesystem below is skipped.
        let materialized = self.ctx.git.path_exists(&target);

        let env = if materialized {
            self.materialize_env(&name, &target, repo)?
        } else {
            Vec::new()
        };

        if materialized && let Err(hook_err) = self.run_post_create(&target) {
            return Err(self.rollback_create(repo, &target, &name, created_branch, hook_err));
        }

        if materialized && let Some(body) = &request.plan_body {
            PlanFolder::create(&target, body)?;
        }

        Ok(CreatedWorktree {
            name: name.clone(),
            path: target,
            branch: name,
            created_branch,
            env,
        })
    }

    /// Render the repo config's env table and write it to `.erk/env`.
    ///
    /// Templates resolve against earlier keys, then a few built-ins
    /// (`WORKTREE_NAME`, `WORKTREE_PATH`, `REPO_ROOT`, `REPO_NAME`), then
    /// the process environment.
    fn materialize_env(
        &self,
        name: &str,
        target: &Path,
        repo: &crate::context::RepoContext,
    ) -> Result<Vec<(String, String)>, ErkError> {
        let builtins = [
            ("WORKTREE_NAME", name.to_string()),
            ("WORKTREE_PATH", target.display().to_string()),
            ("REPO_ROOT", repo.root.display().to_string()),
            ("REPO_NAME", repo.repo_name.clone()),
        ];
        let rendered = crate::config::render_env(&self.ctx.repo_config.env, |key| {
            builtins
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
                .or_else(|| std::env::var(key).ok())
        });

        let erk_dir = target.join(".erk");
        std::fs::create_dir_all(&erk_dir).map_err(|e| ErkError::Internal {
            identifier: format!("env-dir: {e}"),
        })?;
        // Keep erk's private folder out of the index
        std::fs::write(erk_dir.join(".gitignore"), "*\n").map_err(|e| ErkError::Internal {
            identifier: format!("env-gitignore: {e}"),
        })?;
        let mut content = String::new();
        for (key, value) in &rendered {
            content.push_str(&format!("{key}={value}\n"));
        }
        std::fs::write(erk_dir.join("env"), content).map_err(|e| ErkError::Internal {
            identifier: format!("env-file: {e}"),
        })?;

        Ok(rendered.into_iter().collect())
    }

    /// Read the materialized env of an existing worktree.
    pub fn read_env(worktree: &Path) -> Vec<(String, String)> {
        let Ok(content) = std::fs::read_to_string(worktree.join(".erk").join("env")) else {
            return Vec::new();
        };
        content
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once('=')?;
                (!key.is_empty()).then(|| (key.to_string(), value.to_string()))
            })
            .collect()
    }

    fn run_post_create(&self, target: &Path) -> Result<(), ErkError> {
        let shell = self.ctx.repo_config.post_create_shell.as_deref();
        for command in &self.ctx.repo_config.post_create_commands {
            self.ctx.feedback.progress(format!("running: {command}"));
            let mut cmd = shell_command(shell, command);
            cmd.current_dir(target);
            runner::run_checked(&mut cmd, Some("post-create"))?;
        }
        Ok(())
    }

    /// Best-effort rollback after a failed post-create hook: remove the
    /// worktree, prune metadata, and drop a branch we created. Both the
    /// original failure and the rollback outcome are reported.
    fn rollback_create(
        &self,
        repo: &crate::context::RepoContext,
        target: &Path,
        branch: &str,
        created_branch: bool,
        original: ErkError,
    ) -> ErkError {
        let mut rollback_notes = Vec::new();
        if let Err(e) = self.ctx.git.remove_worktree(&repo.root, target, true) {
            rollback_notes.push(format!("worktree removal failed: {}", e.summary()));
        }
        if let Err(e) = self.ctx.git.prune_worktrees(&repo.root) {
            rollback_notes.push(format!("prune failed: {}", e.summary()));
        }
        if created_branch && let Err(e) = self.ctx.git.delete_branch(&repo.root, branch, true) {
            rollback_notes.push(format!("branch deletion failed: {}", e.summary()));
        }

        let rollback = if rollback_notes.is_empty() {
            "rolled back: worktree removed".to_string()
        } else {
            format!("rollback incomplete: {}", rollback_notes.join("; "))
        };

        match original {
            ErkError::CommandFailed {
                command,
                exit_code,
                stderr,
            } => ErkError::CommandFailed {
                command,
                exit_code,
                stderr: format!("{stderr}\n({rollback})"),
            },
            other => other,
        }
    }

    pub fn delete(&self, name: &str, force_branch: bool) -> Result<DeleteOutcome, ErkError> {
        validate_worktree_name(name)?;
        let repo = self.ctx.repo()?;
        let worktree = self.find(name)?;
        if worktree.is_root {
            return Err(ErkError::InvalidName {
                name: name.to_string(),
                reason: "the root worktree cannot be deleted".to_string(),
            });
        }

        // Relocate before removal when the cwd is inside the target: the
        // safe anchor is the trunk worktree, falling back to the repo root.
        let relocate_to = if self.ctx.cwd.starts_with(&worktree.path) {
            Some(self.safe_anchor(repo)?)
        } else {
            None
        };

        self.ctx
            .git
            .remove_worktree(&repo.root, &worktree.path, force_branch)?;

        let mut branch_deleted = false;
        if force_branch && let Some(branch) = &worktree.branch {
            self.ctx.git.delete_branch(&repo.root, branch, true)?;
            branch_deleted = true;
        }

        Ok(DeleteOutcome {
            name: name.to_string(),
            branch_deleted,
            relocate_to,
        })
    }

    fn safe_anchor(&self, repo: &crate::context::RepoContext) -> Result<PathBuf, ErkError> {
        if let Some(trunk) = repo.trunk_branch.as_deref() {
            for wt in self.list()? {
                if wt.branch.as_deref() == Some(trunk) {
                    return Ok(wt.path);
                }
            }
        }
        Ok(repo.root.clone())
    }

    /// Atomic-ish rename: move the directory (git updates its metadata),
    /// then rename the branch; a branch-rename failure moves the
    /// directory back.
    pub fn rename(&self, old: &str, new: &str) -> Result<CreatedWorktree, ErkError> {
        validate_worktree_name(new)?;
        let repo = self.ctx.repo()?;
        let worktree = self.find(old)?;
        if worktree.is_root {
            return Err(ErkError::InvalidName {
                name: old.to_string(),
                reason: "the root worktree cannot be renamed".to_string(),
            });
        }
        let new_path = repo.erks_dir.join(new);
        if self.ctx.git.path_exists(&new_path) {
            return Err(ErkError::DestinationExists { path: new_path });
        }

        self.ctx
            .git
            .move_worktree(&repo.root, &worktree.path, &new_path)?;

        if let Some(branch) = &worktree.branch
            && branch == old
            && let Err(rename_err) = self.ctx.git.rename_branch(&repo.root, old, new)
        {
            // Partial failure: restore the directory move
            if let Err(undo_err) = self
                .ctx
                .git
                .move_worktree(&repo.root, &new_path, &worktree.path)
            {
                return Err(ErkError::Internal {
                    identifier: format!(
                        "rename-rollback: {} then {}",
                        rename_err.summary(),
                        undo_err.summary()
                    ),
                });
            }
            return Err(rename_err);
        }

        Ok(CreatedWorktree {
            name: new.to_string(),
            path: new_path,
            branch: new.to_string(),
            created_branch: false,
            env: Vec::new(),
        })
    }

    /// Resolve a checkout target: the worktree path plus its materialized
    /// env, ready for the activation protocol.
    pub fn checkout(&self, name: &str) -> Result<(WorktreeInfo, Vec<(String, String)>), ErkError> {
        let worktree = self.find(name)?;
        let env = Self::read_env(&worktree.path);
        Ok((worktree, env))
    }

    /// Absorb the plan folders of `sources` into `target`. Conservative:
    /// a source whose plan conflicts with an existing file in the target
    /// fails (per-worktree) unless `force` is set. Sources are left in
    /// place; their plans are re-homed onto the target — the markdown
    /// lands under `.plan/merged/`, the target's progress front matter
    /// absorbs the source's step counts, and the host-side record is
    /// re-pointed at the target worktree.
    pub fn consolidate(
        &self,
        sources: &[String],
        target: &str,
        force: bool,
    ) -> Result<ConsolidateReport, ErkError> {
        let target_wt = self.find(target)?;
        let mut report = ConsolidateReport::default();

        for source in sources {
            if source == target {
                continue;
            }
            let outcome = self.absorb_plan(source, target, &target_wt.path, force);
            match outcome {
                Ok(true) => report.absorbed.push(source.clone()),
                Ok(false) => report
                    .failures
                    .push((source.clone(), "no plan folder".to_string())),
                Err(e) => report.failures.push((source.clone(), e.summary())),
            }
        }

        Ok(report)
    }

    fn absorb_plan(
        &self,
        source: &str,
        target_name: &str,
        target: &Path,
        force: bool,
    ) -> Result<bool, ErkError> {
        let source_wt = self.find(source)?;
        let Some(source_folder) = PlanFolder::discover(&source_wt.path) else {
            return Ok(false);
        };
        let body = source_folder.plan_body()?;

        let dest_dir = target.join(".plan").join("merged");
        let dest = dest_dir.join(format!("{source}.md"));
        if dest.exists() && !force {
            return Err(ErkError::DestinationExists { path: dest });
        }

        // Re-home the plan folder: fold the source's steps and counts
        // into the target's progress. A target without a (canonical)
        // folder gets a fresh one seeded from the source.
        let source_progress = source_folder.progress().unwrap_or(Progress {
            completed_steps: 0,
            total_steps: 0,
        });
        let source_steps = source_folder.progress_steps();
        match PlanFolder::discover(target) {
            Some(target_folder) if !target_folder.is_legacy() => {
                let target_progress = target_folder.progress().unwrap_or(Progress {
                    completed_steps: 0,
                    total_steps: 0,
                });
                let mut steps = target_folder.progress_steps();
                steps.extend(source_steps);
                target_folder.write_progress(
                    Progress {
                        completed_steps: target_progress.completed_steps
                            + source_progress.completed_steps,
                        total_steps: target_progress.total_steps + source_progress.total_steps,
                    },
                    &steps,
                )?;
                if target_folder.issue_link().is_none()
                    && let Some(link) = source_folder.issue_link()
                {
                    target_folder.write_issue_link(&link)?;
                }
            }
            _ => {
                let target_folder = PlanFolder::create(target, &body)?;
                target_folder.write_progress(source_progress, &source_steps)?;
                if let Some(link) = source_folder.issue_link() {
                    target_folder.write_issue_link(&link)?;
                }
            }
        }

        std::fs::create_dir_all(&dest_dir).map_err(|e| ErkError::Internal {
            identifier: format!("consolidate: {e}"),
        })?;
        std::fs::write(&dest, &body).map_err(|e| ErkError::Internal {
            identifier: format!("consolidate: {e}"),
        })?;

        // Re-associate the host-side record with the absorbing worktree.
        if let Some(link) = source_folder.issue_link() {
            let store = PlanStore::new(self.ctx.host.as_ref());
            match store.load(link.issue_number) {
                Ok(record) => {
                    let mut header = record.header.clone();
                    header.worktree_name = target_name.to_string();
                    store.update_header(record.issue.number, &header)?;
                    self.ctx.host.add_comment(
                        record.issue.number,
                        &format!(
                            "progress update: consolidated into worktree `{target_name}`"
                        ),
                    )?;
                }
                // A stale local link is not fatal to the local merge
                Err(ErkError::IssueNotFound { .. }) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claude::FakeClaudeExecutor;
    use crate::config::GlobalConfig;
    use crate::context::ContextBuilder;
    use crate::ops::{FakeClock, FakeGit, FakeGitBuilder, FakeHost};
    use chrono::TimeZone;
    use rstest::rstest;
    use std::sync::Arc;

    #[rstest]
    #[case("Add OAuth 2.0 + JWT!!!", "add-oauth-2-0-jwt")]
    #[case("Refactor parser", "refactor-parser")]
    #[case("snake_case_title", "snake-case-title")]
    #[case("  !!!  ", "work")]
    #[case("", "work")]
    #[case("UPPER Case", "upper-case")]
    #[case("--already--dashed--", "already-dashed")]
    fn sanitizes_titles(#[case] title: &str, #[case] expected: &str) {
        assert_eq!(sanitize_worktree_name(title), expected);
    }

    #[test]
    fn sanitation_truncates_and_restrips() {
        let title = "a very long title that goes on and on forever";
        let name = sanitize_worktree_name(title);
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(!name.ends_with('-'));
    }

    #[test]
    fn sanitation_is_idempotent() {
        let long = "x".repeat(50);
        for title in ["Add OAuth 2.0 + JWT!!!", long.as_str(), "Weird ___ title ~~~"] {
            let once = sanitize_worktree_name(title);
            assert_eq!(sanitize_worktree_name(&once), once);
        }
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("root")]
    #[case("/abs")]
    #[case("a/b")]
    #[case("-leading")]
    #[case("trailing-")]
    #[case("UPPER")]
    #[case("has space")]
    fn rejects_illegal_names(#[case] name: &str) {
        assert!(validate_worktree_name(name).is_err(), "{name:?} accepted");
    }

    #[rstest]
    #[case("feature-x")]
    #[case("v2.1-fixes")]
    #[case("a")]
    fn accepts_legal_names(#[case] name: &str) {
        assert!(validate_worktree_name(name).is_ok());
    }

    struct Fixture {
        ctx: Context,
        git: Arc<FakeGit>,
        host: Arc<FakeHost>,
        erks_dir: PathBuf,
        _tmp: tempfile::TempDir,
    }

    fn fixture(build: impl FnOnce(FakeGitBuilder, &Path) -> FakeGitBuilder) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let base = dunce::canonicalize(tmp.path()).unwrap();
        let root = base.join("repo");
        std::fs::create_dir_all(root.join(".git")).unwrap();
        let erks_root = base.join("erks");
        let erks_dir = erks_root.join("repo");
        std::fs::create_dir_all(&erks_dir).unwrap();

        let builder = FakeGit::builder()
            .root(&root)
            .default_branch("main")
            .worktree(&root, "main")
            .existing_path(&erks_root);
        let git = Arc::new(build(builder, &erks_dir).build());

        let mut config = GlobalConfig::default();
        config.erks_root = erks_root;

        let host = Arc::new(FakeHost::builder().build());
        let ctx = ContextBuilder::new()
            .config(config)
            .cwd(&root)
            .git(git.clone())
            .host(host.clone())
            .clock(Arc::new(FakeClock::new(
                chrono::Utc.with_ymd_and_hms(2025, 11, 26, 14, 30, 0).unwrap(),
            )))
            .executor(Arc::new(FakeClaudeExecutor::new(vec![])))
            .build()
            .unwrap();

        Fixture {
            ctx,
            git,
            host,
            erks_dir,
            _tmp: tmp,
        }
    }

    #[test]
    fn create_from_title_makes_branch_from_trunk() {
        let f = fixture(|b, _| b);
        let manager = WorktreeManager::new(&f.ctx);
        let created = manager
            .create(CreateRequest {
                title: Some("Add OAuth 2.0 + JWT!!!".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(created.name, "add-oauth-2-0-jwt");
        assert!(created.created_branch);
        assert_eq!(created.path, f.erks_dir.join("add-oauth-2-0-jwt"));
        assert_eq!(f.git.created_branches(), vec!["add-oauth-2-0-jwt"]);
        assert_eq!(f.git.added_worktrees().len(), 1);
    }

    #[test]
    fn create_reuses_existing_branch() {
        let f = fixture(|b, _| b.branch("feature-x"));
        let manager = WorktreeManager::new(&f.ctx);
        let created = manager
            .create(CreateRequest {
                name: Some("feature-x".into()),
                ..Default::default()
            })
            .unwrap();
        assert!(!created.created_branch);
        assert!(f.git.created_branches().is_empty());
    }

    #[test]
    fn create_fails_when_destination_exists() {
        let f = fixture(|b, erks| b.existing_path(erks.join("taken")));
        let manager = WorktreeManager::new(&f.ctx);
        let err = manager
            .create(CreateRequest {
                name: Some("taken".into()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, ErkError::DestinationExists { .. }));
        assert_eq!(err.summary(), "destination exists");
        assert!(f.git.added_worktrees().is_empty());
    }

    #[test]
    fn create_materializes_env_file() {
        let f = {
            let mut f = fixture(|b, _| b);
            f.ctx
                .repo_config
                .env
                .insert("GREETING".into(), "hello ${WORKTREE_NAME}".into());
            f
        };
        let manager = WorktreeManager::new(&f.ctx);
        let created = manager
            .create(CreateRequest {
                name: Some("envy".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(
            created.env,
            vec![("GREETING".to_string(), "hello envy".to_string())]
        );
        let on_disk = WorktreeManager::read_env(&created.path);
        assert_eq!(on_disk, created.env);
    }

    #[test]
    fn delete_removes_worktree_and_optionally_branch() {
        let f = fixture(|b, erks| b.worktree(erks.join("feat"), "feat"));
        let manager = WorktreeManager::new(&f.ctx);

        let outcome = manager.delete("feat", true).unwrap();
        assert!(outcome.branch_deleted);
        assert!(outcome.relocate_to.is_none());
        assert_eq!(f.git.removed_worktrees(), vec![f.erks_dir.join("feat")]);
        assert_eq!(f.git.deleted_branches(), vec!["feat"]);

        let names: Vec<_> = manager
            .list()
            .unwrap()
            .iter()
            .map(WorktreeManager::display_name)
            .collect();
        assert!(!names.contains(&"feat".to_string()));
    }

    #[test]
    fn delete_without_force_branch_keeps_branch() {
        let f = fixture(|b, erks| b.worktree(erks.join("feat"), "feat"));
        let manager = WorktreeManager::new(&f.ctx);
        let outcome = manager.delete("feat", false).unwrap();
        assert!(!outcome.branch_deleted);
        assert!(f.git.deleted_branches().is_empty());
        assert!(
            f.git
                .branch_exists(Path::new("/unused"), "feat")
                .unwrap()
        );
    }

    /// Lay the worktree down on disk the way `git worktree add` would:
    /// the directory plus a `.git` file, so repo discovery works from
    /// inside it.
    fn materialize_on_disk(f: &Fixture, name: &str) {
        let dir = f.erks_dir.join(name);
        std::fs::create_dir_all(dir.join("src")).unwrap();
        std::fs::write(dir.join(".git"), "gitdir: elsewhere\n").unwrap();
    }

    #[test]
    fn delete_relocates_when_cwd_inside_target() {
        let f = fixture(|b, erks| b.worktree(erks.join("feat"), "feat"));
        materialize_on_disk(&f, "feat");
        let inside = f.erks_dir.join("feat").join("src");
        let ctx = f.ctx.regenerate_at(inside).unwrap();
        let manager = WorktreeManager::new(&ctx);
        let outcome = manager.delete("feat", false).unwrap();
        // Anchor is the trunk worktree (the root here)
        assert_eq!(outcome.relocate_to, Some(ctx.repo().unwrap().root.clone()));
    }

    #[test]
    fn delete_rejects_root() {
        let f = fixture(|b, _| b);
        let manager = WorktreeManager::new(&f.ctx);
        assert!(manager.delete("root", false).is_err());
    }

    #[test]
    fn rename_moves_directory_and_branch() {
        let f = fixture(|b, erks| b.worktree(erks.join("old-name"), "old-name"));
        let manager = WorktreeManager::new(&f.ctx);
        let renamed = manager.rename("old-name", "new-name").unwrap();
        assert_eq!(renamed.path, f.erks_dir.join("new-name"));
        assert_eq!(
            f.git.moved_worktrees(),
            vec![(f.erks_dir.join("old-name"), f.erks_dir.join("new-name"))]
        );
        assert_eq!(
            f.git.renamed_branches(),
            vec![("old-name".to_string(), "new-name".to_string())]
        );
    }

    #[test]
    fn current_finds_deepest_match() {
        let f = fixture(|b, erks| b.worktree(erks.join("feat"), "feat"));
        materialize_on_disk(&f, "feat");
        let inside = f.erks_dir.join("feat").join("deep").join("dir");
        std::fs::create_dir_all(&inside).unwrap();
        let ctx = f.ctx.regenerate_at(inside).unwrap();
        let manager = WorktreeManager::new(&ctx);
        let current = manager.current().unwrap().unwrap();
        assert_eq!(WorktreeManager::display_name(&current), "feat");
    }

    #[test]
    fn consolidate_absorbs_sibling_plans() {
        let f = fixture(|b, erks| {
            b.worktree(erks.join("part-one"), "part-one")
                .worktree(erks.join("part-two"), "part-two")
                .worktree(erks.join("target"), "target")
        });
        for name in ["part-one", "part-two", "target"] {
            materialize_on_disk(&f, name);
        }
        PlanFolder::create(&f.erks_dir.join("part-one"), "# Part one\n").unwrap();
        PlanFolder::create(&f.erks_dir.join("target"), "# Target\n").unwrap();

        let manager = WorktreeManager::new(&f.ctx);
        let report = manager
            .consolidate(
                &["part-one".to_string(), "part-two".to_string()],
                "target",
                false,
            )
            .unwrap();

        assert_eq!(report.absorbed, vec!["part-one"]);
        // part-two has no plan folder and is reported, not fatal
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, "part-two");

        let merged = f
            .erks_dir
            .join("target")
            .join(".plan")
            .join("merged")
            .join("part-one.md");
        assert_eq!(std::fs::read_to_string(merged).unwrap(), "# Part one\n");
    }

    #[test]
    fn consolidate_folds_progress_and_reassociates_record() {
        let f = fixture(|b, erks| {
            b.worktree(erks.join("src-plan"), "src-plan")
                .worktree(erks.join("target"), "target")
        });
        for name in ["src-plan", "target"] {
            materialize_on_disk(&f, name);
        }

        // The source carries a saved record and a partially-done plan
        let issue = PlanStore::new(f.host.as_ref())
            .save(
                "Src plan",
                "# Src\n\n- [ ] a\n- [ ] b",
                "src-plan",
                chrono::Utc.with_ymd_and_hms(2025, 11, 20, 8, 0, 0).unwrap(),
            )
            .unwrap();
        let source_folder =
            PlanFolder::create(&f.erks_dir.join("src-plan"), "# Src\n\n- [ ] a\n- [ ] b")
                .unwrap();
        source_folder
            .write_progress(
                Progress {
                    completed_steps: 1,
                    total_steps: 2,
                },
                &["- [x] a".to_string(), "- [ ] b".to_string()],
            )
            .unwrap();
        source_folder
            .write_issue_link(&crate::plan::folder::IssueLink {
                issue_number: issue.number,
                issue_url: issue.url.clone(),
            })
            .unwrap();
        PlanFolder::create(&f.erks_dir.join("target"), "# Target\n\n- [ ] t1").unwrap();

        let manager = WorktreeManager::new(&f.ctx);
        let report = manager
            .consolidate(&["src-plan".to_string()], "target", false)
            .unwrap();
        assert_eq!(report.absorbed, vec!["src-plan"]);

        // Target progress absorbed the source's counts and steps
        let target_folder = PlanFolder::discover(&f.erks_dir.join("target")).unwrap();
        let progress = target_folder.progress().unwrap();
        assert_eq!(progress.completed_steps, 1);
        assert_eq!(progress.total_steps, 3);
        let steps = target_folder.progress_steps();
        assert_eq!(steps, vec!["- [ ] t1", "- [x] a", "- [ ] b"]);

        // The issue link moved over, since the target had none
        assert_eq!(
            target_folder.issue_link().unwrap().issue_number,
            issue.number
        );

        // The host record now points at the absorbing worktree
        let record = PlanStore::new(f.host.as_ref()).load(issue.number).unwrap();
        assert_eq!(record.header.worktree_name, "target");
        assert!(
            f.host
                .comments_of(issue.number)
                .iter()
                .any(|c| c.body.contains("consolidated into worktree `target`"))
        );
    }

    #[test]
    fn consolidate_conflict_requires_force() {
        let f = fixture(|b, erks| {
            b.worktree(erks.join("src-a"), "src-a")
                .worktree(erks.join("target"), "target")
        });
        for name in ["src-a", "target"] {
            materialize_on_disk(&f, name);
        }
        PlanFolder::create(&f.erks_dir.join("src-a"), "# A\n").unwrap();
        PlanFolder::create(&f.erks_dir.join("target"), "# T\n").unwrap();
        let merged_dir = f.erks_dir.join("target").join(".plan").join("merged");
        std::fs::create_dir_all(&merged_dir).unwrap();
        std::fs::write(merged_dir.join("src-a.md"), "occupied").unwrap();

        let manager = WorktreeManager::new(&f.ctx);
        let report = manager
            .consolidate(&["src-a".to_string()], "target", false)
            .unwrap();
        assert!(report.absorbed.is_empty());
        assert_eq!(report.failures[0].1, "destination exists");

        let report = manager
            .consolidate(&["src-a".to_string()], "target", true)
            .unwrap();
        assert_eq!(report.absorbed, vec!["src-a"]);
        assert_eq!(
            std::fs::read_to_string(merged_dir.join("src-a.md")).unwrap(),
            "# A\n"
        );
    }

    #[test]
    fn current_in_repo_root_is_root() {
        let f = fixture(|b, _| b);
        let manager = WorktreeManager::new(&f.ctx);
        let current = manager.current().unwrap().unwrap();
        assert!(current.is_root);
        assert_eq!(WorktreeManager::display_name(&current), "root");
    }
}
