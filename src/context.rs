//! Repository discovery and the per-invocation context.
//!
//! A [`Context`] is built once per command run and threaded through all
//! calls: it owns the capability handles (git, host, stack, clock,
//! assistant executor), both configuration tiers, the discovered
//! [`RepoContext`], and the activation-script writer. There is no global
//! mutable state; anything that invalidates the working directory (e.g.
//! deleting the worktree it points at) requires regenerating the context
//! before further use.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::activation::ScriptWriter;
use crate::claude::{ClaudeExecutor, RealClaudeExecutor, parse_session_context};
use crate::config::{GlobalConfig, RepoConfig};
use crate::error::ErkError;
use crate::ops::{
    Clock, DryRunGit, DryRunHost, DryRunStack, GhHost, Git, GraphiteStack, Host, PrintingGit,
    PrintingHost, PrintingStack, RealGit, RecordedIntents, Stack, SystemClock,
};
use crate::styling::Feedback;

/// Immutable record of the discovered repository.
#[derive(Debug, Clone, PartialEq)]
pub struct RepoContext {
    /// Canonical repository root (the main worktree)
    pub root: PathBuf,
    /// Basename of the root
    pub repo_name: String,
    /// `{erks_root}/{repo_name}`
    pub erks_dir: PathBuf,
    /// Resolved trunk branch, if any; use [`Context::trunk`] to require it
    pub trunk_branch: Option<String>,
}

/// Walk up from `start` until a `.git` entry (file or directory) is found.
pub fn find_git_entry(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if dir.join(".git").exists() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

impl RepoContext {
    /// Discover the repository containing `cwd`, if any.
    ///
    /// Trunk resolution: the per-repo `trunk-branch` override wins;
    /// otherwise `refs/remotes/origin/HEAD`.
    pub fn discover(
        git: &dyn Git,
        cwd: &Path,
        config: &GlobalConfig,
    ) -> Result<Option<(Self, RepoConfig)>, ErkError> {
        let Some(containing) = find_git_entry(cwd) else {
            return Ok(None);
        };
        let root = git.toplevel(&containing)?;
        let root = dunce::canonicalize(&root).unwrap_or(root);
        let repo_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ErkError::Internal {
                identifier: "repo-root-has-no-name".into(),
            })?;
        let erks_dir = config.erks_root.join(&repo_name);
        let repo_config = RepoConfig::load_from(&erks_dir.join("config"))?;

        let trunk_branch = match &repo_config.trunk_branch {
            Some(trunk) => Some(trunk.clone()),
            None => git.default_branch(&root)?,
        };

        Ok(Some((
            Self {
                root,
                repo_name,
                erks_dir,
                trunk_branch,
            },
            repo_config,
        )))
    }
}

/// Per-invocation injection record. Owns its capability handles for the
/// duration of one command run; not shared across threads except through
/// the `Arc`ed capabilities themselves.
pub struct Context {
    pub git: Arc<dyn Git>,
    pub host: Arc<dyn Host>,
    pub stack: Option<Arc<dyn Stack>>,
    pub clock: Arc<dyn Clock>,
    pub executor: Arc<dyn ClaudeExecutor>,
    pub script_writer: ScriptWriter,
    pub config: GlobalConfig,
    pub repo_config: RepoConfig,
    pub feedback: Feedback,
    pub cwd: PathBuf,
    pub repo: Option<RepoContext>,
    /// Present when a DryRun layer is installed; lists suppressed writes
    pub intents: Option<RecordedIntents>,
    /// Session id from `SESSION_CONTEXT`, for assistant log correlation
    pub session_id: Option<String>,
}

impl Context {
    /// Require repository context, failing with the standard error when
    /// the command was run outside a repo.
    pub fn repo(&self) -> Result<&RepoContext, ErkError> {
        self.repo.as_ref().ok_or(ErkError::NotInRepo)
    }

    /// Require a resolved trunk branch.
    pub fn trunk(&self) -> Result<&str, ErkError> {
        let repo = self.repo()?;
        repo.trunk_branch
            .as_deref()
            .ok_or_else(|| ErkError::NoTrunk {
                repo: repo.repo_name.clone(),
            })
    }

    /// Rebuild the context at a different working directory. Required
    /// after any operation that invalidated `cwd` (removed it, or moved
    /// the current worktree).
    pub fn regenerate_at(&self, cwd: impl Into<PathBuf>) -> Result<Self, ErkError> {
        let cwd = cwd.into();
        let repo = RepoContext::discover(self.git.as_ref(), &cwd, &self.config)?;
        let (repo, repo_config) = match repo {
            Some((repo, repo_config)) => (Some(repo), repo_config),
            None => (None, RepoConfig::default()),
        };
        Ok(Self {
            git: self.git.clone(),
            host: self.host.clone(),
            stack: self.stack.clone(),
            clock: self.clock.clone(),
            executor: self.executor.clone(),
            script_writer: self.script_writer.clone(),
            config: self.config.clone(),
            repo_config,
            feedback: self.feedback,
            cwd,
            repo,
            intents: self.intents.clone(),
            session_id: self.session_id.clone(),
        })
    }
}

/// Builds a [`Context`] from CLI flags, wiring the capability stack.
///
/// `--dry-run` installs DryRun wrappers under a Printing layer; business
/// logic never sees a boolean. Capabilities can be overridden (tests
/// inject Fakes through the same wiring as production).
pub struct ContextBuilder {
    dry_run: bool,
    verbose: bool,
    script_mode: bool,
    cwd: Option<PathBuf>,
    config: Option<GlobalConfig>,
    git: Option<Arc<dyn Git>>,
    host: Option<Arc<dyn Host>>,
    stack: Option<Arc<dyn Stack>>,
    clock: Option<Arc<dyn Clock>>,
    executor: Option<Arc<dyn ClaudeExecutor>>,
    script_writer: Option<ScriptWriter>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            dry_run: false,
            verbose: false,
            script_mode: false,
            cwd: None,
            config: None,
            git: None,
            host: None,
            stack: None,
            clock: None,
            executor: None,
            script_writer: None,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn script_mode(mut self, script_mode: bool) -> Self {
        self.script_mode = script_mode;
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn config(mut self, config: GlobalConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn git(mut self, git: Arc<dyn Git>) -> Self {
        self.git = Some(git);
        self
    }

    pub fn host(mut self, host: Arc<dyn Host>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn stack(mut self, stack: Arc<dyn Stack>) -> Self {
        self.stack = Some(stack);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn executor(mut self, executor: Arc<dyn ClaudeExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn script_writer(mut self, writer: ScriptWriter) -> Self {
        self.script_writer = Some(writer);
        self
    }

    pub fn build(self) -> Result<Context, ErkError> {
        let config = match self.config {
            Some(config) => config,
            None => GlobalConfig::load()?,
        };

        let cwd = match self.cwd {
            Some(cwd) => cwd,
            None => std::env::current_dir().map_err(|e| ErkError::Internal {
                identifier: format!("cwd: {e}"),
            })?,
        };

        let mut git: Arc<dyn Git> = self.git.unwrap_or_else(|| Arc::new(RealGit));
        let mut host: Arc<dyn Host> = self.host.unwrap_or_else(|| Arc::new(GhHost));
        let mut stack: Option<Arc<dyn Stack>> = match self.stack {
            Some(stack) => Some(stack),
            None => config
                .use_stack_tool
                .then(|| Arc::new(GraphiteStack) as Arc<dyn Stack>),
        };

        // DryRun sits inside, Printing outside: traces show every call,
        // suppressed writes get the "(dry run)" marker.
        let intents = if self.dry_run {
            let intents = RecordedIntents::new();
            git = Arc::new(DryRunGit::new(git, intents.clone()));
            host = Arc::new(DryRunHost::new(host, intents.clone()));
            stack = stack.map(|s| Arc::new(DryRunStack::new(s, intents.clone())) as Arc<dyn Stack>);
            Some(intents)
        } else {
            None
        };

        if self.dry_run || self.verbose {
            git = Arc::new(PrintingGit::new(git, self.dry_run));
            host = Arc::new(PrintingHost::new(host, self.dry_run));
            stack = stack.map(|s| Arc::new(PrintingStack::new(s, self.dry_run)) as Arc<dyn Stack>);
        }

        let repo = RepoContext::discover(git.as_ref(), &cwd, &config)?;
        let (repo, repo_config) = match repo {
            Some((repo, repo_config)) => (Some(repo), repo_config),
            None => (None, RepoConfig::default()),
        };

        let session_id = std::env::var(crate::claude::SESSION_CONTEXT_VAR)
            .ok()
            .and_then(|v| parse_session_context(&v));

        Ok(Context {
            git,
            host,
            stack,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            executor: self
                .executor
                .unwrap_or_else(|| Arc::new(RealClaudeExecutor)),
            script_writer: self.script_writer.unwrap_or_default(),
            config,
            repo_config,
            feedback: if self.script_mode {
                Feedback::suppressing()
            } else {
                Feedback::new()
            },
            cwd,
            repo,
            intents,
            session_id,
        })
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claude::FakeClaudeExecutor;
    use crate::ops::{FakeClock, FakeGit, FakeHost};
    use chrono::TimeZone;

    fn fake_context(git: FakeGit) -> Context {
        let mut config = GlobalConfig::default();
        config.erks_root = PathBuf::from("/erks");
        ContextBuilder::new()
            .config(config)
            .cwd("/nowhere")
            .git(Arc::new(git))
            .host(Arc::new(FakeHost::builder().build()))
            .clock(Arc::new(FakeClock::new(
                chrono::Utc.with_ymd_and_hms(2025, 11, 26, 14, 30, 0).unwrap(),
            )))
            .executor(Arc::new(FakeClaudeExecutor::new(vec![])))
            .build()
            .unwrap()
    }

    #[test]
    fn outside_repo_has_no_repo_context() {
        let ctx = fake_context(FakeGit::builder().build());
        assert!(ctx.repo.is_none());
        assert!(matches!(ctx.repo(), Err(ErkError::NotInRepo)));
    }

    #[test]
    fn discover_resolves_trunk_from_default_branch() {
        // A real temp dir with a .git marker so discovery walks to it
        let dir = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir(root.join(".git")).unwrap();

        let git = FakeGit::builder()
            .root(&root)
            .default_branch("main")
            .build();
        let mut config = GlobalConfig::default();
        config.erks_root = PathBuf::from("/erks");

        let (repo, _) = RepoContext::discover(&git, &root, &config)
            .unwrap()
            .expect("repo discovered");
        assert_eq!(repo.root, root);
        assert_eq!(repo.trunk_branch.as_deref(), Some("main"));
        assert_eq!(
            repo.erks_dir,
            PathBuf::from("/erks").join(repo.repo_name.clone())
        );
    }

    #[test]
    fn trunk_errors_when_unresolvable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir(root.join(".git")).unwrap();

        let git = FakeGit::builder().root(&root).build();
        let mut config = GlobalConfig::default();
        config.erks_root = PathBuf::from("/erks");

        let ctx = ContextBuilder::new()
            .config(config)
            .cwd(&root)
            .git(Arc::new(git))
            .host(Arc::new(FakeHost::builder().build()))
            .executor(Arc::new(FakeClaudeExecutor::new(vec![])))
            .build()
            .unwrap();
        assert!(ctx.repo.is_some());
        assert!(matches!(ctx.trunk(), Err(ErkError::NoTrunk { .. })));
    }

    #[test]
    fn find_git_entry_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join(".git")).unwrap();
        let nested = root.join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_git_entry(&nested).unwrap(), root);
        assert_eq!(find_git_entry(root).unwrap(), root);
    }

    #[test]
    fn find_git_entry_none_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_git_entry(dir.path()), None);
    }
}
