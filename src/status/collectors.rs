//! The individual status collectors.
//!
//! Each collector owns clones of the capability handles it needs and the
//! paths it probes; nothing is shared mutably across the fan-out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ErkError;
use crate::ops::{Clock, Git, Host, Stack, retry_with_backoff};
use crate::plan::PlanFolder;
use crate::worktree::WorktreeManager;

use super::{
    GitSection, PlanSection, PrSection, RelatedSection, Section, StackSection, StatusCollector,
};

// ============================================================================
// Git
// ============================================================================

pub struct GitStatusCollector {
    git: Arc<dyn Git>,
    worktree: PathBuf,
}

impl GitStatusCollector {
    pub fn new(git: Arc<dyn Git>, worktree: PathBuf) -> Self {
        Self { git, worktree }
    }
}

impl StatusCollector for GitStatusCollector {
    fn name(&self) -> &'static str {
        "git"
    }

    fn collect(&self) -> Result<Section, ErkError> {
        let status = self.git.file_status(&self.worktree)?;
        Ok(Section::Git(GitSection {
            staged: status.staged,
            modified: status.modified,
            untracked: status.untracked,
        }))
    }
}

// ============================================================================
// Stack
// ============================================================================

pub struct StackCollector {
    stack: Arc<dyn Stack>,
    worktree: PathBuf,
    branch: Option<String>,
}

impl StackCollector {
    pub fn new(stack: Arc<dyn Stack>, worktree: PathBuf, branch: Option<String>) -> Self {
        Self {
            stack,
            worktree,
            branch,
        }
    }
}

impl StatusCollector for StackCollector {
    fn name(&self) -> &'static str {
        "stack"
    }

    fn collect(&self) -> Result<Section, ErkError> {
        let branches = self.stack.current_stack(&self.worktree)?;
        let position = self
            .branch
            .as_ref()
            .and_then(|b| branches.iter().position(|candidate| candidate == b));
        Ok(Section::Stack(StackSection { branches, position }))
    }
}

// ============================================================================
// PR
// ============================================================================

pub struct PrCollector {
    host: Arc<dyn Host>,
    clock: Arc<dyn Clock>,
    branch: String,
}

impl PrCollector {
    pub fn new(host: Arc<dyn Host>, clock: Arc<dyn Clock>, branch: String) -> Self {
        Self {
            host,
            clock,
            branch,
        }
    }
}

impl StatusCollector for PrCollector {
    fn name(&self) -> &'static str {
        "pr"
    }

    fn collect(&self) -> Result<Section, ErkError> {
        // The host hiccups more than git does; transient failures get a
        // short clock-driven backoff before the collector gives up.
        let pr = retry_with_backoff(
            self.clock.as_ref(),
            3,
            Duration::from_millis(500),
            || self.host.pr_for_branch(&self.branch),
        )?;
        Ok(Section::Pr(pr.map(|pr| PrSection {
            number: pr.number,
            title: pr.title,
            url: pr.url,
            state: pr.state,
            checks_passing: pr.checks_passing,
        })))
    }
}

// ============================================================================
// Plan folder
// ============================================================================

pub struct PlanFolderCollector {
    worktree: PathBuf,
}

impl PlanFolderCollector {
    pub fn new(worktree: PathBuf) -> Self {
        Self { worktree }
    }
}

impl StatusCollector for PlanFolderCollector {
    fn name(&self) -> &'static str {
        "plan"
    }

    fn collect(&self) -> Result<Section, ErkError> {
        let Some(folder) = PlanFolder::discover(&self.worktree) else {
            return Ok(Section::Plan(None));
        };
        let progress = folder.progress().unwrap_or(crate::plan::Progress {
            completed_steps: 0,
            total_steps: 0,
        });
        let link = folder.issue_link();
        Ok(Section::Plan(Some(PlanSection {
            objective: folder.objective(),
            completed_steps: progress.completed_steps,
            total_steps: progress.total_steps,
            issue_number: link.as_ref().map(|l| l.issue_number),
            issue_url: link.map(|l| l.issue_url),
        })))
    }
}

// ============================================================================
// Related worktrees
// ============================================================================

pub struct RelatedWorktreesCollector {
    git: Arc<dyn Git>,
    stack: Option<Arc<dyn Stack>>,
    root: PathBuf,
    erks_dir: PathBuf,
    worktree: PathBuf,
}

impl RelatedWorktreesCollector {
    pub fn new(
        git: Arc<dyn Git>,
        stack: Option<Arc<dyn Stack>>,
        root: PathBuf,
        erks_dir: PathBuf,
        worktree: PathBuf,
    ) -> Self {
        Self {
            git,
            stack,
            root,
            erks_dir,
            worktree,
        }
    }
}

impl StatusCollector for RelatedWorktreesCollector {
    fn name(&self) -> &'static str {
        "related"
    }

    fn collect(&self) -> Result<Section, ErkError> {
        let siblings: Vec<_> = self
            .git
            .list_worktrees(&self.root)?
            .into_iter()
            .filter(|wt| wt.path != self.worktree && wt.path.starts_with(&self.erks_dir))
            .collect();

        // With a stack tool, related means "shares the stack"; without
        // one, every managed sibling is related.
        let stack_branches = match &self.stack {
            Some(stack) => Some(stack.current_stack(&self.worktree)?),
            None => None,
        };

        let worktrees = siblings
            .into_iter()
            .filter(|wt| match (&stack_branches, &wt.branch) {
                (Some(branches), Some(branch)) => branches.contains(branch),
                (Some(_), None) => false,
                (None, _) => true,
            })
            .map(|wt| WorktreeManager::display_name(&wt))
            .collect();

        Ok(Section::Related(RelatedSection { worktrees }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{FakeClock, FakeGit, FakeHost, FakeStack, FileStatus, PullRequest};
    use chrono::TimeZone;

    fn clock() -> Arc<FakeClock> {
        Arc::new(FakeClock::new(
            chrono::Utc.with_ymd_and_hms(2025, 11, 26, 14, 30, 0).unwrap(),
        ))
    }

    #[test]
    fn git_collector_reports_file_status() {
        let git = FakeGit::builder()
            .root("/repo")
            .worktree("/repo", "main")
            .status(
                PathBuf::from("/repo"),
                FileStatus {
                    staged: vec!["a.rs".into()],
                    modified: vec![],
                    untracked: vec!["b.rs".into()],
                },
            )
            .build();
        let collector = GitStatusCollector::new(Arc::new(git), PathBuf::from("/repo"));
        let Section::Git(section) = collector.collect().unwrap() else {
            panic!("wrong section");
        };
        assert_eq!(section.staged, vec!["a.rs"]);
        assert_eq!(section.untracked, vec!["b.rs"]);
    }

    #[test]
    fn stack_collector_locates_position() {
        let stack = FakeStack::new(vec!["main".into(), "feat-a".into(), "feat-b".into()]);
        let collector = StackCollector::new(
            Arc::new(stack),
            PathBuf::from("/repo"),
            Some("feat-b".into()),
        );
        let Section::Stack(section) = collector.collect().unwrap() else {
            panic!("wrong section");
        };
        assert_eq!(section.position, Some(2));
    }

    #[test]
    fn pr_collector_maps_pull_request() {
        let host = FakeHost::builder()
            .pr(
                "feat",
                PullRequest {
                    number: 9,
                    title: "Feat".into(),
                    url: "https://github.com/o/r/pull/9".into(),
                    state: "OPEN".into(),
                    checks_passing: Some(true),
                },
            )
            .build();
        let collector = PrCollector::new(Arc::new(host), clock(), "feat".into());
        let Section::Pr(Some(section)) = collector.collect().unwrap() else {
            panic!("expected pr");
        };
        assert_eq!(section.number, 9);
        assert_eq!(section.checks_passing, Some(true));
    }

    #[test]
    fn pr_collector_none_without_pr() {
        let host = FakeHost::builder().build();
        let collector = PrCollector::new(Arc::new(host), clock(), "feat".into());
        assert_eq!(collector.collect().unwrap(), Section::Pr(None));
    }

    #[test]
    fn plan_collector_reads_folder() {
        let tmp = tempfile::tempdir().unwrap();
        PlanFolder::create(tmp.path(), "# Objective here\n\n- [ ] a\n- [ ] b").unwrap();
        let collector = PlanFolderCollector::new(tmp.path().to_path_buf());
        let Section::Plan(Some(section)) = collector.collect().unwrap() else {
            panic!("expected plan");
        };
        assert_eq!(section.objective.as_deref(), Some("Objective here"));
        assert_eq!(section.total_steps, 2);
        assert_eq!(section.issue_number, None);
    }

    #[test]
    fn plan_collector_none_without_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let collector = PlanFolderCollector::new(tmp.path().to_path_buf());
        assert_eq!(collector.collect().unwrap(), Section::Plan(None));
    }

    #[test]
    fn related_collector_filters_by_stack() {
        let git = FakeGit::builder()
            .root("/repo")
            .worktree("/repo", "main")
            .worktree("/erks/repo/feat-a", "feat-a")
            .worktree("/erks/repo/feat-b", "feat-b")
            .worktree("/erks/repo/other", "other")
            .build();
        let stack = FakeStack::new(vec!["main".into(), "feat-a".into(), "feat-b".into()]);
        let collector = RelatedWorktreesCollector::new(
            Arc::new(git),
            Some(Arc::new(stack)),
            PathBuf::from("/repo"),
            PathBuf::from("/erks/repo"),
            PathBuf::from("/erks/repo/feat-a"),
        );
        let Section::Related(section) = collector.collect().unwrap() else {
            panic!("wrong section");
        };
        assert_eq!(section.worktrees, vec!["feat-b"]);
    }

    #[test]
    fn related_collector_lists_all_without_stack() {
        let git = FakeGit::builder()
            .root("/repo")
            .worktree("/repo", "main")
            .worktree("/erks/repo/feat-a", "feat-a")
            .worktree("/erks/repo/feat-b", "feat-b")
            .build();
        let collector = RelatedWorktreesCollector::new(
            Arc::new(git),
            None,
            PathBuf::from("/repo"),
            PathBuf::from("/erks/repo"),
            PathBuf::from("/erks/repo/feat-a"),
        );
        let Section::Related(section) = collector.collect().unwrap() else {
            panic!("wrong section");
        };
        assert_eq!(section.worktrees, vec!["feat-b"]);
    }
}
