//! Parallel status collection.
//!
//! Independent collectors fan out against the live worktree, each on its
//! own thread, and report into a channel. The orchestrator joins them with
//! a global deadline; a collector that fails or blows the deadline
//! produces a per-collector failure note, never a failed status command.
//! Results arrive in any order — rendering imposes the fixed logical
//! order (worktree, plan, stack, pr, git, related).

pub mod collectors;
pub mod render;

use std::time::{Duration, Instant};

use crossbeam_channel as chan;
use serde::Serialize;

use crate::context::Context;
use crate::error::ErkError;
use crate::ops::WorktreeInfo;
use crate::worktree::WorktreeManager;

/// Default global deadline for one status collection.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorktreeSection {
    pub name: String,
    /// Absolute path as a string, matching the JSON schema
    pub path: String,
    pub branch: Option<String>,
    pub is_root: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GitSection {
    pub staged: Vec<String>,
    pub modified: Vec<String>,
    pub untracked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackSection {
    /// Trunk-first branch names
    pub branches: Vec<String>,
    /// Index of this worktree's branch in `branches`
    pub position: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrSection {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: String,
    pub checks_passing: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanSection {
    pub objective: Option<String>,
    pub completed_steps: u32,
    pub total_steps: u32,
    pub issue_number: Option<u64>,
    pub issue_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RelatedSection {
    /// Sibling worktree names sharing the stack (or all managed siblings
    /// when no stack tool is configured)
    pub worktrees: Vec<String>,
}

/// One collector's payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Git(GitSection),
    Stack(StackSection),
    Pr(Option<PrSection>),
    Plan(Option<PlanSection>),
    Related(RelatedSection),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectorFailure {
    pub collector: String,
    pub error: String,
}

/// Aggregated result: successes in their slots, failures as notes.
#[derive(Debug, Clone, Serialize)]
pub struct StatusData {
    pub worktree: WorktreeSection,
    pub plan: Option<PlanSection>,
    pub stack: Option<StackSection>,
    pub pr_status: Option<PrSection>,
    pub git_status: Option<GitSection>,
    pub related: Option<RelatedSection>,
    pub failures: Vec<CollectorFailure>,
}

// ============================================================================
// Framework
// ============================================================================

/// One independent status probe. Collectors own their inputs (cloned
/// capability handles and paths) and share no mutable state.
pub trait StatusCollector: Send + 'static {
    fn name(&self) -> &'static str;
    fn collect(&self) -> Result<Section, ErkError>;
}

/// Run all collectors concurrently and join them against `deadline`.
///
/// Every collector yields exactly one entry: its section on success, a
/// failure note on error, and a "timed out" note if the deadline expires
/// first. Completion order is not meaningful.
pub fn run_collectors(
    collectors: Vec<Box<dyn StatusCollector>>,
    deadline: Duration,
) -> (Vec<Section>, Vec<CollectorFailure>) {
    let expected = collectors.len();
    let (tx, rx) = chan::bounded(expected);

    let mut pending: Vec<&'static str> = Vec::with_capacity(expected);
    for collector in collectors {
        pending.push(collector.name());
        let tx = tx.clone();
        std::thread::spawn(move || {
            let outcome = collector.collect();
            // Receiver may be gone after a timeout; nothing to do then
            let _ = tx.send((collector.name(), outcome));
        });
    }
    drop(tx);

    let mut sections = Vec::new();
    let mut failures = Vec::new();
    let cutoff = Instant::now() + deadline;

    for _ in 0..expected {
        match rx.recv_deadline(cutoff) {
            Ok((name, Ok(section))) => {
                pending.retain(|&n| n != name);
                sections.push(section);
            }
            Ok((name, Err(err))) => {
                pending.retain(|&n| n != name);
                failures.push(CollectorFailure {
                    collector: name.to_string(),
                    error: err.summary(),
                });
            }
            Err(_) => break,
        }
    }

    for name in pending {
        failures.push(CollectorFailure {
            collector: name.to_string(),
            error: "timed out".to_string(),
        });
    }

    (sections, failures)
}

/// Collect the full status of one worktree.
pub fn gather(
    ctx: &Context,
    worktree: &WorktreeInfo,
    deadline: Duration,
) -> Result<StatusData, ErkError> {
    let repo = ctx.repo()?;

    let worktree_section = WorktreeSection {
        name: WorktreeManager::display_name(worktree),
        path: worktree.path.display().to_string(),
        branch: worktree.branch.clone(),
        is_root: worktree.is_root,
    };

    let mut list: Vec<Box<dyn StatusCollector>> = vec![
        Box::new(collectors::GitStatusCollector::new(
            ctx.git.clone(),
            worktree.path.clone(),
        )),
        Box::new(collectors::PlanFolderCollector::new(worktree.path.clone())),
        Box::new(collectors::RelatedWorktreesCollector::new(
            ctx.git.clone(),
            ctx.stack.clone(),
            repo.root.clone(),
            repo.erks_dir.clone(),
            worktree.path.clone(),
        )),
    ];
    if let Some(stack) = &ctx.stack {
        list.push(Box::new(collectors::StackCollector::new(
            stack.clone(),
            worktree.path.clone(),
            worktree.branch.clone(),
        )));
    }
    if ctx.config.show_pr_info && let Some(branch) = &worktree.branch {
        list.push(Box::new(collectors::PrCollector::new(
            ctx.host.clone(),
            ctx.clock.clone(),
            branch.clone(),
        )));
    }

    let (sections, failures) = run_collectors(list, deadline);

    let mut data = StatusData {
        worktree: worktree_section,
        plan: None,
        stack: None,
        pr_status: None,
        git_status: None,
        related: None,
        failures,
    };
    for section in sections {
        match section {
            Section::Git(git) => data.git_status = Some(git),
            Section::Stack(stack) => data.stack = Some(stack),
            Section::Pr(pr) => data.pr_status = pr,
            Section::Plan(plan) => data.plan = plan,
            Section::Related(related) => data.related = Some(related),
        }
    }
    if !ctx.config.show_pr_checks
        && let Some(pr) = &mut data.pr_status
    {
        pr.checks_passing = None;
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ok1;
    impl StatusCollector for Ok1 {
        fn name(&self) -> &'static str {
            "git"
        }
        fn collect(&self) -> Result<Section, ErkError> {
            Ok(Section::Git(GitSection::default()))
        }
    }

    struct Failing;
    impl StatusCollector for Failing {
        fn name(&self) -> &'static str {
            "pr"
        }
        fn collect(&self) -> Result<Section, ErkError> {
            Err(ErkError::Host {
                operation: "list pull requests".into(),
                details: "503".into(),
            })
        }
    }

    struct Stuck;
    impl StatusCollector for Stuck {
        fn name(&self) -> &'static str {
            "stack"
        }
        fn collect(&self) -> Result<Section, ErkError> {
            std::thread::sleep(Duration::from_secs(5));
            Ok(Section::Stack(StackSection {
                branches: vec![],
                position: None,
            }))
        }
    }

    #[test]
    fn failure_in_one_collector_never_blocks_others() {
        let (sections, failures) =
            run_collectors(vec![Box::new(Ok1), Box::new(Failing)], Duration::from_secs(5));
        assert_eq!(sections.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].collector, "pr");
        assert!(failures[0].error.contains("Host operation failed"));
    }

    #[test]
    fn deadline_converts_stuck_collectors_into_failures() {
        let (sections, failures) =
            run_collectors(vec![Box::new(Ok1), Box::new(Stuck)], Duration::from_millis(100));
        assert_eq!(sections.len(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].collector, "stack");
        assert_eq!(failures[0].error, "timed out");
    }

    #[test]
    fn empty_collector_set_is_fine() {
        let (sections, failures) = run_collectors(vec![], Duration::from_millis(10));
        assert!(sections.is_empty());
        assert!(failures.is_empty());
    }
}
