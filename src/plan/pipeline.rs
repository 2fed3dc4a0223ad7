//! End-to-end plan flows: save, enrich, clone, implement, submit, and
//! remote dispatch. Composes the plan store, the worktree manager, and the
//! assistant executor; every step works through the capability handles in
//! the per-invocation context.

use serde::Deserialize;

use crate::claude::{self, CommandResult, ExecOptions};
use crate::context::Context;
use crate::error::ErkError;
use crate::ops::{Clock, Host, IssueRef, WorkflowRun};
use crate::worktree::{
    CreateRequest, CreatedWorktree, MAX_NAME_LEN, WorktreeManager, sanitize_worktree_name,
};

use super::folder::{IssueLink, PlanFolder};
use super::store::{PlanRecord, PlanStore};

/// Slash-commands driven through the assistant.
pub const ENRICH_COMMAND: &str = "/erk:enrich-plan";
pub const IMPLEMENT_COMMAND: &str = "/erk:implement";
pub const FAST_CI_COMMAND: &str = "/erk:fast-ci";
pub const SUBMIT_PR_COMMAND: &str = "/erk:submit-pr";

/// Workflow dispatched for remote implementation.
pub const IMPLEMENT_WORKFLOW: &str = "erk-implement.yml";

/// Structured result of the enrichment subagent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnrichedPlan {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub context_categories: Vec<String>,
}

#[derive(Debug)]
pub struct CloneOutcome {
    pub source: u64,
    pub new_issue: IssueRef,
    pub worktree_name: String,
    pub closed_pr: Option<u64>,
}

#[derive(Debug)]
pub struct ImplementOutcome {
    pub record: PlanRecord,
    pub worktree: CreatedWorktree,
}

pub struct PlanPipeline<'a> {
    ctx: &'a Context,
}

impl<'a> PlanPipeline<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    fn store(&self) -> PlanStore<'_> {
        PlanStore::new(self.ctx.host.as_ref())
    }

    fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            dangerous: false,
            verbose: false,
            session_id: self.ctx.session_id.clone(),
        }
    }

    /// Save a plan as a new host record.
    pub fn save(&self, title: &str, body: &str) -> Result<IssueRef, ErkError> {
        let worktree_name = sanitize_worktree_name(title);
        self.store()
            .save(title, body, &worktree_name, self.ctx.clock.now_utc())
    }

    /// Delegate enrichment to the external subagent and parse its strict
    /// JSON result (`{title, body, context_categories}`).
    pub fn enrich(&self, plan_text: &str) -> Result<EnrichedPlan, ErkError> {
        let worktree = self
            .ctx
            .repo
            .as_ref()
            .map(|r| r.root.clone())
            .unwrap_or_else(|| self.ctx.cwd.clone());
        let command = format!("{ENRICH_COMMAND} {plan_text}");
        let result = claude::execute_command(
            self.ctx.executor.as_ref(),
            self.ctx.clock.as_ref(),
            &command,
            &worktree,
            &self.exec_options(),
        )?;
        if !result.success {
            return Err(ErkError::CommandFailed {
                command: ENRICH_COMMAND.to_string(),
                exit_code: None,
                stderr: result.error_message.unwrap_or_default(),
            });
        }
        parse_enriched(&result.filtered_messages).ok_or_else(|| ErkError::MetadataBlock {
            block: "enriched-plan".to_string(),
            details: "enrichment subagent returned no parsable JSON result".to_string(),
        })
    }

    /// Enrich a plan and save the result as a new record, attaching the
    /// planning context as an auxiliary comment.
    pub fn save_enriched(&self, plan_text: &str) -> Result<IssueRef, ErkError> {
        let enriched = self.enrich(plan_text)?;
        let issue = self.save(&enriched.title, &enriched.body)?;
        if !enriched.context_categories.is_empty() {
            let context = format!(
                "planning context: {}",
                enriched.context_categories.join(", ")
            );
            self.ctx.host.add_comment(issue.number, &context)?;
        }
        Ok(issue)
    }

    /// Clone an open plan into a fresh record with a timestamped worktree
    /// name, closing the original (and any open PR on its branch).
    pub fn clone_plan(&self, number: u64) -> Result<CloneOutcome, ErkError> {
        let store = self.store();
        let record = store.load_open(number)?;

        let worktree_name = timestamped_name(&record.issue.title, self.ctx.clock.as_ref());
        let new_issue = store.save(
            &record.issue.title,
            &record.body,
            &worktree_name,
            self.ctx.clock.now_utc(),
        )?;

        // An open PR on the branch derived from the original title is
        // superseded by the clone.
        let original_branch = sanitize_worktree_name(&record.issue.title);
        let mut closed_pr = None;
        if let Some(pr) = self.ctx.host.pr_for_branch(&original_branch)? {
            self.ctx.host.close_pr(
                pr.number,
                Some(&format!("Superseded by {}", new_issue.url)),
            )?;
            closed_pr = Some(pr.number);
        }

        self.ctx.host.close_issue(
            number,
            Some(&format!("Cloned to {}", new_issue.url)),
        )?;

        Ok(CloneOutcome {
            source: number,
            new_issue,
            worktree_name,
        closed_pr,
        })
    }

    /// Create the implementation worktree for an open plan, seeded with
    /// the plan body and linked back to the issue.
    pub fn implement(&self, number: u64) -> Result<ImplementOutcome, ErkError> {
        let record = self.store().load_open(number)?;
        let manager = WorktreeManager::new(self.ctx);
        let worktree = manager.create(CreateRequest {
            name: Some(record.header.worktree_name.clone()),
            title: None,
            plan_body: Some(record.body.clone()),
        })?;

        if let Some(folder) = PlanFolder::discover(&worktree.path) {
            folder.write_issue_link(&IssueLink {
                issue_number: record.issue.number,
                issue_url: record.issue.url.clone(),
            })?;
        }

        self.ctx.host.add_comment(
            number,
            &format!("worktree creation: `{}`", worktree.name),
        )?;

        Ok(ImplementOutcome { record, worktree })
    }

    /// Drive the fixed implement → fast-ci → submit-pr sequence in the
    /// plan's worktree, stopping at the first failure.
    pub fn submit(&self, number: u64) -> Result<Vec<CommandResult>, ErkError> {
        let record = self.store().load_open(number)?;
        let manager = WorktreeManager::new(self.ctx);
        let worktree = manager.find(&record.header.worktree_name)?;

        claude::execute_commands(
            self.ctx.executor.as_ref(),
            self.ctx.clock.as_ref(),
            &[IMPLEMENT_COMMAND, FAST_CI_COMMAND, SUBMIT_PR_COMMAND],
            &worktree.path,
            &self.exec_options(),
        )
    }

    /// Dispatch remote implementation for an open plan and record the run
    /// in the header.
    pub fn dispatch(&self, number: u64) -> Result<Option<WorkflowRun>, ErkError> {
        let store = self.store();
        let record = store.load_open(number)?;

        self.ctx.host.dispatch_workflow(
            IMPLEMENT_WORKFLOW,
            &[("issue_number", number.to_string())],
        )?;

        let run = self.ctx.host.latest_run_for_workflow(IMPLEMENT_WORKFLOW)?;
        store.mark_dispatched(
            &record,
            run.as_ref().map(|r| r.id.to_string()),
            self.ctx.clock.now_utc(),
        )?;
        Ok(run)
    }
}

/// `sanitize(title)` plus a `-YYMMDD-HHMM` suffix, truncated so the whole
/// name stays within the 31-character limit.
fn timestamped_name(title: &str, clock: &dyn crate::ops::Clock) -> String {
    let suffix = clock.now_utc().format("%y%m%d-%H%M").to_string();
    let mut base = sanitize_worktree_name(title);
    let max_base = MAX_NAME_LEN - suffix.len() - 1;
    if base.len() > max_base {
        base.truncate(max_base);
        base = base.trim_end_matches('-').to_string();
    }
    format!("{base}-{suffix}")
}

/// The subagent's JSON may arrive as a bare object or inside a ```json
/// fence; the last parsable message wins.
fn parse_enriched(messages: &[String]) -> Option<EnrichedPlan> {
    messages.iter().rev().find_map(|message| {
        let trimmed = message.trim();
        let candidate = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|s| s.strip_suffix("```"))
            .map(str::trim)
            .unwrap_or(trimmed);
        serde_json::from_str(candidate).ok()
    })
}
