//! Host-backed plan records.
//!
//! The host issue is the single source of truth for a plan: the body holds
//! the `plan-header` block, the first comment holds the `plan-body` block,
//! and further comments carry auxiliary context. The worktree's `.plan/`
//! folder is only a cache.

use chrono::{DateTime, Utc};

use crate::error::ErkError;
use crate::ops::{Host, Issue, IssueRef, IssueState};

use super::blocks::{
    self, PLAN_LABEL, PLAN_LABEL_COLOR, PLAN_LABEL_DESCRIPTION, PlanHeader,
};

/// A fully-loaded plan record.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanRecord {
    pub issue: Issue,
    pub header: PlanHeader,
    /// The user-visible plan markdown from the first `plan-body` comment
    pub body: String,
}

impl PlanRecord {
    pub fn is_open(&self) -> bool {
        self.issue.state == IssueState::Open
    }
}

pub struct PlanStore<'a> {
    host: &'a dyn Host,
}

impl<'a> PlanStore<'a> {
    pub fn new(host: &'a dyn Host) -> Self {
        Self { host }
    }

    /// Create a new plan record: ensure the label, create the issue with a
    /// fresh header, and post the plan body as the first comment.
    pub fn save(
        &self,
        title: &str,
        plan_body: &str,
        worktree_name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<IssueRef, ErkError> {
        self.host
            .ensure_label(PLAN_LABEL, PLAN_LABEL_COLOR, PLAN_LABEL_DESCRIPTION)?;

        let created_by = self.host.current_user()?;
        let header = PlanHeader::new(created_at, created_by, worktree_name);
        let body = blocks::render_header_block(&header)?;

        let issue = self.host.create_issue(title, &body, &[PLAN_LABEL])?;
        self.host
            .add_comment(issue.number, &blocks::render_body_block(plan_body))?;
        Ok(issue)
    }

    /// Load and validate a plan record.
    ///
    /// The issue must carry the `erk-plan` label; the header must parse;
    /// the first comment with a `plan-body` block is authoritative.
    pub fn load(&self, number: u64) -> Result<PlanRecord, ErkError> {
        let issue = self.host.get_issue(number)?;
        if !issue.labels.iter().any(|l| l == PLAN_LABEL) {
            return Err(ErkError::NotAPlan { number });
        }
        let header = blocks::parse_header_block(&issue.body)?;

        let comments = self.host.list_comments(number)?;
        let body = comments
            .iter()
            .find_map(|c| blocks::extract_body_block(&c.body))
            .ok_or_else(|| ErkError::MetadataBlock {
                block: blocks::BODY_BLOCK.to_string(),
                details: format!("issue #{number} has no plan-body comment"),
            })?;

        Ok(PlanRecord {
            issue,
            header,
            body,
        })
    }

    /// Load a record and require it to be OPEN.
    pub fn load_open(&self, number: u64) -> Result<PlanRecord, ErkError> {
        let record = self.load(number)?;
        if !record.is_open() {
            return Err(ErkError::PlanClosed { number });
        }
        Ok(record)
    }

    /// Rewrite the issue body with an updated header (the body contains
    /// nothing but the header block, so replacing it wholesale is exact).
    pub fn update_header(&self, number: u64, header: &PlanHeader) -> Result<(), ErkError> {
        let body = blocks::render_header_block(header)?;
        self.host.update_issue_body(number, &body)
    }

    /// Record a workflow dispatch in the header.
    pub fn mark_dispatched(
        &self,
        record: &PlanRecord,
        run_id: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), ErkError> {
        let mut header = record.header.clone();
        header.last_dispatched_run_id = run_id;
        header.last_dispatched_at = Some(at);
        self.update_header(record.issue.number, &header)
    }
}
