//! Host capability: the issue/PR service with labels, comments, and
//! workflow dispatch.
//!
//! The real implementation shells out to the host CLI (`gh`), which also
//! owns authentication — erk never sees or stores tokens.

use std::process::Command;

use serde::Deserialize;

use crate::error::ErkError;

use super::runner;

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct IssueRef {
    pub number: u64,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueState {
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub state: IssueState,
    pub labels: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueComment {
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub url: String,
    pub state: String,
    /// None when checks are still pending or there are none
    pub checks_passing: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    pub id: u64,
    pub url: String,
    pub status: String,
}

pub trait Host: Send + Sync {
    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[&str],
    ) -> Result<IssueRef, ErkError>;
    fn get_issue(&self, number: u64) -> Result<Issue, ErkError>;
    fn update_issue_body(&self, number: u64, body: &str) -> Result<(), ErkError>;
    fn close_issue(&self, number: u64, comment: Option<&str>) -> Result<(), ErkError>;
    fn add_comment(&self, number: u64, body: &str) -> Result<(), ErkError>;
    fn list_comments(&self, number: u64) -> Result<Vec<IssueComment>, ErkError>;
    fn ensure_label(&self, name: &str, color: &str, description: &str) -> Result<(), ErkError>;
    fn pr_for_branch(&self, branch: &str) -> Result<Option<PullRequest>, ErkError>;
    fn close_pr(&self, number: u64, comment: Option<&str>) -> Result<(), ErkError>;
    fn dispatch_workflow(
        &self,
        workflow: &str,
        inputs: &[(&str, String)],
    ) -> Result<(), ErkError>;
    fn latest_run_for_workflow(&self, workflow: &str) -> Result<Option<WorkflowRun>, ErkError>;

    /// Login of the authenticated user, for `created_by` headers.
    fn current_user(&self) -> Result<String, ErkError>;
}

// ============================================================================
// gh-backed implementation
// ============================================================================

#[derive(Deserialize)]
struct GhLabel {
    name: String,
}

#[derive(Deserialize)]
struct GhIssue {
    number: u64,
    title: String,
    body: Option<String>,
    state: IssueState,
    labels: Vec<GhLabel>,
    url: String,
}

#[derive(Deserialize)]
struct GhComment {
    body: String,
}

#[derive(Deserialize)]
struct GhComments {
    comments: Vec<GhComment>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhCheck {
    #[serde(default)]
    conclusion: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPullRequest {
    number: u64,
    title: String,
    url: String,
    state: String,
    #[serde(default)]
    status_check_rollup: Vec<GhCheck>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhRun {
    database_id: u64,
    url: String,
    status: String,
}

pub struct GhHost;

impl GhHost {
    fn gh() -> Command {
        Command::new("gh")
    }

    fn host_err(operation: &str, err: ErkError) -> ErkError {
        match err {
            // Keep ToolMissing as an environment error; everything else
            // from the host CLI is a remote failure.
            ErkError::ToolMissing { tool } => ErkError::ToolMissing { tool },
            other => ErkError::Host {
                operation: operation.to_string(),
                details: other.summary(),
            },
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(operation: &str, json: &str) -> Result<T, ErkError> {
        serde_json::from_str(json).map_err(|e| ErkError::Host {
            operation: operation.to_string(),
            details: format!("unexpected JSON from gh: {e}"),
        })
    }
}

impl Host for GhHost {
    fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[&str],
    ) -> Result<IssueRef, ErkError> {
        let mut cmd = Self::gh();
        cmd.args(["issue", "create", "--title", title, "--body", body]);
        for label in labels {
            cmd.arg("--label").arg(label);
        }
        let url = runner::run_stdout(&mut cmd, None)
            .map_err(|e| Self::host_err("create issue", e))?;
        // gh prints the new issue URL; the number is the last path segment
        let number = url
            .rsplit('/')
            .next()
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| ErkError::Host {
                operation: "create issue".into(),
                details: format!("could not parse issue number from '{url}'"),
            })?;
        Ok(IssueRef { number, url })
    }

    fn get_issue(&self, number: u64) -> Result<Issue, ErkError> {
        let mut cmd = Self::gh();
        cmd.args(["issue", "view"])
            .arg(number.to_string())
            .args(["--json", "number,title,body,state,labels,url"]);
        let json = match runner::run_stdout(&mut cmd, None) {
            Ok(json) => json,
            Err(ErkError::CommandFailed { stderr, .. })
                if stderr.contains("Could not resolve") || stderr.contains("not found") =>
            {
                return Err(ErkError::IssueNotFound { number });
            }
            Err(e) => return Err(Self::host_err("view issue", e)),
        };
        let raw: GhIssue = Self::parse("view issue", &json)?;
        Ok(Issue {
            number: raw.number,
            title: raw.title,
            body: raw.body.unwrap_or_default(),
            state: raw.state,
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            url: raw.url,
        })
    }

    fn update_issue_body(&self, number: u64, body: &str) -> Result<(), ErkError> {
        let mut cmd = Self::gh();
        cmd.args(["issue", "edit"])
            .arg(number.to_string())
            .args(["--body", body]);
        runner::run_checked(&mut cmd, None)
            .map(|_| ())
            .map_err(|e| Self::host_err("edit issue", e))
    }

    fn close_issue(&self, number: u64, comment: Option<&str>) -> Result<(), ErkError> {
        let mut cmd = Self::gh();
        cmd.args(["issue", "close"]).arg(number.to_string());
        if let Some(comment) = comment {
            cmd.args(["--comment", comment]);
        }
        runner::run_checked(&mut cmd, None)
            .map(|_| ())
            .map_err(|e| Self::host_err("close issue", e))
    }

    fn add_comment(&self, number: u64, body: &str) -> Result<(), ErkError> {
        let mut cmd = Self::gh();
        cmd.args(["issue", "comment"])
            .arg(number.to_string())
            .args(["--body", body]);
        runner::run_checked(&mut cmd, None)
            .map(|_| ())
            .map_err(|e| Self::host_err("comment on issue", e))
    }

    fn list_comments(&self, number: u64) -> Result<Vec<IssueComment>, ErkError> {
        let mut cmd = Self::gh();
        cmd.args(["issue", "view"])
            .arg(number.to_string())
            .args(["--json", "comments"]);
        let json = runner::run_stdout(&mut cmd, None)
            .map_err(|e| Self::host_err("list comments", e))?;
        let raw: GhComments = Self::parse("list comments", &json)?;
        Ok(raw
            .comments
            .into_iter()
            .map(|c| IssueComment { body: c.body })
            .collect())
    }

    fn ensure_label(&self, name: &str, color: &str, description: &str) -> Result<(), ErkError> {
        let mut cmd = Self::gh();
        // --force makes this idempotent: existing labels are updated in place
        cmd.args([
            "label",
            "create",
            name,
            "--color",
            color,
            "--description",
            description,
            "--force",
        ]);
        runner::run_checked(&mut cmd, None)
            .map(|_| ())
            .map_err(|e| Self::host_err("ensure label", e))
    }

    fn pr_for_branch(&self, branch: &str) -> Result<Option<PullRequest>, ErkError> {
        let mut cmd = Self::gh();
        cmd.args([
            "pr",
            "list",
            "--head",
            branch,
            "--state",
            "open",
            "--json",
            "number,title,url,state,statusCheckRollup",
        ]);
        let json = runner::run_stdout(&mut cmd, None)
            .map_err(|e| Self::host_err("list pull requests", e))?;
        let prs: Vec<GhPullRequest> = Self::parse("list pull requests", &json)?;
        Ok(prs.into_iter().next().map(|pr| {
            let checks_passing = if pr.status_check_rollup.is_empty() {
                None
            } else if pr
                .status_check_rollup
                .iter()
                .any(|c| c.conclusion.is_none())
            {
                None
            } else {
                Some(
                    pr.status_check_rollup
                        .iter()
                        .all(|c| matches!(c.conclusion.as_deref(), Some("SUCCESS" | "NEUTRAL" | "SKIPPED"))),
                )
            };
            PullRequest {
                number: pr.number,
                title: pr.title,
                url: pr.url,
                state: pr.state,
                checks_passing,
            }
        }))
    }

    fn close_pr(&self, number: u64, comment: Option<&str>) -> Result<(), ErkError> {
        let mut cmd = Self::gh();
        cmd.args(["pr", "close"]).arg(number.to_string());
        if let Some(comment) = comment {
            cmd.args(["--comment", comment]);
        }
        runner::run_checked(&mut cmd, None)
            .map(|_| ())
            .map_err(|e| Self::host_err("close pull request", e))
    }

    fn dispatch_workflow(
        &self,
        workflow: &str,
        inputs: &[(&str, String)],
    ) -> Result<(), ErkError> {
        let mut cmd = Self::gh();
        cmd.args(["workflow", "run", workflow]);
        for (key, value) in inputs {
            cmd.arg("-f").arg(format!("{key}={value}"));
        }
        runner::run_checked(&mut cmd, None)
            .map(|_| ())
            .map_err(|e| Self::host_err("dispatch workflow", e))
    }

    fn latest_run_for_workflow(&self, workflow: &str) -> Result<Option<WorkflowRun>, ErkError> {
        let mut cmd = Self::gh();
        cmd.args([
            "run",
            "list",
            "--workflow",
            workflow,
            "--limit",
            "1",
            "--json",
            "databaseId,url,status",
        ]);
        let json = runner::run_stdout(&mut cmd, None)
            .map_err(|e| Self::host_err("list workflow runs", e))?;
        let runs: Vec<GhRun> = Self::parse("list workflow runs", &json)?;
        Ok(runs.into_iter().next().map(|r| WorkflowRun {
            id: r.database_id,
            url: r.url,
            status: r.status,
        }))
    }

    fn current_user(&self) -> Result<String, ErkError> {
        let mut cmd = Self::gh();
        cmd.args(["api", "user", "--jq", ".login"]);
        runner::run_stdout(&mut cmd, None).map_err(|e| Self::host_err("get current user", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_state_parses_gh_casing() {
        let state: IssueState = serde_json::from_str("\"OPEN\"").unwrap();
        assert_eq!(state, IssueState::Open);
        let state: IssueState = serde_json::from_str("\"CLOSED\"").unwrap();
        assert_eq!(state, IssueState::Closed);
    }

    #[test]
    fn pr_json_parses_check_rollup() {
        let json = r#"[{"number":42,"title":"Add parser","url":"https://github.com/o/r/pull/42","state":"OPEN","statusCheckRollup":[{"conclusion":"SUCCESS"},{"conclusion":"SKIPPED"}]}]"#;
        let prs: Vec<GhPullRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].status_check_rollup.len(), 2);
    }

    #[test]
    fn issue_json_tolerates_null_body() {
        let json = r#"{"number":7,"title":"t","body":null,"state":"OPEN","labels":[{"name":"erk-plan"}],"url":"https://github.com/o/r/issues/7"}"#;
        let issue: GhIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.body, None);
        assert_eq!(issue.labels[0].name, "erk-plan");
    }
}
