//! Status rendering: human text for stderr, strict JSON for stdout.
//!
//! Sections always appear in the fixed logical order — worktree, plan,
//! stack, pr, git, related — regardless of collector completion order.
//! In JSON, absent sections are `null` and paths are plain strings.

use color_print::cformat;

use super::StatusData;

/// Render the human-readable status block.
pub fn render_text(data: &StatusData) -> String {
    let mut out = String::new();

    let wt = &data.worktree;
    let branch = wt.branch.as_deref().unwrap_or("(detached)");
    out.push_str(&cformat!(
        "<bold>{}</> <dim>[{branch}]</> {}\n",
        wt.name,
        wt.path
    ));

    if let Some(plan) = &data.plan {
        let objective = plan.objective.as_deref().unwrap_or("(no objective)");
        out.push_str(&cformat!("  plan: {objective}"));
        if plan.total_steps > 0 {
            out.push_str(&cformat!(
                " <dim>({}/{} steps)</>",
                plan.completed_steps,
                plan.total_steps
            ));
        }
        if let Some(number) = plan.issue_number {
            out.push_str(&cformat!(" <dim>#{number}</>"));
        }
        out.push('\n');
    }

    if let Some(stack) = &data.stack {
        let rendered: Vec<String> = stack
            .branches
            .iter()
            .enumerate()
            .map(|(i, branch)| {
                if Some(i) == stack.position {
                    cformat!("<bold>{branch}</>")
                } else {
                    branch.clone()
                }
            })
            .collect();
        out.push_str(&format!("  stack: {}\n", rendered.join(" → ")));
    }

    if let Some(pr) = &data.pr_status {
        let checks = match pr.checks_passing {
            Some(true) => cformat!(" <green>checks ✓</>"),
            Some(false) => cformat!(" <red>checks ✗</>"),
            None => String::new(),
        };
        out.push_str(&cformat!(
            "  pr: #{} {} <dim>({})</>{checks}\n",
            pr.number,
            pr.url,
            pr.state.to_lowercase()
        ));
    }

    if let Some(git) = &data.git_status {
        if git.staged.is_empty() && git.modified.is_empty() && git.untracked.is_empty() {
            out.push_str(&cformat!("  git: <green>clean</>\n"));
        } else {
            out.push_str(&format!(
                "  git: {} staged, {} modified, {} untracked\n",
                git.staged.len(),
                git.modified.len(),
                git.untracked.len()
            ));
        }
    }

    if let Some(related) = &data.related
        && !related.worktrees.is_empty()
    {
        out.push_str(&format!("  related: {}\n", related.worktrees.join(", ")));
    }

    for failure in &data.failures {
        out.push_str(&cformat!(
            "  <yellow>({}: unavailable)</>\n",
            failure.collector
        ));
    }

    out
}

/// Render the strict JSON document for stdout.
pub fn render_json(data: &StatusData) -> serde_json::Value {
    serde_json::json!({
        "worktree": data.worktree,
        "plan": data.plan,
        "stack": data.stack,
        "pr_status": data.pr_status,
        "git_status": data.git_status,
        "related": data.related,
        "failures": data.failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{
        CollectorFailure, GitSection, PlanSection, PrSection, WorktreeSection,
    };

    fn base_data() -> StatusData {
        StatusData {
            worktree: WorktreeSection {
                name: "feat".into(),
                path: "/erks/repo/feat".into(),
                branch: Some("feat".into()),
                is_root: false,
            },
            plan: None,
            stack: None,
            pr_status: None,
            git_status: None,
            related: None,
            failures: vec![],
        }
    }

    #[test]
    fn json_has_null_for_absent_sections() {
        let json = render_json(&base_data());
        assert!(json["plan"].is_null());
        assert!(json["pr_status"].is_null());
        assert!(json["git_status"].is_null());
        assert_eq!(json["worktree"]["name"], "feat");
        // Paths are strings, not structured objects
        assert!(json["worktree"]["path"].is_string());
    }

    #[test]
    fn pr_failure_renders_warning_and_null() {
        let mut data = base_data();
        data.git_status = Some(GitSection::default());
        data.failures.push(CollectorFailure {
            collector: "pr".into(),
            error: "503".into(),
        });

        let text = render_text(&data);
        assert!(text.contains("(pr: unavailable)"));
        assert!(text.contains("git:"));

        let json = render_json(&data);
        assert!(json["pr_status"].is_null());
        assert_eq!(json["failures"][0]["collector"], "pr");
    }

    #[test]
    fn sections_render_in_fixed_order() {
        let mut data = base_data();
        data.plan = Some(PlanSection {
            objective: Some("Do the thing".into()),
            completed_steps: 1,
            total_steps: 3,
            issue_number: Some(12),
            issue_url: Some("https://github.com/o/r/issues/12".into()),
        });
        data.pr_status = Some(PrSection {
            number: 40,
            title: "t".into(),
            url: "https://github.com/o/r/pull/40".into(),
            state: "OPEN".into(),
            checks_passing: None,
        });
        data.git_status = Some(GitSection::default());

        let text = render_text(&data);
        let plan_at = text.find("plan:").unwrap();
        let pr_at = text.find("pr:").unwrap();
        let git_at = text.find("git:").unwrap();
        assert!(plan_at < pr_at && pr_at < git_at);
        assert!(text.contains("(1/3 steps)"));
    }
}
