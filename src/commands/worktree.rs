//! Worktree lifecycle commands: create, delete, rename, checkout, current.

use std::path::PathBuf;

use color_print::cformat;
use serde::Serialize;

use erk::activation::ActivationScript;
use erk::context::Context;
use erk::error::ErkError;
use erk::plan::PlanPipeline;
use erk::worktree::{CreateRequest, CreatedWorktree, WorktreeManager};

use super::emit_activation;

/// Derive a plan title from a markdown body, falling back to the file
/// stem.
fn title_of(body: &str, file: &std::path::Path) -> String {
    body.lines()
        .find_map(|line| line.strip_prefix("# ").map(|t| t.trim().to_string()))
        .unwrap_or_else(|| {
            file.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "work".to_string())
        })
}

pub fn handle_create(
    ctx: &Context,
    target: Option<String>,
    name: Option<String>,
    plan: Option<PathBuf>,
    issue: Option<u64>,
) -> anyhow::Result<()> {
    let created: CreatedWorktree = if let Some(number) = issue {
        // Plan-backed creation goes through the pipeline so the worktree
        // is seeded and linked back to the record.
        PlanPipeline::new(ctx).implement(number)?.worktree
    } else if let Some(path) = plan {
        let body = std::fs::read_to_string(&path).map_err(|e| ErkError::InvalidName {
            name: path.display().to_string(),
            reason: format!("could not read plan file: {e}"),
        })?;
        let title = title_of(&body, &path);
        WorktreeManager::new(ctx).create(CreateRequest {
            name,
            title: Some(title),
            plan_body: Some(body),
        })?
    } else {
        let name = name.or(target).ok_or_else(|| ErkError::InvalidName {
            name: String::new(),
            reason: "pass a worktree name, --plan, or --issue".to_string(),
        })?;
        WorktreeManager::new(ctx).create(CreateRequest {
            name: Some(name),
            title: None,
            plan_body: None,
        })?
    };

    ctx.feedback.success(cformat!(
        "Created worktree <bold>{}</> on branch <bold>{}</>",
        created.name,
        created.branch
    ));
    let script = ActivationScript::cd(&created.path).with_env(created.env.clone());
    emit_activation(ctx, script)?;
    Ok(())
}

pub fn handle_delete(ctx: &Context, name: &str, force_branch: bool) -> anyhow::Result<()> {
    let outcome = WorktreeManager::new(ctx).delete(name, force_branch)?;

    let what = if outcome.branch_deleted {
        "worktree and branch"
    } else {
        "worktree"
    };
    ctx.feedback
        .success(cformat!("Removed {what} <bold>{name}</>"));

    if let Some(anchor) = outcome.relocate_to {
        emit_activation(ctx, ActivationScript::cd(anchor))?;
    }
    Ok(())
}

pub fn handle_rename(ctx: &Context, old: &str, new: &str) -> anyhow::Result<()> {
    let renamed = WorktreeManager::new(ctx).rename(old, new)?;
    ctx.feedback.success(cformat!(
        "Renamed <bold>{old}</> to <bold>{new}</>"
    ));

    // Follow the move when the cwd lived inside the old directory
    if ctx.cwd.starts_with(ctx.repo()?.erks_dir.join(old)) {
        emit_activation(ctx, ActivationScript::cd(renamed.path))?;
    }
    Ok(())
}

pub fn handle_consolidate(
    ctx: &Context,
    target: &str,
    sources: &[String],
    force: bool,
) -> anyhow::Result<()> {
    let report = WorktreeManager::new(ctx).consolidate(sources, target, force)?;

    for name in &report.absorbed {
        ctx.feedback.success(cformat!(
            "Absorbed plan from <bold>{name}</> into <bold>{target}</>"
        ));
    }
    for (name, reason) in &report.failures {
        ctx.feedback.warning(format!("{name}: {reason}"));
    }

    if report
        .failures
        .iter()
        .any(|(_, reason)| reason == "destination exists")
    {
        ctx.feedback
            .hint("re-run with --force to overwrite conflicting consolidated plans");
    }
    if report.absorbed.is_empty() && !report.failures.is_empty() {
        anyhow::bail!("no worktrees were consolidated");
    }
    Ok(())
}

pub fn handle_checkout(ctx: &Context, name: &str) -> anyhow::Result<()> {
    let (worktree, env) = WorktreeManager::new(ctx).checkout(name)?;
    ctx.feedback.success(cformat!(
        "Switched to <bold>{name}</> at {}",
        worktree.path.display()
    ));
    emit_activation(ctx, ActivationScript::cd(worktree.path).with_env(env))?;
    Ok(())
}

/// Minimal identity of the current worktree; the JSON shape is part of
/// the CLI contract.
#[derive(Serialize)]
struct CurrentInfo {
    name: String,
    path: String,
    is_root: bool,
}

pub fn handle_current(ctx: &Context, json: bool) -> anyhow::Result<()> {
    let current = WorktreeManager::new(ctx)
        .current()?
        .ok_or(ErkError::NotInWorktree)?;

    let info = CurrentInfo {
        name: WorktreeManager::display_name(&current),
        path: current.path.display().to_string(),
        is_root: current.is_root,
    };

    if json {
        // Single JSON document on stdout, newline-terminated
        println!("{}", serde_json::to_string(&info)?);
    } else {
        println!("{}", info.name);
        ctx.feedback.info(cformat!("<dim>{}</>", info.path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_json_shape_is_stable() {
        let info = CurrentInfo {
            name: "root".into(),
            path: "/home/u/repo".into(),
            is_root: true,
        };
        assert_eq!(
            serde_json::to_string(&info).unwrap(),
            r#"{"name":"root","path":"/home/u/repo","is_root":true}"#
        );
    }

    #[test]
    fn title_falls_back_to_file_stem() {
        assert_eq!(
            title_of("# Big Plan\n\nbody", std::path::Path::new("x.md")),
            "Big Plan"
        );
        assert_eq!(
            title_of("no heading here", std::path::Path::new("plans/auth-flow.md")),
            "auth-flow"
        );
    }
}
