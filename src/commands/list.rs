//! The `list` command: one row per managed worktree, collected in
//! parallel.

use rayon::prelude::*;
use serde::Serialize;

use erk::context::Context;
use erk::ops::Git;
use erk::plan::PlanFolder;
use erk::worktree::WorktreeManager;

use crate::cli::OutputFormat;

#[derive(Debug, Serialize)]
struct ListRow {
    name: String,
    path: String,
    branch: Option<String>,
    is_root: bool,
    dirty: Option<bool>,
    plan_objective: Option<String>,
    completed_steps: Option<u32>,
    total_steps: Option<u32>,
}

pub fn handle_list(ctx: &Context, format: OutputFormat) -> anyhow::Result<()> {
    let manager = WorktreeManager::new(ctx);
    let worktrees = manager.list()?;

    // Per-worktree probes are independent; fan them out across the pool.
    let mut rows: Vec<ListRow> = worktrees
        .par_iter()
        .map(|wt| {
            let dirty = ctx
                .git
                .file_status(&wt.path)
                .ok()
                .map(|status| !status.is_clean());
            let folder = PlanFolder::discover(&wt.path);
            let progress = folder.as_ref().and_then(|f| f.progress().ok());
            ListRow {
                name: WorktreeManager::display_name(wt),
                path: wt.path.display().to_string(),
                branch: wt.branch.clone(),
                is_root: wt.is_root,
                dirty,
                plan_objective: folder.as_ref().and_then(|f| f.objective()),
                completed_steps: progress.map(|p| p.completed_steps),
                total_steps: progress.map(|p| p.total_steps),
            }
        })
        .collect();

    // Root first, then by name
    rows.sort_by(|a, b| b.is_root.cmp(&a.is_root).then(a.name.cmp(&b.name)));

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(&rows)?);
        }
        OutputFormat::Text => {
            let name_width = rows.iter().map(|r| r.name.len()).max().unwrap_or(0);
            for row in &rows {
                let dirty = match row.dirty {
                    Some(true) => "*",
                    _ => " ",
                };
                let branch = row.branch.as_deref().unwrap_or("(detached)");
                let mut line = format!("{:<name_width$}{dirty} {branch}", row.name);
                if let (Some(done), Some(total)) = (row.completed_steps, row.total_steps)
                    && total > 0
                {
                    line.push_str(&format!("  [{done}/{total}]"));
                }
                if let Some(objective) = &row.plan_objective {
                    line.push_str(&format!("  {objective}"));
                }
                println!("{line}");
            }
        }
    }
    Ok(())
}
