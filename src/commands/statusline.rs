//! The `refresh-statusline` command: rewrite the per-repo statusline
//! cache consumed by prompt integrations.

use erk::context::Context;
use erk::error::ErkError;
use erk::plan::PlanFolder;
use erk::worktree::WorktreeManager;

/// Cache file under the erks dir, one line per worktree:
/// `name<TAB>branch<TAB>completed/total`.
pub const STATUSLINE_FILE: &str = ".statusline";

pub fn handle_refresh_statusline(ctx: &Context) -> anyhow::Result<()> {
    let repo = ctx.repo()?;
    let manager = WorktreeManager::new(ctx);

    let mut lines = Vec::new();
    for wt in manager.list()? {
        let name = WorktreeManager::display_name(&wt);
        let branch = wt.branch.as_deref().unwrap_or("-").to_string();
        let progress = PlanFolder::discover(&wt.path)
            .and_then(|f| f.progress().ok())
            .map(|p| format!("{}/{}", p.completed_steps, p.total_steps))
            .unwrap_or_else(|| "-".to_string());
        lines.push(format!("{name}\t{branch}\t{progress}"));
    }
    lines.sort();

    let path = repo.erks_dir.join(STATUSLINE_FILE);
    std::fs::create_dir_all(&repo.erks_dir).map_err(|e| ErkError::Internal {
        identifier: format!("statusline: {e}"),
    })?;
    std::fs::write(&path, lines.join("\n") + "\n").map_err(|e| ErkError::Internal {
        identifier: format!("statusline: {e}"),
    })?;

    ctx.feedback
        .info(format!("statusline refreshed: {}", path.display()));
    Ok(())
}
