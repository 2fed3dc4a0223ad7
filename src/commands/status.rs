//! The `status` command: parallel collection plus rendering.

use std::time::Duration;

use erk::context::Context;
use erk::error::ErkError;
use erk::status::{gather, render};
use erk::worktree::WorktreeManager;

use crate::cli::OutputFormat;

pub fn handle_status(
    ctx: &Context,
    name: Option<&str>,
    format: OutputFormat,
    deadline_secs: u64,
) -> anyhow::Result<()> {
    let manager = WorktreeManager::new(ctx);
    let worktree = match name {
        Some(name) => manager.find(name)?,
        None => manager.current()?.ok_or(ErkError::NotInWorktree)?,
    };

    // Surface where the assistant's session logs for this worktree live;
    // handy when correlating a stuck implementation run.
    if let Some(home) = dirs::home_dir() {
        log::debug!(
            "assistant session logs: {}",
            erk::claude::session_log_dir(&home, &worktree.path).display()
        );
    }

    let data = gather(ctx, &worktree, Duration::from_secs(deadline_secs))?;

    match format {
        OutputFormat::Text => {
            // Human rendering goes to stderr; stdout stays machine-pure
            erk::styling::eprint!("{}", render::render_text(&data));
        }
        OutputFormat::Json => {
            println!("{}", render::render_json(&data));
        }
    }
    Ok(())
}
