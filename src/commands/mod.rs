//! One handler per CLI subcommand. Handlers take the per-invocation
//! context plus their parsed flags, do the work through the library, and
//! own all user-facing printing (stdout for machine output, feedback for
//! everything else).

mod config;
mod init;
mod land;
mod list;
mod plan;
mod status;
mod statusline;
mod worktree;

pub use config::handle_config;
pub use init::handle_init;
pub use land::handle_land_stack;
pub use list::handle_list;
pub use plan::{
    handle_implement, handle_plan_clone, handle_plan_enqueue, handle_plan_enrich,
    handle_plan_save, handle_plan_save_enriched, handle_queue_plan, handle_submit,
};
pub use status::handle_status;
pub use statusline::handle_refresh_statusline;
pub use worktree::{
    handle_checkout, handle_consolidate, handle_create, handle_current, handle_delete,
    handle_rename,
};

use erk::activation::{ActivationScript, emit_script_path};
use erk::context::Context;

/// Hand a directory change (plus env) to the enclosing shell.
///
/// In script mode the snippet is written and its path printed as the sole
/// stdout line; otherwise we can only hint, since a child process cannot
/// move its parent shell.
pub(crate) fn emit_activation(ctx: &Context, script: ActivationScript) -> anyhow::Result<()> {
    if script.is_empty() {
        return Ok(());
    }
    if ctx.feedback.is_suppressed() {
        let path = ctx.script_writer.write(&script)?;
        emit_script_path(&path);
    } else if let Some(target) = &script.chdir {
        ctx.feedback
            .hint(format!("cd {}", target.display()));
        if !ctx.config.shell_setup_complete {
            ctx.feedback
                .hint("run 'erk init' to enable automatic directory switching");
        }
    }
    Ok(())
}
