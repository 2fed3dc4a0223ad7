//! The `land-stack` command: sync, restack onto trunk, and submit every
//! branch of the stack as PRs through the stack tool.

use color_print::cformat;

use erk::context::Context;
use erk::error::ErkError;
use erk::ops::Stack;

pub fn handle_land_stack(ctx: &Context) -> anyhow::Result<()> {
    ctx.repo()?;
    let Some(stack) = &ctx.stack else {
        ctx.feedback
            .hint("enable the stack tool with 'erk config set use-stack-tool true'");
        return Err(ErkError::ToolMissing {
            tool: "gt".to_string(),
        }
        .into());
    };

    let trunk = ctx.trunk()?.to_string();
    let branches = stack.current_stack(&ctx.cwd)?;
    if branches.len() <= 1 {
        ctx.feedback.info("Nothing to land: the stack is empty");
        return Ok(());
    }

    ctx.feedback
        .progress(format!("syncing stack with remote ({} branches)", branches.len()));
    stack.sync(&ctx.cwd)?;

    ctx.feedback.progress(format!("restacking onto {trunk}"));
    stack.restack(&ctx.cwd)?;

    ctx.feedback.progress("submitting stack");
    stack.submit_stack(&ctx.cwd)?;

    ctx.feedback.success(cformat!(
        "Submitted <bold>{}</> branches; merge the PRs from the bottom of the stack up",
        branches.len() - 1
    ));
    Ok(())
}
