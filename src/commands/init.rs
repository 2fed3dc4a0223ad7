//! The `init` command: create the global config, probe tools, and install
//! shell integration.

use color_print::cformat;

use erk::config::{GlobalConfig, global_config_path};
use erk::context::Context;
use erk::error::ErkError;
use erk::shell::{Shell, ToolProbe};

pub fn handle_init(ctx: &Context) -> anyhow::Result<()> {
    let path = global_config_path();
    let mut config = GlobalConfig::load_from(&path)?;

    std::fs::create_dir_all(&config.erks_root).map_err(|e| ErkError::Config {
        path: config.erks_root.clone(),
        details: format!("could not create erks root: {e}"),
    })?;
    ctx.feedback.success(cformat!(
        "Erks root: <bold>{}</>",
        config.erks_root.display()
    ));

    let probe = ToolProbe::run();
    report_tool(ctx, "git", probe.git.is_some(), "required for everything");
    report_tool(ctx, "gh", probe.host_cli.is_some(), "required for plan issues and PRs");
    report_tool(ctx, "gt", probe.stack_tool.is_some(), "optional stacked-branch tool");
    report_tool(ctx, "claude", probe.assistant.is_some(), "required for implement/submit");
    if probe.git.is_none() {
        return Err(ErkError::ToolMissing {
            tool: "git".to_string(),
        }
        .into());
    }

    match Shell::detect() {
        Some(shell) => {
            let installed = install_wrapper(shell)?;
            if installed {
                ctx.feedback.success(cformat!(
                    "Installed shell integration for <bold>{shell}</>"
                ));
                ctx.feedback.hint("restart the shell to activate it");
            } else {
                ctx.feedback.info("Shell integration already installed");
            }
            config.shell_setup_complete = true;
        }
        None => {
            ctx.feedback
                .warning("Could not detect a supported shell (bash, zsh, fish)");
            ctx.feedback
                .hint("install the wrapper manually from the docs to enable automatic cd");
        }
    }

    config.save_to(&path)?;
    ctx.feedback.success("Erk is ready");
    Ok(())
}

fn report_tool(ctx: &Context, tool: &str, found: bool, why: &str) {
    if found {
        ctx.feedback.info(cformat!("  <green>✓</> {tool}"));
    } else {
        ctx.feedback
            .info(cformat!("  <yellow>−</> {tool} <dim>({why})</>"));
    }
}

/// Append the wrapper function to the shell's config file unless an erk
/// integration line is already present. Returns whether anything changed.
fn install_wrapper(shell: Shell) -> Result<bool, ErkError> {
    let home = dirs::home_dir().ok_or_else(|| ErkError::Internal {
        identifier: "no-home-dir".to_string(),
    })?;
    let rc = shell.config_path(&home);
    let existing = std::fs::read_to_string(&rc).unwrap_or_default();
    if existing.contains("# erk shell integration") {
        return Ok(false);
    }
    if let Some(parent) = rc.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ErkError::Config {
            path: rc.clone(),
            details: e.to_string(),
        })?;
    }
    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content.push('\n');
    content.push_str(&shell.wrapper_snippet());
    std::fs::write(&rc, content).map_err(|e| ErkError::Config {
        path: rc,
        details: e.to_string(),
    })?;
    Ok(true)
}
