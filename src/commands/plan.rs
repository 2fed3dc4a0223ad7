//! Plan commands: save, enrich, clone, enqueue, implement, submit.

use std::path::Path;

use color_print::cformat;

use erk::activation::ActivationScript;
use erk::claude::{ClaudeExecutor, CommandResult, ExecOptions, StreamEvent};
use erk::context::Context;
use erk::error::ErkError;
use erk::ops::Host;
use erk::plan::pipeline::IMPLEMENT_COMMAND;
use erk::plan::{PlanPipeline, PlanStore};

use super::emit_activation;

fn read_plan_file(path: &Path) -> Result<String, ErkError> {
    std::fs::read_to_string(path).map_err(|e| ErkError::InvalidName {
        name: path.display().to_string(),
        reason: format!("could not read plan file: {e}"),
    })
}

fn title_for(body: &str, path: &Path, explicit: Option<String>) -> String {
    explicit
        .or_else(|| {
            body.lines()
                .find_map(|line| line.strip_prefix("# ").map(|t| t.trim().to_string()))
        })
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "plan".to_string())
        })
}

fn exec_options(ctx: &Context, dangerous: bool, verbose: bool) -> ExecOptions {
    ExecOptions {
        dangerous,
        verbose,
        session_id: ctx.session_id.clone(),
    }
}

/// Shared stream consumer: echoes assistant text, summarizes tool use,
/// and captures the PR URL, so individual commands do not duplicate it.
fn consume_stream(
    ctx: &Context,
    events: impl Iterator<Item = StreamEvent>,
) -> Result<Option<String>, ErkError> {
    let mut pr_url = None;
    let mut error = None;
    for event in events {
        match event {
            StreamEvent::Text(text) => ctx.feedback.info(text),
            StreamEvent::Tool(summary) => ctx.feedback.info(cformat!("<dim>⏺ {summary}</>")),
            StreamEvent::SpinnerUpdate(_) => {}
            StreamEvent::PrUrl(url) => pr_url = Some(url),
            StreamEvent::Error(message) => error = Some(message),
        }
    }
    match error {
        Some(message) => Err(ErkError::CommandFailed {
            command: "claude".to_string(),
            exit_code: None,
            stderr: message,
        }),
        None => Ok(pr_url),
    }
}

pub fn handle_plan_save(
    ctx: &Context,
    file: &Path,
    title: Option<String>,
) -> anyhow::Result<()> {
    let body = read_plan_file(file)?;
    let title = title_for(&body, file, title);
    let issue = PlanPipeline::new(ctx).save(&title, &body)?;
    ctx.feedback
        .success(cformat!("Saved plan as issue <bold>#{}</>", issue.number));
    println!("{}", issue.url);
    Ok(())
}

pub fn handle_plan_enrich(ctx: &Context, input: &str) -> anyhow::Result<()> {
    let pipeline = PlanPipeline::new(ctx);

    if let Ok(number) = input.parse::<u64>() {
        // Enrich an existing record. The host CLI cannot edit the
        // plan-body comment in place, so the record is updated by
        // replacement: new issue, original closed with a link.
        let store = PlanStore::new(ctx.host.as_ref());
        let record = store.load_open(number)?;
        let enriched = pipeline.enrich(&record.body)?;
        let new_issue = pipeline.save(&enriched.title, &enriched.body)?;
        ctx.host.close_issue(
            number,
            Some(&format!("Enriched into {}", new_issue.url)),
        )?;
        ctx.feedback.success(cformat!(
            "Enriched <bold>#{number}</> into <bold>#{}</>",
            new_issue.number
        ));
        println!("{}", new_issue.url);
    } else {
        // Enrich a file and print the structured result for inspection
        let body = read_plan_file(Path::new(input))?;
        let enriched = pipeline.enrich(&body)?;
        println!(
            "{}",
            serde_json::json!({
                "title": enriched.title,
                "body": enriched.body,
                "context_categories": enriched.context_categories,
            })
        );
    }
    Ok(())
}

pub fn handle_plan_save_enriched(ctx: &Context, file: &Path) -> anyhow::Result<()> {
    let body = read_plan_file(file)?;
    let issue = PlanPipeline::new(ctx).save_enriched(&body)?;
    ctx.feedback.success(cformat!(
        "Saved enriched plan as issue <bold>#{}</>",
        issue.number
    ));
    println!("{}", issue.url);
    Ok(())
}

pub fn handle_plan_clone(ctx: &Context, issue: u64) -> anyhow::Result<()> {
    let outcome = PlanPipeline::new(ctx).clone_plan(issue)?;
    ctx.feedback.success(cformat!(
        "Cloned <bold>#{}</> to <bold>#{}</> (worktree <bold>{}</>)",
        outcome.source,
        outcome.new_issue.number,
        outcome.worktree_name
    ));
    if let Some(pr) = outcome.closed_pr {
        ctx.feedback
            .info(cformat!("<dim>closed superseded PR #{pr}</>"));
    }
    println!("{}", outcome.new_issue.url);
    Ok(())
}

pub fn handle_plan_enqueue(ctx: &Context, issue: u64) -> anyhow::Result<()> {
    let run = PlanPipeline::new(ctx).dispatch(issue)?;
    match run {
        Some(run) => {
            ctx.feedback
                .success(cformat!("Dispatched remote implementation for <bold>#{issue}</>"));
            println!("{}", run.url);
        }
        None => {
            ctx.feedback.warning(
                "Workflow dispatched, but no run appeared yet; check the host UI",
            );
        }
    }
    Ok(())
}

pub fn handle_queue_plan(
    ctx: &Context,
    file: &Path,
    title: Option<String>,
) -> anyhow::Result<()> {
    let body = read_plan_file(file)?;
    let title = title_for(&body, file, title);
    let pipeline = PlanPipeline::new(ctx);
    let issue = pipeline.save(&title, &body)?;
    ctx.feedback
        .success(cformat!("Saved plan as issue <bold>#{}</>", issue.number));
    let run = pipeline.dispatch(issue.number)?;
    if let Some(run) = run {
        println!("{}", run.url);
    } else {
        println!("{}", issue.url);
    }
    Ok(())
}

pub fn handle_implement(
    ctx: &Context,
    issue: u64,
    interactive: bool,
    no_assistant: bool,
    dangerous: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let outcome = PlanPipeline::new(ctx).implement(issue)?;
    let worktree_path = outcome.worktree.path.clone();
    ctx.feedback.success(cformat!(
        "Created worktree <bold>{}</> for issue <bold>#{issue}</>",
        outcome.worktree.name
    ));

    if interactive {
        // Process replacement; only returns on spawn failure
        ctx.executor
            .execute_interactive(&worktree_path, &exec_options(ctx, dangerous, verbose))?;
        return Ok(());
    }

    if !no_assistant {
        let events = ctx.executor.execute_streaming(
            IMPLEMENT_COMMAND,
            &worktree_path,
            &exec_options(ctx, dangerous, verbose),
        )?;
        let pr_url = consume_stream(ctx, events)?;
        if let Some(url) = pr_url {
            ctx.feedback.success(cformat!("PR: {url}"));
        }
    }

    emit_activation(
        ctx,
        ActivationScript::cd(&worktree_path).with_env(outcome.worktree.env.clone()),
    )?;
    Ok(())
}

pub fn handle_submit(ctx: &Context, issue: u64) -> anyhow::Result<()> {
    let results = PlanPipeline::new(ctx).submit(issue)?;
    report_results(ctx, &results);

    if let Some(failed) = results.iter().find(|r| !r.success) {
        return Err(ErkError::CommandFailed {
            command: failed.command.clone(),
            exit_code: None,
            stderr: failed
                .error_message
                .clone()
                .unwrap_or_else(|| "assistant command failed".to_string()),
        }
        .into());
    }
    Ok(())
}

fn report_results(ctx: &Context, results: &[CommandResult]) {
    for result in results {
        let line = if result.success {
            cformat!(
                "<green>✓</> {} <dim>({:.1}s)</>",
                result.command,
                result.duration_seconds
            )
        } else {
            cformat!(
                "<red>✗</> {} <dim>({:.1}s)</>",
                result.command,
                result.duration_seconds
            )
        };
        ctx.feedback.info(line);
        if let Some(url) = &result.pr_url {
            ctx.feedback.info(cformat!("  <dim>{url}</>"));
        }
    }
}
