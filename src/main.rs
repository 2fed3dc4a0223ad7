use anstyle::Style;
use clap::Parser;
use std::io::Write;
use std::process;

use erk::context::{Context, ContextBuilder};
use erk::error::{ErkError, exit_code};

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    // Configure logging from --verbose or RUST_LOG
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "off" }),
    )
    .format(|buf, record| {
        let dim = Style::new().dimmed();
        let msg = record.args().to_string();
        // Command invocations start with $; make the command itself bold
        if let Some(rest) = msg.strip_prefix("$ ") {
            let bold = Style::new().bold();
            if let Some(bracket) = rest.find(" [") {
                let (command, context) = rest.split_at(bracket);
                writeln!(buf, "{dim}${dim:#} {bold}{command}{bold:#}{dim}{context}{dim:#}")
            } else {
                writeln!(buf, "{dim}${dim:#} {bold}{rest}{bold:#}")
            }
        } else {
            writeln!(buf, "{dim}{msg}{dim:#}")
        }
    })
    .init();

    let json_mode = cli.command.wants_json();

    let result = run(cli);

    if let Err(e) = result {
        if json_mode {
            // stdout stays pure JSON; the error is the document
            let json = e
                .downcast_ref::<ErkError>()
                .map(|erk| erk.to_json())
                .unwrap_or_else(|| {
                    serde_json::json!({
                        "error": e.to_string(),
                        "error_type": "internal",
                        "exit_code": 1,
                    })
                });
            println!("{json}");
        } else {
            match e.downcast_ref::<ErkError>() {
                Some(erk) => eprintln!("{erk}"),
                None => eprintln!("Error: {e:#}"),
            }
        }
        process::exit(exit_code(&e));
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx: Context = ContextBuilder::new()
        .dry_run(cli.dry_run)
        .verbose(cli.verbose)
        .script_mode(cli.script)
        .build()?;

    match cli.command {
        Commands::Init => commands::handle_init(&ctx),
        Commands::Config { action } => commands::handle_config(&ctx, action),
        Commands::Create {
            target,
            name,
            plan,
            issue,
        } => commands::handle_create(&ctx, target, name, plan, issue),
        Commands::Delete { name, force_branch } => {
            commands::handle_delete(&ctx, &name, force_branch)
        }
        Commands::Rename { old, new } => commands::handle_rename(&ctx, &old, &new),
        Commands::Checkout { name } => commands::handle_checkout(&ctx, &name),
        Commands::Consolidate {
            target,
            sources,
            force,
        } => commands::handle_consolidate(&ctx, &target, &sources, force),
        Commands::Current { json } => commands::handle_current(&ctx, json),
        Commands::Status {
            name,
            format,
            deadline,
        } => commands::handle_status(&ctx, name.as_deref(), format, deadline),
        Commands::List { format } => commands::handle_list(&ctx, format),
        Commands::Implement {
            issue,
            interactive,
            no_assistant,
        } => commands::handle_implement(
            &ctx,
            issue,
            interactive,
            no_assistant,
            cli.dangerous,
            cli.verbose,
        ),
        Commands::Submit { issue } => commands::handle_submit(&ctx, issue),
        Commands::PlanSave { file, title } => commands::handle_plan_save(&ctx, &file, title),
        Commands::PlanEnrich { input } => commands::handle_plan_enrich(&ctx, &input),
        Commands::PlanSaveEnriched { file } => commands::handle_plan_save_enriched(&ctx, &file),
        Commands::PlanClone { issue } => commands::handle_plan_clone(&ctx, issue),
        Commands::PlanEnqueue { issue } => commands::handle_plan_enqueue(&ctx, issue),
        Commands::QueuePlan { file, title } => commands::handle_queue_plan(&ctx, &file, title),
        Commands::LandStack => commands::handle_land_stack(&ctx),
        Commands::RefreshStatusline => commands::handle_refresh_statusline(&ctx),
    }
}
