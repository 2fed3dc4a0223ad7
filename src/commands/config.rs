//! The `config {get,set,list}` commands, for both tiers.

use color_print::cformat;

use erk::config::{GlobalConfig, RepoConfig, global_config_path};
use erk::context::Context;
use erk::error::ErkError;

use crate::cli::ConfigCommand;

pub fn handle_config(ctx: &Context, action: ConfigCommand) -> anyhow::Result<()> {
    match action {
        ConfigCommand::Get { key, repo } => {
            let value = if repo {
                repo_config(ctx)?.0.get(&key)
            } else {
                ctx.config.get(&key)
            };
            match value {
                Some(value) => println!("{value}"),
                None => {
                    return Err(ErkError::Config {
                        path: if repo {
                            repo_config_path(ctx)?
                        } else {
                            global_config_path()
                        },
                        details: format!("key '{key}' is not set"),
                    }
                    .into());
                }
            }
        }
        ConfigCommand::Set { key, value, repo } => {
            if repo {
                let (mut config, path) = repo_config(ctx)?;
                config.set(&key, &value, &path)?;
                config.save_to(&path)?;
            } else {
                // Re-read from disk so an ERK_ROOT override is not
                // accidentally persisted.
                let path = global_config_path();
                let mut config = GlobalConfig::load_from(&path)?;
                config.set(&key, &value)?;
                config.save_to(&path)?;
            }
            ctx.feedback
                .success(cformat!("Set <bold>{key}</> = <bold>{value}</>"));
        }
        ConfigCommand::List { repo } => {
            if repo {
                for (key, value) in repo_config(ctx)?.0.entries() {
                    println!("{key} = {value}");
                }
            } else {
                for (key, value) in ctx.config.entries() {
                    println!("{key} = {value}");
                }
            }
        }
    }
    Ok(())
}

fn repo_config_path(ctx: &Context) -> Result<std::path::PathBuf, ErkError> {
    Ok(ctx.repo()?.erks_dir.join("config"))
}

fn repo_config(ctx: &Context) -> Result<(RepoConfig, std::path::PathBuf), ErkError> {
    let path = repo_config_path(ctx)?;
    Ok((RepoConfig::load_from(&path)?, path))
}
