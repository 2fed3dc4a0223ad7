//! Command-line surface.
//!
//! Global flags: `--dry-run` (installs the DryRun capability wrappers),
//! `--verbose`, `--script` (shell-integration mode: stdout carries only
//! the activation-script path), `--dangerous` (skip assistant permission
//! prompts). Structured commands take `--format {text,json}`; simple
//! two-mode commands take `--json`. Unknown flags are refused by clap.

use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Color, Styles};
use clap::{Parser, Subcommand, ValueEnum};

/// Help/usage styling, matching erk's message palette.
fn help_styles() -> Styles {
    Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .usage(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .placeholder(anstyle::Style::new().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
        .error(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "erk",
    version,
    about = "Manage per-feature git worktrees and drive AI-assisted implementation plans",
    styles = help_styles()
)]
pub struct Cli {
    /// Preview destructive operations without executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Trace every capability call and enable debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Shell-integration mode: print an activation-script path on stdout
    /// and suppress ordinary diagnostics
    #[arg(long, global = true)]
    pub script: bool,

    /// Run the assistant without permission prompts
    #[arg(long, global = true)]
    pub dangerous: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Set up the erks root, probe tools, and install shell integration
    Init,

    /// Read and write configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Create a worktree from a name, a plan file, or a plan issue
    Create {
        /// Worktree name (or a title to sanitize with --title-style input)
        target: Option<String>,
        /// Explicit worktree name overriding the derived one
        #[arg(long)]
        name: Option<String>,
        /// Seed from a plan markdown file
        #[arg(long, conflicts_with = "issue")]
        plan: Option<PathBuf>,
        /// Seed from an `erk-plan` issue
        #[arg(long)]
        issue: Option<u64>,
    },

    /// Remove a worktree (and optionally its branch)
    Delete {
        name: String,
        /// Also delete the branch, even if unmerged
        #[arg(long)]
        force_branch: bool,
    },

    /// Rename a worktree, its directory, and its branch
    Rename { old: String, new: String },

    /// Switch to a worktree (changes the shell's directory via activation)
    Checkout { name: String },

    /// Merge the plans of related worktrees into one target worktree
    Consolidate {
        /// Worktree that absorbs the plans
        target: String,
        /// Worktrees whose plans are absorbed
        #[arg(required = true)]
        sources: Vec<String>,
        /// Overwrite a conflicting consolidated plan in the target
        #[arg(long)]
        force: bool,
    },

    /// Show the worktree containing the current directory
    Current {
        /// Emit a single JSON object on stdout
        #[arg(long)]
        json: bool,
    },

    /// Full status of one worktree (parallel collectors)
    Status {
        /// Worktree name; defaults to the current worktree
        name: Option<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Global collection deadline in seconds
        #[arg(long, default_value_t = 30)]
        deadline: u64,
    },

    /// List all managed worktrees
    List {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create the implementation worktree for a plan issue and run the
    /// assistant in it
    Implement {
        issue: u64,
        /// Hand the terminal to an interactive assistant session
        #[arg(long)]
        interactive: bool,
        /// Only create the worktree; do not invoke the assistant
        #[arg(long, conflicts_with = "interactive")]
        no_assistant: bool,
    },

    /// Drive implement → fast-ci → submit-pr for a plan issue
    Submit { issue: u64 },

    /// Save a plan file as a new plan issue
    PlanSave {
        file: PathBuf,
        /// Issue title; defaults to the plan's first heading
        #[arg(long)]
        title: Option<String>,
    },

    /// Enrich a plan (issue number or file) via the planning subagent
    PlanEnrich {
        /// Issue number, or a path to a plan file
        input: String,
    },

    /// Enrich a plan file and save the result as a new plan issue
    PlanSaveEnriched { file: PathBuf },

    /// Clone an open plan issue into a fresh timestamped record
    PlanClone { issue: u64 },

    /// Dispatch remote implementation for an open plan issue
    PlanEnqueue { issue: u64 },

    /// Save a plan file and immediately dispatch remote implementation
    QueuePlan {
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },

    /// Restack onto trunk and submit the whole stack as PRs
    LandStack,

    /// Rewrite the per-repo statusline cache
    RefreshStatusline,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print one value
    Get {
        key: String,
        /// Operate on the per-repo config instead of the global one
        #[arg(long)]
        repo: bool,
    },
    /// Set one value
    Set {
        key: String,
        value: String,
        #[arg(long)]
        repo: bool,
    },
    /// Print all keys and values
    List {
        #[arg(long)]
        repo: bool,
    },
}

impl Commands {
    /// Whether this invocation promises pure-JSON stdout; errors must then
    /// be emitted as JSON objects too.
    pub fn wants_json(&self) -> bool {
        match self {
            Commands::Current { json } => *json,
            Commands::Status { format, .. } | Commands::List { format } => {
                *format == OutputFormat::Json
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_create_with_flags() {
        let cli = Cli::try_parse_from(["erk", "create", "--issue", "42", "--name", "feat"]).unwrap();
        match cli.command {
            Commands::Create { issue, name, .. } => {
                assert_eq!(issue, Some(42));
                assert_eq!(name.as_deref(), Some("feat"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn refuses_unknown_flags() {
        assert!(Cli::try_parse_from(["erk", "list", "--nope"]).is_err());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["erk", "delete", "foo", "--dry-run"]).unwrap();
        assert!(cli.dry_run);
        match cli.command {
            Commands::Delete { name, force_branch } => {
                assert_eq!(name, "foo");
                assert!(!force_branch);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn json_mode_detection() {
        let cli = Cli::try_parse_from(["erk", "current", "--json"]).unwrap();
        assert!(cli.command.wants_json());
        let cli = Cli::try_parse_from(["erk", "status", "--format", "json"]).unwrap();
        assert!(cli.command.wants_json());
        let cli = Cli::try_parse_from(["erk", "status"]).unwrap();
        assert!(!cli.command.wants_json());
    }

    #[test]
    fn consolidate_requires_sources() {
        assert!(Cli::try_parse_from(["erk", "consolidate", "target"]).is_err());
        let cli =
            Cli::try_parse_from(["erk", "consolidate", "target", "a", "b", "--force"]).unwrap();
        match cli.command {
            Commands::Consolidate {
                target,
                sources,
                force,
            } => {
                assert_eq!(target, "target");
                assert_eq!(sources, vec!["a", "b"]);
                assert!(force);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn plan_and_issue_are_exclusive() {
        assert!(
            Cli::try_parse_from(["erk", "create", "--plan", "p.md", "--issue", "1"]).is_err()
        );
    }
}
