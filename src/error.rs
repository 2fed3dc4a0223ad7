//! Domain errors and their user-facing presentation.
//!
//! Capability layers raise `ErkError`s carrying a category, a one-line
//! summary, details, and concrete suggested actions. The dispatcher in
//! `main` translates them into either the styled stderr template or, in
//! JSON mode, a `{error, error_type, exit_code}` object on stdout.

use std::fmt;
use std::path::PathBuf;

use crate::styling::{ERROR, ERROR_BOLD, HINT, format_with_gutter};

/// Error category, used for exit codes and the JSON `error_type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    UserInput,
    Environment,
    Remote,
    Subprocess,
    Validation,
    Contention,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCategory::UserInput => "user-input",
            ErrorCategory::Environment => "environment",
            ErrorCategory::Remote => "remote",
            ErrorCategory::Subprocess => "subprocess",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Contention => "contention",
            ErrorCategory::Internal => "internal",
        }
    }

    /// Exit code policy: 1 for anything the user can fix locally,
    /// 2 for host/subprocess failures.
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorCategory::Remote | ErrorCategory::Subprocess => 2,
            _ => 1,
        }
    }
}

#[derive(Debug)]
pub enum ErkError {
    /// Worktree name failed legality or sanitation rules
    InvalidName { name: String, reason: String },
    /// Target directory already exists
    DestinationExists { path: PathBuf },
    /// Branch already exists when creation was requested
    BranchExists { branch: String },
    /// No worktree with the given name
    WorktreeNotFound { name: String },
    /// The current directory is not inside a managed worktree
    NotInWorktree,
    /// The current directory is not inside a git repository
    NotInRepo,
    /// Global config missing or erks root not set up
    NotInitialized,
    /// Trunk branch could not be resolved
    NoTrunk { repo: String },
    /// A required external tool is not on PATH
    ToolMissing { tool: String },
    /// Host API operation failed
    Host { operation: String, details: String },
    /// Issue does not exist on the host
    IssueNotFound { number: u64 },
    /// Issue exists but is not labeled as a plan
    NotAPlan { number: u64 },
    /// Plan issue is closed and cannot be acted on
    PlanClosed { number: u64 },
    /// External process exited non-zero
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    /// Metadata block missing or unparsable
    MetadataBlock { block: String, details: String },
    /// Config file failed to parse or contained unknown keys
    Config { path: PathBuf, details: String },
    /// Working tree must be clean for this operation
    UncommittedChanges { path: PathBuf },
    /// Invariant violation; not recoverable
    Internal { identifier: String },
}

impl ErkError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErkError::InvalidName { .. } | ErkError::WorktreeNotFound { .. } => {
                ErrorCategory::UserInput
            }
            ErkError::NotInWorktree | ErkError::IssueNotFound { .. } => ErrorCategory::UserInput,
            ErkError::NotAPlan { .. } | ErkError::PlanClosed { .. } => ErrorCategory::UserInput,
            ErkError::NotInRepo
            | ErkError::NotInitialized
            | ErkError::NoTrunk { .. }
            | ErkError::ToolMissing { .. } => ErrorCategory::Environment,
            ErkError::Host { .. } => ErrorCategory::Remote,
            ErkError::CommandFailed { .. } => ErrorCategory::Subprocess,
            ErkError::MetadataBlock { .. } | ErkError::Config { .. } => ErrorCategory::Validation,
            ErkError::DestinationExists { .. }
            | ErkError::BranchExists { .. }
            | ErkError::UncommittedChanges { .. } => ErrorCategory::Contention,
            ErkError::Internal { .. } => ErrorCategory::Internal,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    /// One-line summary for the `Error:` line and the JSON `error` field.
    pub fn summary(&self) -> String {
        match self {
            ErkError::InvalidName { name, .. } => format!("Invalid worktree name '{name}'"),
            ErkError::DestinationExists { .. } => "destination exists".to_string(),
            ErkError::BranchExists { branch } => format!("Branch '{branch}' already exists"),
            ErkError::WorktreeNotFound { name } => format!("No worktree named '{name}'"),
            ErkError::NotInWorktree => "Not inside a managed worktree".to_string(),
            ErkError::NotInRepo => "Not inside a git repository".to_string(),
            ErkError::NotInitialized => "Erk is not initialized".to_string(),
            ErkError::NoTrunk { repo } => format!("Could not resolve trunk branch for {repo}"),
            ErkError::ToolMissing { tool } => format!("Required tool '{tool}' not found"),
            ErkError::Host { operation, .. } => format!("Host operation failed: {operation}"),
            ErkError::IssueNotFound { number } => format!("Issue #{number} not found"),
            ErkError::NotAPlan { number } => format!("Issue #{number} is not an erk plan"),
            ErkError::PlanClosed { number } => format!("Plan issue #{number} is closed"),
            ErkError::CommandFailed { command, .. } => format!("Command failed: {command}"),
            ErkError::MetadataBlock { block, .. } => {
                format!("Malformed or missing '{block}' metadata block")
            }
            ErkError::Config { path, .. } => {
                format!("Invalid configuration in {}", path.display())
            }
            ErkError::UncommittedChanges { path } => {
                format!("Uncommitted changes in {}", path.display())
            }
            ErkError::Internal { identifier } => format!("Internal error [{identifier}]"),
        }
    }

    fn details(&self) -> Option<String> {
        match self {
            ErkError::InvalidName { reason, .. } => Some(reason.clone()),
            ErkError::DestinationExists { path } => {
                Some(format!("{} already exists", path.display()))
            }
            ErkError::Host { details, .. } => Some(details.clone()),
            ErkError::CommandFailed {
                exit_code, stderr, ..
            } => {
                let exit = exit_code
                    .map(|c| format!("exit code {c}"))
                    .unwrap_or_else(|| "killed by signal".to_string());
                if stderr.is_empty() {
                    Some(exit)
                } else {
                    Some(format!("{exit}\n{}", stderr.trim()))
                }
            }
            ErkError::MetadataBlock { details, .. } => Some(details.clone()),
            ErkError::Config { details, .. } => Some(details.clone()),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            ErkError::InvalidName { .. } => vec![
                "Use lowercase letters, digits, and dashes".to_string(),
                "Pass an explicit name with --name".to_string(),
            ],
            ErkError::DestinationExists { .. } => vec![
                "Pick a different name".to_string(),
                "Delete the existing worktree with 'erk delete'".to_string(),
            ],
            ErkError::BranchExists { branch } => vec![format!(
                "Run 'erk create {branch}' to check the existing branch out into a worktree"
            )],
            ErkError::WorktreeNotFound { .. } => {
                vec!["Run 'erk list' to see the managed worktrees".to_string()]
            }
            ErkError::NotInWorktree => {
                vec!["cd into a worktree, or pass the worktree name explicitly".to_string()]
            }
            ErkError::NotInRepo => vec!["cd into a git repository and retry".to_string()],
            ErkError::NotInitialized => vec!["Run 'erk init' to set up the erks root".to_string()],
            ErkError::NoTrunk { .. } => vec![
                "Run 'git remote set-head origin --auto'".to_string(),
                "Or set trunk-branch in the repo config".to_string(),
            ],
            ErkError::ToolMissing { tool } => {
                vec![format!("Install '{tool}' and make sure it is on PATH")]
            }
            ErkError::Host { .. } => vec![
                "Check network connectivity".to_string(),
                "Run 'gh auth status' to verify authentication".to_string(),
            ],
            ErkError::IssueNotFound { .. } => {
                vec!["Check the issue number on the host".to_string()]
            }
            ErkError::NotAPlan { .. } => {
                vec!["Only issues labeled 'erk-plan' can be used here".to_string()]
            }
            ErkError::PlanClosed { number } => vec![format!(
                "Re-open issue #{number}, or clone it with 'erk plan-clone {number}'"
            )],
            ErkError::UncommittedChanges { .. } => {
                vec!["Commit or stash the changes first".to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// The structured object emitted on stdout in JSON mode.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.summary(),
            "error_type": self.category().as_str(),
            "exit_code": self.exit_code(),
        })
    }
}

impl fmt::Display for ErkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ERROR_BOLD}Error:{ERROR_BOLD:#} {ERROR}{}{ERROR:#}",
            self.summary()
        )?;
        if let Some(details) = self.details() {
            if details.contains('\n') {
                write!(f, "\n\nDetails:\n{}", format_with_gutter(&details))?;
            } else {
                write!(f, "\n\nDetails: {details}")?;
            }
        }
        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            write!(f, "\n\nSuggested action:")?;
            for (i, s) in suggestions.iter().enumerate() {
                write!(f, "\n  {HINT}{}. {s}{HINT:#}", i + 1)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ErkError {}

/// Extract the exit code for an error chain, defaulting to 1.
///
/// Domain errors carry their category's code; anything else (including
/// plain `anyhow` context errors) is a generic failure.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ErkError>()
        .map(|e| e.exit_code())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_errors_exit_one() {
        let err = ErkError::InvalidName {
            name: "Root".into(),
            reason: "reserved".into(),
        };
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.category(), ErrorCategory::UserInput);
    }

    #[test]
    fn remote_and_subprocess_errors_exit_two() {
        let host = ErkError::Host {
            operation: "create issue".into(),
            details: "503".into(),
        };
        assert_eq!(host.exit_code(), 2);
        let sub = ErkError::CommandFailed {
            command: "git worktree add".into(),
            exit_code: Some(128),
            stderr: String::new(),
        };
        assert_eq!(sub.exit_code(), 2);
    }

    #[test]
    fn destination_exists_summary_is_literal() {
        let err = ErkError::DestinationExists {
            path: PathBuf::from("/erks/repo/foo"),
        };
        assert_eq!(err.summary(), "destination exists");
    }

    #[test]
    fn display_contains_template_sections() {
        let err = ErkError::DestinationExists {
            path: PathBuf::from("/erks/repo/foo"),
        };
        let rendered = format!("{err}");
        assert!(rendered.contains("Error:"));
        assert!(rendered.contains("Details:"));
        assert!(rendered.contains("Suggested action:"));
        assert!(rendered.contains("1. "));
    }

    #[test]
    fn json_object_shape() {
        let err = ErkError::IssueNotFound { number: 7 };
        let json = err.to_json();
        assert_eq!(json["error_type"], "user-input");
        assert_eq!(json["exit_code"], 1);
        assert!(json["error"].as_str().unwrap().contains("#7"));
    }

    #[test]
    fn exit_code_from_anyhow_chain() {
        let err: anyhow::Error = ErkError::PlanClosed { number: 3 }.into();
        assert_eq!(exit_code(&err), 1);
        let plain = anyhow::anyhow!("boom");
        assert_eq!(exit_code(&plain), 1);
        let host: anyhow::Error = ErkError::Host {
            operation: "x".into(),
            details: "y".into(),
        }
        .into();
        assert_eq!(exit_code(&host), 2);
    }
}
