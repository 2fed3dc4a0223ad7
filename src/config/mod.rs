//! Configuration system for erk.
//!
//! Erk has two independent configuration tiers:
//!
//! # Global config (`{user_config_dir}/erk/config`)
//!
//! **Purpose**: per-user settings, shared by every repository
//!
//! **Settings**: `erks-root`, `use-stack-tool`, `show-pr-info`,
//! `show-pr-checks`, `shell-setup-complete`
//!
//! # Repo config (`{erks_root}/{repo_name}/config`)
//!
//! **Purpose**: per-repository settings
//!
//! **Settings**: `trunk-branch`, `post-create-shell`,
//! `post-create-commands`, and the `[env]` table injected into each
//! worktree's environment
//!
//! The two tiers are completely independent: no overlap, no merging, no
//! precedence rules. Both are enumerated configurations — unknown keys are
//! rejected at parse time.

mod global;
mod repo;

pub use global::{GlobalConfig, global_config_path};
pub use repo::{RepoConfig, render_env};
