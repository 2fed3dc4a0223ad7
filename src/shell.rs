//! Shell detection and integration snippets.
//!
//! The probe is read-only: it detects the user's shell family and checks
//! which external tools are on PATH. Wrapper snippets install the `erk()`
//! function that sources activation scripts (see [`crate::activation`]).

use std::path::PathBuf;
use std::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    /// Detect the shell family from `$SHELL`.
    pub fn detect() -> Option<Self> {
        let shell = std::env::var("SHELL").ok()?;
        Self::from_program(shell.rsplit('/').next().unwrap_or(&shell))
    }

    pub fn from_program(program: &str) -> Option<Self> {
        match program {
            "bash" => Some(Shell::Bash),
            "zsh" => Some(Shell::Zsh),
            "fish" => Some(Shell::Fish),
            _ => None,
        }
    }

    /// Config file the wrapper function should be installed into.
    pub fn config_path(self, home: &std::path::Path) -> PathBuf {
        match self {
            Shell::Bash => home.join(".bashrc"),
            Shell::Zsh => home.join(".zshrc"),
            Shell::Fish => home.join(".config/fish/conf.d/erk.fish"),
        }
    }

    /// The wrapper function for this shell.
    ///
    /// The wrapper appends `--script` and captures stdout. An activation
    /// path (under the erk-activation temp dir) is sourced and removed;
    /// anything else is machine output (JSON, URLs) and is echoed through.
    /// Diagnostics stay on stderr and reach the user unchanged.
    pub fn wrapper_snippet(self) -> String {
        match self {
            Shell::Bash | Shell::Zsh => r#"# erk shell integration
erk() {
    local __erk_out
    __erk_out="$(command erk "$@" --script)" || return $?
    case "$__erk_out" in
        */erk-activation/*)
            if [ -f "$__erk_out" ]; then
                . "$__erk_out"
                command rm -f "$__erk_out"
            fi
            ;;
        "") ;;
        *) printf '%s\n' "$__erk_out" ;;
    esac
}
"#
            .to_string(),
            Shell::Fish => r#"# erk shell integration
function erk
    set -l __erk_out (command erk $argv --script | string collect)
    or return $status
    if string match -q '*/erk-activation/*' -- "$__erk_out"
        if test -f "$__erk_out"
            source $__erk_out
            command rm -f $__erk_out
        end
    else if test -n "$__erk_out"
        printf '%s\n' "$__erk_out"
    end
end
"#
            .to_string(),
        }
    }
}

/// Which external tools the current environment provides.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolProbe {
    pub git: Option<PathBuf>,
    pub host_cli: Option<PathBuf>,
    pub stack_tool: Option<PathBuf>,
    pub assistant: Option<PathBuf>,
}

impl ToolProbe {
    pub fn run() -> Self {
        Self {
            git: which::which("git").ok(),
            host_cli: which::which("gh").ok(),
            stack_tool: which::which("gt").ok(),
            assistant: which::which("claude").ok(),
        }
    }
}

/// Build a `shell -c command` invocation for post-create hooks.
///
/// `shell` comes from the repo config (`post-create-shell`); the default
/// is plain `sh`.
pub fn shell_command(shell: Option<&str>, command: &str) -> Command {
    let mut cmd = Command::new(shell.unwrap_or("sh"));
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn from_program_recognizes_families() {
        assert_eq!(Shell::from_program("bash"), Some(Shell::Bash));
        assert_eq!(Shell::from_program("zsh"), Some(Shell::Zsh));
        assert_eq!(Shell::from_program("fish"), Some(Shell::Fish));
        assert_eq!(Shell::from_program("nushell"), None);
    }

    #[test]
    fn wrapper_appends_script_flag() {
        for shell in [Shell::Bash, Shell::Zsh, Shell::Fish] {
            let snippet = shell.wrapper_snippet();
            assert!(snippet.contains("--script"), "{shell} wrapper lacks --script");
            assert!(snippet.contains("command erk"));
        }
    }

    #[test]
    fn config_paths_per_shell() {
        let home = Path::new("/home/u");
        assert_eq!(Shell::Bash.config_path(home), Path::new("/home/u/.bashrc"));
        assert!(
            Shell::Fish
                .config_path(home)
                .ends_with(".config/fish/conf.d/erk.fish")
        );
    }

    #[test]
    fn shell_command_defaults_to_sh() {
        let cmd = shell_command(None, "echo hi");
        assert_eq!(cmd.get_program(), "sh");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["-c", "echo hi"]);
    }
}
