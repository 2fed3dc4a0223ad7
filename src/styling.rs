//! Consolidated styling for terminal output.
//!
//! This module uses the anstyle ecosystem:
//! - anstream for auto-detecting color support
//! - anstyle for composable styling
//! - Semantic style constants for domain-specific use
//!
//! ## stdout vs stderr principle
//!
//! - **stdout**: machine-consumable output (JSON, activation-script paths)
//! - **stderr**: human messages (progress, success, errors, hints, traces)
//!
//! This separation is load-bearing: shell integration sources whatever the
//! command prints on stdout, so status messages must never land there.
//! Use `println!` for machine output, `eprintln!` for everything else.

use anstyle::{AnsiColor, Color, Style};

// Re-exports from anstream (auto-detecting output)
pub use anstream::{eprint, eprintln, print, println};

// ============================================================================
// Style constants
// ============================================================================

/// Error message body (red)
pub const ERROR: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Red)));

/// Bold-within-error emphasis
pub const ERROR_BOLD: Style = ERROR.bold();

/// Hint / secondary guidance (dimmed)
pub const HINT: Style = Style::new().dimmed();

/// Success (green)
pub const SUCCESS: Style = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Green)));

/// Command traces from the Printing capability layer (dimmed)
pub const TRACE: Style = Style::new().dimmed();

/// The "(dry run)" marker appended to traces when DryRun is in the stack
pub const DRY_RUN_MARKER: Style = Style::new()
    .bold()
    .fg_color(Some(Color::Ansi(AnsiColor::BrightCyan)));

// ============================================================================
// Message emojis
// ============================================================================

/// Success emoji: `cformat!("{SUCCESS_EMOJI} <green>message</>")`
pub const SUCCESS_EMOJI: &str = "✅";

/// Error emoji: `cformat!("{ERROR_EMOJI} <red>message</>")`
pub const ERROR_EMOJI: &str = "❌";

/// Warning emoji: `cformat!("{WARNING_EMOJI} <yellow>message</>")`
pub const WARNING_EMOJI: &str = "🟡";

/// Hint emoji: `cformat!("{HINT_EMOJI} <dim>message</>")`
pub const HINT_EMOJI: &str = "💡";

/// Progress emoji: `cformat!("{PROGRESS_EMOJI} <cyan>message</>")`
pub const PROGRESS_EMOJI: &str = "🔄";

// ============================================================================
// Formatting helpers
// ============================================================================

/// Indent quoted subprocess/config output under a message.
///
/// Every line gets a two-space gutter so raw external output reads as a
/// block distinct from erk's own messages.
pub fn format_with_gutter(content: &str) -> String {
    content
        .lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a success message with emoji and color.
pub fn success_message(msg: impl AsRef<str>) -> String {
    let msg = msg.as_ref();
    format!("{SUCCESS_EMOJI} {SUCCESS}{msg}{SUCCESS:#}")
}

/// Format a hint message with emoji and dim styling.
pub fn hint_message(msg: impl AsRef<str>) -> String {
    let msg = msg.as_ref();
    format!("{HINT_EMOJI} {HINT}{msg}{HINT:#}")
}

/// Format a warning message.
pub fn warning_message(msg: impl AsRef<str>) -> String {
    let yellow = Style::new().fg_color(Some(Color::Ansi(AnsiColor::Yellow)));
    let msg = msg.as_ref();
    format!("{WARNING_EMOJI} {yellow}{msg}{yellow:#}")
}

// ============================================================================
// Feedback
// ============================================================================

/// Human-facing message channel, always on stderr.
///
/// In `--script` mode the wrapper sources whatever stdout names, and the
/// user sees stderr only after the fact; ordinary chatter is suppressed so
/// the wrapper stays quiet. Errors are emitted regardless.
#[derive(Debug, Clone, Copy, Default)]
pub struct Feedback {
    suppressed: bool,
}

impl Feedback {
    pub fn new() -> Self {
        Self { suppressed: false }
    }

    pub fn suppressing() -> Self {
        Self { suppressed: true }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn success(&self, msg: impl AsRef<str>) {
        if !self.suppressed {
            eprintln!("{}", success_message(msg));
        }
    }

    pub fn hint(&self, msg: impl AsRef<str>) {
        if !self.suppressed {
            eprintln!("{}", hint_message(msg));
        }
    }

    pub fn warning(&self, msg: impl AsRef<str>) {
        if !self.suppressed {
            eprintln!("{}", warning_message(msg));
        }
    }

    pub fn progress(&self, msg: impl AsRef<str>) {
        if !self.suppressed {
            let msg = msg.as_ref();
            eprintln!("{PROGRESS_EMOJI} {msg}");
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        if !self.suppressed {
            eprintln!("{}", msg.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gutter_indents_each_line() {
        let formatted = format_with_gutter("first\nsecond");
        assert_eq!(formatted, "  first\n  second");
    }

    #[test]
    fn gutter_keeps_blank_lines_bare() {
        let formatted = format_with_gutter("a\n\nb");
        assert_eq!(formatted, "  a\n\n  b");
    }

    #[test]
    fn success_message_includes_emoji() {
        assert!(success_message("done").contains(SUCCESS_EMOJI));
        assert!(success_message("done").contains("done"));
    }
}
