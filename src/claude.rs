//! Driver for the AI assistant subprocess.
//!
//! Three entry points: streaming (lazy event sequence), blocking (drains
//! the stream into a [`CommandResult`]), and interactive (process
//! replacement). The assistant is invoked in print mode with streaming
//! JSON output; each stdout line is one JSON event.
//!
//! Tests never hit a real assistant: [`FakeClaudeExecutor`] replays
//! pre-seeded event sequences.

use std::collections::VecDeque;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use crossbeam_channel as chan;
use regex::Regex;
use std::sync::OnceLock;

use crate::error::ErkError;
use crate::ops::Clock;

/// Name of the assistant binary on PATH.
const ASSISTANT_BIN: &str = "claude";

/// Env var carrying the session id for correlating assistant logs.
pub const SESSION_CONTEXT_VAR: &str = "SESSION_CONTEXT";

/// Tagged event from the assistant subprocess, ordered by emission.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Text(String),
    Tool(String),
    SpinnerUpdate(String),
    PrUrl(String),
    Error(String),
}

/// Options shared by all execution modes.
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Skip permission prompts entirely (--dangerous)
    pub dangerous: bool,
    /// Warn about malformed stream lines on stderr
    pub verbose: bool,
    /// Session id threaded through to the assistant for log correlation
    pub session_id: Option<String>,
}

/// Final record of a single assistant-command run.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub command: String,
    pub success: bool,
    pub pr_url: Option<String>,
    pub duration_seconds: f64,
    pub error_message: Option<String>,
    /// Assistant text messages, in emission order
    pub filtered_messages: Vec<String>,
}

pub trait ClaudeExecutor: Send + Sync {
    /// Run one slash-command non-interactively and stream its events.
    fn execute_streaming(
        &self,
        command: &str,
        worktree: &Path,
        opts: &ExecOptions,
    ) -> Result<Box<dyn Iterator<Item = StreamEvent> + Send>, ErkError>;

    /// Replace this process with an interactive assistant session. On
    /// success this never returns.
    fn execute_interactive(&self, worktree: &Path, opts: &ExecOptions) -> Result<(), ErkError>;
}

/// Drain the streaming form into a [`CommandResult`].
pub fn execute_command(
    executor: &dyn ClaudeExecutor,
    clock: &dyn Clock,
    command: &str,
    worktree: &Path,
    opts: &ExecOptions,
) -> Result<CommandResult, ErkError> {
    let started = clock.now_utc();
    let events = executor.execute_streaming(command, worktree, opts)?;

    let mut pr_url = None;
    let mut error_message = None;
    let mut filtered_messages = Vec::new();

    for event in events {
        match event {
            StreamEvent::Text(text) => filtered_messages.push(text),
            StreamEvent::PrUrl(url) => pr_url = Some(url),
            StreamEvent::Error(message) => error_message = Some(message),
            StreamEvent::Tool(_) | StreamEvent::SpinnerUpdate(_) => {}
        }
    }

    let duration_seconds = (clock.now_utc() - started).num_milliseconds() as f64 / 1000.0;
    Ok(CommandResult {
        command: command.to_string(),
        success: error_message.is_none(),
        pr_url,
        duration_seconds,
        error_message,
        filtered_messages,
    })
}

/// Run a fixed command sequence, stopping at the first failure. Results of
/// completed commands (including the failing one) are preserved.
pub fn execute_commands(
    executor: &dyn ClaudeExecutor,
    clock: &dyn Clock,
    commands: &[&str],
    worktree: &Path,
    opts: &ExecOptions,
) -> Result<Vec<CommandResult>, ErkError> {
    let mut results = Vec::with_capacity(commands.len());
    for command in commands {
        let result = execute_command(executor, clock, command, worktree, opts)?;
        let failed = !result.success;
        results.push(result);
        if failed {
            break;
        }
    }
    Ok(results)
}

// ============================================================================
// Stream parsing
// ============================================================================

fn pr_url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https://[^\s\\'\x22]+/pull/\d+").expect("valid regex"))
}

/// Extract the first PR URL from arbitrary tool-result content.
pub fn extract_pr_url(content: &str) -> Option<String> {
    pr_url_regex().find(content).map(|m| m.as_str().to_string())
}

/// Parse one line of assistant stream output into events.
///
/// Unknown fields are tolerated; unknown event kinds and malformed lines
/// yield nothing (the caller decides whether to warn).
pub fn parse_stream_line(line: &str) -> Vec<StreamEvent> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
        return Vec::new();
    };

    match value.get("type").and_then(|t| t.as_str()) {
        Some("assistant_message") => value
            .get("text")
            .or_else(|| value.get("content"))
            .and_then(|t| t.as_str())
            .map(|t| vec![StreamEvent::Text(t.to_string())])
            .unwrap_or_default(),
        Some("tool_use") => {
            let name = value
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or("tool");
            let summary = value
                .get("input")
                .map(summarize_input)
                .filter(|s| !s.is_empty())
                .map(|s| format!("{name}: {s}"))
                .unwrap_or_else(|| name.to_string());
            vec![StreamEvent::Tool(summary)]
        }
        Some("tool_result") => {
            let content = value
                .get("content")
                .map(|c| match c.as_str() {
                    Some(s) => s.to_string(),
                    None => c.to_string(),
                })
                .unwrap_or_default();
            extract_pr_url(&content)
                .map(|url| vec![StreamEvent::PrUrl(url)])
                .unwrap_or_default()
        }
        Some("status") => value
            .get("status")
            .or_else(|| value.get("message"))
            .and_then(|s| s.as_str())
            .map(|s| vec![StreamEvent::SpinnerUpdate(s.to_string())])
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// One-line summary of a tool input for the event stream.
fn summarize_input(input: &serde_json::Value) -> String {
    let rendered = match input.as_object() {
        Some(map) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| format!("{k}={v}")))
            .collect::<Vec<_>>()
            .join(" "),
        None => input.to_string(),
    };
    match rendered.lines().next() {
        Some(first) if first.chars().count() > 80 => {
            format!("{}…", first.chars().take(79).collect::<String>())
        }
        Some(first) => first.to_string(),
        None => String::new(),
    }
}

// ============================================================================
// Real executor
// ============================================================================

pub struct RealClaudeExecutor;

impl RealClaudeExecutor {
    fn base_command(&self, worktree: &Path, opts: &ExecOptions) -> Command {
        let mut cmd = Command::new(ASSISTANT_BIN);
        cmd.current_dir(worktree);
        if let Some(session_id) = &opts.session_id {
            cmd.env(SESSION_CONTEXT_VAR, format!("session_id={session_id}"));
        }
        cmd
    }
}

impl ClaudeExecutor for RealClaudeExecutor {
    fn execute_streaming(
        &self,
        command: &str,
        worktree: &Path,
        opts: &ExecOptions,
    ) -> Result<Box<dyn Iterator<Item = StreamEvent> + Send>, ErkError> {
        let mut cmd = self.base_command(worktree, opts);
        cmd.args([
            "-p",
            command,
            "--verbose",
            "--permission-mode",
            "accept-edits",
            "--output-format",
            "stream-json",
        ]);
        if opts.dangerous {
            cmd.arg("--dangerously-skip-permissions");
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        log::debug!("$ {} [{}]", crate::ops::runner::display_command(&cmd), worktree.display());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ErkError::ToolMissing {
                    tool: ASSISTANT_BIN.to_string(),
                }
            } else {
                ErkError::CommandFailed {
                    command: ASSISTANT_BIN.to_string(),
                    exit_code: None,
                    stderr: e.to_string(),
                }
            }
        })?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let verbose = opts.verbose;
        let (tx, rx) = chan::unbounded();

        std::thread::spawn(move || {
            let reader = std::io::BufReader::new(stdout);
            for line in reader.lines().map_while(Result::ok) {
                if line.trim().is_empty() {
                    continue;
                }
                let events = parse_stream_line(&line);
                if events.is_empty() && verbose && !line.trim_start().starts_with('{') {
                    crate::styling::eprintln!("skipping malformed stream line: {line}");
                }
                for event in events {
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
            // Stream closed: report a non-zero exit as a final error event
            match child.wait() {
                Ok(status) if status.success() => {}
                Ok(status) => {
                    let _ = tx.send(StreamEvent::Error(format!(
                        "assistant exited with {}",
                        status
                            .code()
                            .map(|c| format!("code {c}"))
                            .unwrap_or_else(|| "signal".to_string())
                    )));
                }
                Err(e) => {
                    let _ = tx.send(StreamEvent::Error(format!(
                        "failed to wait for assistant: {e}"
                    )));
                }
            }
        });

        Ok(Box::new(rx.into_iter()))
    }

    fn execute_interactive(&self, worktree: &Path, opts: &ExecOptions) -> Result<(), ErkError> {
        let mut cmd = self.base_command(worktree, opts);
        if opts.dangerous {
            cmd.arg("--dangerously-skip-permissions");
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // exec only returns on failure
            let err = cmd.exec();
            Err(if err.kind() == std::io::ErrorKind::NotFound {
                ErkError::ToolMissing {
                    tool: ASSISTANT_BIN.to_string(),
                }
            } else {
                ErkError::CommandFailed {
                    command: ASSISTANT_BIN.to_string(),
                    exit_code: None,
                    stderr: err.to_string(),
                }
            })
        }

        #[cfg(not(unix))]
        {
            let status = crate::ops::runner::run(&mut cmd, None).map_err(|e| {
                ErkError::CommandFailed {
                    command: ASSISTANT_BIN.to_string(),
                    exit_code: None,
                    stderr: e.to_string(),
                }
            })?;
            std::process::exit(status.status.code().unwrap_or(0));
        }
    }
}

// ============================================================================
// Fake executor
// ============================================================================

/// Replays pre-seeded event sequences, one per `execute_streaming` call,
/// and records every invocation.
pub struct FakeClaudeExecutor {
    scripted: Mutex<VecDeque<Vec<StreamEvent>>>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeClaudeExecutor {
    pub fn new(scripted: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            scripted: Mutex::new(scripted.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }
}

impl ClaudeExecutor for FakeClaudeExecutor {
    fn execute_streaming(
        &self,
        command: &str,
        worktree: &Path,
        _opts: &ExecOptions,
    ) -> Result<Box<dyn Iterator<Item = StreamEvent> + Send>, ErkError> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), worktree.to_path_buf()));
        let events = self
            .scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_default();
        Ok(Box::new(events.into_iter()))
    }

    fn execute_interactive(&self, worktree: &Path, _opts: &ExecOptions) -> Result<(), ErkError> {
        self.calls
            .lock()
            .unwrap()
            .push(("<interactive>".to_string(), worktree.to_path_buf()));
        Ok(())
    }
}

// ============================================================================
// Session-log correlation
// ============================================================================

/// Encode a working directory the way the assistant's session-log layout
/// does: `/` and `.` become `-`, yielding a name with a leading `-` for
/// absolute paths.
pub fn encode_session_dir(cwd: &Path) -> String {
    cwd.display().to_string().replace(['/', '.'], "-")
}

/// Directory holding the assistant's session logs for `cwd`:
/// `<home>/.claude/projects/<encoded-cwd>/`.
pub fn session_log_dir(home: &Path, cwd: &Path) -> PathBuf {
    home.join(".claude")
        .join("projects")
        .join(encode_session_dir(cwd))
}

/// Parse `SESSION_CONTEXT` (format `session_id=<uuid>`) into the id.
pub fn parse_session_context(value: &str) -> Option<String> {
    value
        .strip_prefix("session_id=")
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}
