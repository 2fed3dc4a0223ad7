//! Activation-script protocol.
//!
//! A CLI process cannot change its parent shell's working directory, so
//! commands that need to (create, checkout, implement) write a POSIX-sh
//! snippet to a temp file and print that file's path as the **sole line on
//! stdout**. A shell wrapper installed by `erk init` runs the command as
//! `source <(erk … --script)` — well, sources the printed path — and the
//! directory change takes effect in the user's shell.
//!
//! All diagnostics go to stderr; stdout carries exactly one line: the
//! absolute path to the snippet, terminated with `\n`.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::ErkError;

/// An ephemeral shell snippet: a directory change plus env exports.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivationScript {
    pub chdir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl ActivationScript {
    pub fn cd(path: impl Into<PathBuf>) -> Self {
        Self {
            chdir: Some(path.into()),
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, env: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.chdir.is_none() && self.env.is_empty()
    }

    /// Render as POSIX sh. Paths and values are single-quote escaped.
    pub fn render(&self) -> String {
        let mut script = String::from("# Generated by erk; sourced by the shell wrapper.\n");
        if let Some(path) = &self.chdir {
            script.push_str(&format!(
                "cd {}\n",
                sh_escape(&path.display().to_string())
            ));
        }
        for (key, value) in &self.env {
            script.push_str(&format!("export {key}={}\n", sh_escape(value)));
        }
        script
    }
}

fn sh_escape(value: &str) -> String {
    shell_escape::unix::escape(Cow::Borrowed(value)).into_owned()
}

/// Writes activation scripts into an erk-owned directory of unique temp
/// files.
#[derive(Debug, Clone)]
pub struct ScriptWriter {
    dir: PathBuf,
}

impl Default for ScriptWriter {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("erk-activation"),
        }
    }
}

impl ScriptWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the script to a unique file and return its absolute path.
    pub fn write(&self, script: &ActivationScript) -> Result<PathBuf, ErkError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ErkError::Internal {
            identifier: format!("activation-dir: {e}"),
        })?;
        let file = tempfile::Builder::new()
            .prefix("activate-")
            .suffix(".sh")
            .tempfile_in(&self.dir)
            .map_err(|e| ErkError::Internal {
                identifier: format!("activation-script: {e}"),
            })?;
        std::fs::write(file.path(), script.render()).map_err(|e| ErkError::Internal {
            identifier: format!("activation-script: {e}"),
        })?;
        // Keep the file; the shell wrapper consumes it after we exit.
        let (_, path) = file.keep().map_err(|e| ErkError::Internal {
            identifier: format!("activation-script: {e}"),
        })?;
        Ok(path)
    }
}

/// Print the activation-script path contract line.
///
/// This is the only stdout output a script-mode command produces.
pub fn emit_script_path(path: &Path) {
    // Bypasses styling entirely: this line is machine-consumed.
    println!("{}", path.display());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_cd_and_exports() {
        let script = ActivationScript::cd("/erks/repo/feat").with_env(vec![
            ("DB_URL".to_string(), "postgres://localhost/app".to_string()),
        ]);
        let rendered = script.render();
        assert!(rendered.contains("cd /erks/repo/feat\n"));
        assert!(rendered.contains("export DB_URL=postgres://localhost/app\n"));
    }

    #[test]
    fn escapes_spaces_and_quotes() {
        let script = ActivationScript::cd("/tmp/dir with space")
            .with_env(vec![("MSG".to_string(), "it's here".to_string())]);
        let rendered = script.render();
        assert!(rendered.contains("cd '/tmp/dir with space'\n"));
        assert!(rendered.contains("export MSG='it'\\''s here'\n"));
    }

    #[test]
    fn writes_unique_files() {
        let dir = tempfile::tempdir().unwrap();
        let writer = ScriptWriter::with_dir(dir.path());
        let script = ActivationScript::cd("/somewhere");
        let first = writer.write(&script).unwrap();
        let second = writer.write(&script).unwrap();
        assert_ne!(first, second);
        assert!(first.is_absolute());
        let content = std::fs::read_to_string(&first).unwrap();
        assert!(content.contains("cd /somewhere"));
    }

    #[test]
    fn empty_script_still_renders_header() {
        let script = ActivationScript::default();
        assert!(script.is_empty());
        assert!(script.render().starts_with('#'));
    }
}
