//! The on-disk plan folder inside a worktree.
//!
//! Canonical layout is `.plan/` holding `plan.md` (immutable after
//! creation), `progress.md` (YAML front matter plus a checkbox list), and
//! an optional `issue.json`. The legacy `.impl/` layout is discovered
//! read-only and never written. The folder is never committed.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ErkError;

pub const PLAN_DIR: &str = ".plan";
pub const LEGACY_PLAN_DIR: &str = ".impl";

const PLAN_FILE: &str = "plan.md";
const PROGRESS_FILE: &str = "progress.md";
const ISSUE_FILE: &str = "issue.json";

/// Progress front matter of `progress.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub completed_steps: u32,
    pub total_steps: u32,
}

impl Progress {
    pub fn fraction(&self) -> Option<f64> {
        (self.total_steps > 0).then(|| self.completed_steps as f64 / self.total_steps as f64)
    }
}

/// Link back to the host-side plan record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueLink {
    pub issue_number: u64,
    pub issue_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlanFolder {
    dir: PathBuf,
    legacy: bool,
}

impl PlanFolder {
    /// Find the plan folder of a worktree: `.plan/` wins, `.impl/` is the
    /// read-only fallback.
    pub fn discover(worktree: &Path) -> Option<Self> {
        let canonical = worktree.join(PLAN_DIR);
        if canonical.is_dir() {
            return Some(Self {
                dir: canonical,
                legacy: false,
            });
        }
        let legacy = worktree.join(LEGACY_PLAN_DIR);
        legacy.is_dir().then_some(Self {
            dir: legacy,
            legacy: true,
        })
    }

    /// Create `.plan/` seeded from a plan body: `plan.md` verbatim and
    /// `progress.md` with zero completed steps and the body's checkbox
    /// list.
    pub fn create(worktree: &Path, plan_body: &str) -> Result<Self, ErkError> {
        let dir = worktree.join(PLAN_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| Self::io_err(&dir, e))?;
        // The folder is never committed
        std::fs::write(dir.join(".gitignore"), "*\n").map_err(|e| Self::io_err(&dir, e))?;
        std::fs::write(dir.join(PLAN_FILE), plan_body).map_err(|e| Self::io_err(&dir, e))?;

        let folder = Self { dir, legacy: false };
        let steps = checkbox_lines(plan_body);
        folder.write_progress(
            Progress {
                completed_steps: 0,
                total_steps: steps.len() as u32,
            },
            &steps,
        )?;
        Ok(folder)
    }

    fn io_err(path: &Path, e: std::io::Error) -> ErkError {
        ErkError::Internal {
            identifier: format!("plan-folder {}: {e}", path.display()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    pub fn plan_body(&self) -> Result<String, ErkError> {
        std::fs::read_to_string(self.dir.join(PLAN_FILE))
            .map_err(|e| Self::io_err(&self.dir, e))
    }

    /// First H1 of `plan.md`, as the plan's objective.
    pub fn objective(&self) -> Option<String> {
        let body = self.plan_body().ok()?;
        body.lines()
            .find_map(|line| line.strip_prefix("# ").map(|t| t.trim().to_string()))
    }

    pub fn write_progress(&self, progress: Progress, steps: &[String]) -> Result<(), ErkError> {
        if self.legacy {
            return Err(ErkError::Internal {
                identifier: "legacy-plan-folder-readonly".to_string(),
            });
        }
        let front_matter = serde_yaml::to_string(&progress).map_err(|e| ErkError::Internal {
            identifier: format!("progress-yaml: {e}"),
        })?;
        let mut content = format!("---\n{front_matter}---\n");
        if !steps.is_empty() {
            content.push('\n');
            for step in steps {
                content.push_str(step);
                content.push('\n');
            }
        }
        std::fs::write(self.dir.join(PROGRESS_FILE), content)
            .map_err(|e| Self::io_err(&self.dir, e))
    }

    pub fn progress(&self) -> Result<Progress, ErkError> {
        let content = std::fs::read_to_string(self.dir.join(PROGRESS_FILE))
            .map_err(|e| Self::io_err(&self.dir, e))?;
        parse_progress_front_matter(&content)
    }

    /// The checkbox list of `progress.md` (the lines after the front
    /// matter). Empty when the file is missing.
    pub fn progress_steps(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.join(PROGRESS_FILE))
            .map(|content| checkbox_lines(&content))
            .unwrap_or_default()
    }

    pub fn write_issue_link(&self, link: &IssueLink) -> Result<(), ErkError> {
        if self.legacy {
            return Err(ErkError::Internal {
                identifier: "legacy-plan-folder-readonly".to_string(),
            });
        }
        let json = serde_json::to_string_pretty(link).map_err(|e| ErkError::Internal {
            identifier: format!("issue-json: {e}"),
        })?;
        std::fs::write(self.dir.join(ISSUE_FILE), json).map_err(|e| Self::io_err(&self.dir, e))
    }

    pub fn issue_link(&self) -> Option<IssueLink> {
        let raw = std::fs::read_to_string(self.dir.join(ISSUE_FILE)).ok()?;
        serde_json::from_str(&raw).ok()
    }
}

/// Checkbox lines of a plan body (`- [ ]` / `- [x]`), trimmed.
pub fn checkbox_lines(body: &str) -> Vec<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| line.starts_with("- [ ]") || line.starts_with("- [x]"))
        .map(str::to_string)
        .collect()
}

/// Parse the YAML front matter of `progress.md`.
pub fn parse_progress_front_matter(content: &str) -> Result<Progress, ErkError> {
    let invalid = |details: &str| ErkError::MetadataBlock {
        block: "progress".to_string(),
        details: details.to_string(),
    };
    let rest = content
        .strip_prefix("---\n")
        .ok_or_else(|| invalid("progress.md has no front matter"))?;
    let (yaml, _) = rest
        .split_once("---")
        .ok_or_else(|| invalid("unterminated front matter"))?;
    serde_yaml::from_str(yaml).map_err(|e| invalid(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAN: &str = "# Refactor parser\n\nSome intro.\n\n- [ ] Split lexer\n- [ ] Add tests\n- [x] Survey call sites\n";

    #[test]
    fn create_writes_plan_and_progress() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = PlanFolder::create(tmp.path(), PLAN).unwrap();

        assert_eq!(folder.plan_body().unwrap(), PLAN);
        assert_eq!(folder.objective().as_deref(), Some("Refactor parser"));

        let progress = folder.progress().unwrap();
        assert_eq!(progress.completed_steps, 0);
        assert_eq!(progress.total_steps, 3);

        // Folder contents are kept out of the index
        let gitignore = std::fs::read_to_string(folder.dir().join(".gitignore")).unwrap();
        assert_eq!(gitignore, "*\n");
    }

    #[test]
    fn discover_prefers_canonical_layout() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join(".impl")).unwrap();
        std::fs::create_dir(tmp.path().join(".plan")).unwrap();
        let folder = PlanFolder::discover(tmp.path()).unwrap();
        assert!(!folder.is_legacy());
    }

    #[test]
    fn discover_falls_back_to_legacy_read_only() {
        let tmp = tempfile::tempdir().unwrap();
        let legacy = tmp.path().join(".impl");
        std::fs::create_dir(&legacy).unwrap();
        std::fs::write(legacy.join("plan.md"), "# Old plan\n").unwrap();

        let folder = PlanFolder::discover(tmp.path()).unwrap();
        assert!(folder.is_legacy());
        assert_eq!(folder.objective().as_deref(), Some("Old plan"));
        assert!(
            folder
                .write_progress(
                    Progress {
                        completed_steps: 1,
                        total_steps: 1
                    },
                    &[]
                )
                .is_err()
        );
    }

    #[test]
    fn discover_none_without_folder() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(PlanFolder::discover(tmp.path()), None);
    }

    #[test]
    fn issue_link_roundtrips() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = PlanFolder::create(tmp.path(), "body").unwrap();
        let link = IssueLink {
            issue_number: 42,
            issue_url: "https://github.com/o/r/issues/42".to_string(),
        };
        folder.write_issue_link(&link).unwrap();
        assert_eq!(folder.issue_link().unwrap(), link);
    }

    #[test]
    fn progress_steps_come_from_progress_file() {
        let tmp = tempfile::tempdir().unwrap();
        let folder = PlanFolder::create(tmp.path(), PLAN).unwrap();
        let steps = folder.progress_steps();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0], "- [ ] Split lexer");

        folder
            .write_progress(
                Progress {
                    completed_steps: 1,
                    total_steps: 1,
                },
                &["- [x] Only step".to_string()],
            )
            .unwrap();
        assert_eq!(folder.progress_steps(), vec!["- [x] Only step"]);
    }

    #[test]
    fn counts_checkboxes() {
        assert_eq!(checkbox_lines(PLAN).len(), 3);
        assert!(checkbox_lines("no steps here").is_empty());
        assert_eq!(checkbox_lines("  - [ ] indented").len(), 1);
    }

    #[test]
    fn progress_fraction() {
        let progress = Progress {
            completed_steps: 1,
            total_steps: 4,
        };
        assert_eq!(progress.fraction(), Some(0.25));
        let empty = Progress {
            completed_steps: 0,
            total_steps: 0,
        };
        assert_eq!(empty.fraction(), None);
    }

    #[test]
    fn progress_front_matter_rejects_garbage() {
        assert!(parse_progress_front_matter("no front matter").is_err());
        assert!(parse_progress_front_matter("---\nnot: [valid\n").is_err());
    }
}
