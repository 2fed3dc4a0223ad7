//! Per-repository configuration, stored at `{erks_root}/{repo_name}/config`.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ErkError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RepoConfig {
    /// Overrides the trunk branch resolved from `origin/HEAD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trunk_branch: Option<String>,
    /// Shell used to run post-create commands (default: sh).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_create_shell: Option<String>,
    /// Commands run sequentially in a fresh worktree; the first non-zero
    /// exit aborts creation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_create_commands: Vec<String>,
    /// Environment injected into each worktree. Values may reference
    /// earlier keys and process env as `${NAME}`; insertion order is the
    /// resolution order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env: IndexMap<String, String>,
}

impl RepoConfig {
    pub fn load_from(path: &Path) -> Result<Self, ErkError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| ErkError::Config {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ErkError::Config {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ErkError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ErkError::Config {
                path: path.to_path_buf(),
                details: e.to_string(),
            })?;
        }
        let rendered = toml::to_string_pretty(self).map_err(|e| ErkError::Config {
            path: path.to_path_buf(),
            details: e.to_string(),
        })?;
        std::fs::write(path, rendered).map_err(|e| ErkError::Config {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    /// Keys recognized by `erk config get/set --repo`. Env entries are
    /// addressed as `env.NAME`.
    pub const KEYS: &'static [&'static str] = &[
        "trunk-branch",
        "post-create-shell",
        "post-create-commands",
    ];

    pub fn get(&self, key: &str) -> Option<String> {
        if let Some(name) = key.strip_prefix("env.") {
            return self.env.get(name).cloned();
        }
        match key {
            "trunk-branch" => self.trunk_branch.clone(),
            "post-create-shell" => self.post_create_shell.clone(),
            "post-create-commands" => Some(self.post_create_commands.join(", ")),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str, path: &Path) -> Result<(), ErkError> {
        if let Some(name) = key.strip_prefix("env.") {
            self.env.insert(name.to_string(), value.to_string());
            return Ok(());
        }
        match key {
            "trunk-branch" => self.trunk_branch = Some(value.to_string()),
            "post-create-shell" => self.post_create_shell = Some(value.to_string()),
            "post-create-commands" => {
                self.post_create_commands = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            _ => {
                return Err(ErkError::Config {
                    path: path.to_path_buf(),
                    details: format!(
                        "unknown key '{key}'; recognized keys: {}, env.NAME",
                        Self::KEYS.join(", ")
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = Self::KEYS
            .iter()
            .filter_map(|&k| self.get(k).map(|v| (k.to_string(), v)))
            .collect();
        for (name, value) in &self.env {
            entries.push((format!("env.{name}"), value.clone()));
        }
        entries
    }
}

/// Render the `env` table into concrete values.
///
/// `${NAME}` placeholders resolve left-to-right: first against keys
/// rendered earlier in the table, then against the process environment via
/// `lookup`. Unresolvable placeholders are kept literal, so downstream
/// shells can still substitute them.
pub fn render_env(
    env: &IndexMap<String, String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> IndexMap<String, String> {
    let mut rendered: IndexMap<String, String> = IndexMap::with_capacity(env.len());

    for (key, template) in env {
        let value = substitute(template, |name| {
            rendered
                .get(name)
                .cloned()
                .or_else(|| lookup(name))
        });
        rendered.insert(key.clone(), value);
    }

    rendered
}

/// Replace `${NAME}` occurrences using `resolve`; unresolved placeholders
/// stay literal.
fn substitute(template: &str, resolve: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match resolve(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push_str("${");
                        out.push_str(name);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated placeholder: keep the remainder verbatim
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn parses_full_config() {
        let toml = r#"
trunk-branch = "develop"
post-create-shell = "bash"
post-create-commands = ["uv sync", "make setup"]

[env]
DB_NAME = "app_dev"
DB_URL = "postgres://localhost/${DB_NAME}"
"#;
        let config: RepoConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.trunk_branch.as_deref(), Some("develop"));
        assert_eq!(config.post_create_commands.len(), 2);
        assert_eq!(config.env.len(), 2);
    }

    #[test]
    fn rejects_unknown_keys() {
        let result: Result<RepoConfig, _> = toml::from_str("trunk = \"main\"");
        assert!(result.is_err());
    }

    #[test]
    fn env_resolves_earlier_keys_in_order() {
        let env = env_of(&[
            ("DB_NAME", "app_dev"),
            ("DB_URL", "postgres://localhost/${DB_NAME}"),
        ]);
        let rendered = render_env(&env, |_| None);
        assert_eq!(rendered["DB_URL"], "postgres://localhost/app_dev");
    }

    #[test]
    fn env_falls_back_to_process_env() {
        let env = env_of(&[("CACHE", "${HOME_DIR}/cache")]);
        let rendered = render_env(&env, |name| {
            (name == "HOME_DIR").then(|| "/home/u".to_string())
        });
        assert_eq!(rendered["CACHE"], "/home/u/cache");
    }

    #[test]
    fn env_keeps_unresolved_placeholders_literal() {
        let env = env_of(&[("TOKEN", "${SECRET_TOKEN}")]);
        let rendered = render_env(&env, |_| None);
        assert_eq!(rendered["TOKEN"], "${SECRET_TOKEN}");
    }

    #[test]
    fn env_later_keys_do_not_resolve_earlier_ones() {
        // Resolution is strictly left-to-right: a forward reference falls
        // back to process env, not to the table.
        let env = env_of(&[("A", "${B}"), ("B", "late")]);
        let rendered = render_env(&env, |_| None);
        assert_eq!(rendered["A"], "${B}");
        assert_eq!(rendered["B"], "late");
    }

    #[test]
    fn substitute_handles_multiple_and_unterminated() {
        let value = substitute("${A}-${A}${", |n| (n == "A").then(|| "x".to_string()));
        assert_eq!(value, "x-x${");
    }

    #[test]
    fn get_set_roundtrip() {
        let mut config = RepoConfig::default();
        let path = Path::new("/tmp/config");
        config.set("trunk-branch", "main", path).unwrap();
        assert_eq!(config.get("trunk-branch").unwrap(), "main");
        config.set("env.FOO", "bar", path).unwrap();
        assert_eq!(config.get("env.FOO").unwrap(), "bar");
        config
            .set("post-create-commands", "a, b", path)
            .unwrap();
        assert_eq!(config.get("post-create-commands").unwrap(), "a, b");
        assert!(config.set("bogus", "x", path).is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = RepoConfig::load_from(&dir.path().join("config")).unwrap();
        assert_eq!(config, RepoConfig::default());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let mut config = RepoConfig::default();
        config.trunk_branch = Some("main".into());
        config.env.insert("A".into(), "1".into());
        config.save_to(&path).unwrap();
        assert_eq!(RepoConfig::load_from(&path).unwrap(), config);
    }
}
