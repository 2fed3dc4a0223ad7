//! User-global configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ErkError;

/// Path of the global config file: `{user_config_dir}/erk/config`.
pub fn global_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("erk")
        .join("config")
}

fn default_erks_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("erks")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GlobalConfig {
    /// Directory holding all erks, one subdirectory per repository.
    #[serde(default = "default_erks_root")]
    pub erks_root: PathBuf,
    /// Whether the external stack tool is available and should be used.
    #[serde(default)]
    pub use_stack_tool: bool,
    /// Show associated PR info in status output.
    #[serde(default = "default_true")]
    pub show_pr_info: bool,
    /// Show PR check results in status output (extra host round-trip).
    #[serde(default)]
    pub show_pr_checks: bool,
    /// Set by `erk init` once the shell wrapper is installed.
    #[serde(default)]
    pub shell_setup_complete: bool,
}

fn default_true() -> bool {
    true
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            erks_root: default_erks_root(),
            use_stack_tool: false,
            show_pr_info: true,
            show_pr_checks: false,
            shell_setup_complete: false,
        }
    }
}

impl GlobalConfig {
    /// Load from the given path, falling back to defaults when the file
    /// does not exist. The `ERK_ROOT` override applies only in [`load`];
    /// this function reads the file as-is (config writes must not persist
    /// the override).
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

    pub fn load() -> Result<Self, ErkError> {
        let mut config = Self::load_from(&global_config_path())?;
        if let Ok(root) = std::env::var("ERK_ROOT")
            && !root.is_empty()
        {
            config.erks_root = PathBuf::from(shellexpand::tilde(&root).into_owned());
        }
        Ok(config)
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

    pub fn save(&self) -> Result<(), ErkError> {
        self.save_to(&global_config_path())
    }

    /// Keys recognized by `erk config get/set` for this tier.
    pub const KEYS: &'static [&'static str] = &[
        "erks-root",
        "use-stack-tool",
        "show-pr-info",
        "show-pr-checks",
        "shell-setup-complete",
    ];

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "erks-root" => Some(self.erks_root.display().to_string()),
            "use-stack-tool" => Some(self.use_stack_tool.to_string()),
            "show-pr-info" => Some(self.show_pr_info.to_string()),
            "show-pr-checks" => Some(self.show_pr_checks.to_string()),
            "shell-setup-complete" => Some(self.shell_setup_complete.to_string()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ErkError> {
        let parse_bool = |value: &str| {
            value.parse::<bool>().map_err(|_| ErkError::Config {
                path: global_config_path(),
                details: format!("'{value}' is not a boolean (expected true or false)"),
            })
        };
        match key {
            "erks-root" => {
                self.erks_root = PathBuf::from(shellexpand::tilde(value).into_owned());
            }
            "use-stack-tool" => self.use_stack_tool = parse_bool(value)?,
            "show-pr-info" => self.show_pr_info = parse_bool(value)?,
            "show-pr-checks" => self.show_pr_checks = parse_bool(value)?,
            "shell-setup-complete" => self.shell_setup_complete = parse_bool(value)?,
            _ => {
                return Err(ErkError::Config {
                    path: global_config_path(),
                    details: format!(
                        "unknown key '{key}'; recognized keys: {}",
                        Self::KEYS.join(", ")
                    ),
                });
            }
        }
        Ok(())
    }

    /// All keys and current values, for `erk config list`.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        Self::KEYS
            .iter()
            .map(|&k| (k, self.get(k).expect("all listed keys resolve")))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = GlobalConfig::default();
        assert!(config.show_pr_info);
        assert!(!config.use_stack_tool);
        assert!(!config.shell_setup_complete);
        assert!(config.erks_root.ends_with("erks"));
    }

    #[test]
    fn rejects_unknown_keys_at_parse_time() {
        let result: Result<GlobalConfig, _> = toml::from_str("erks-roots = \"/tmp\"");
        assert!(result.is_err());
    }

    #[test]
    fn roundtrips_through_toml() {
        let mut config = GlobalConfig::default();
        config.use_stack_tool = true;
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: GlobalConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn get_set_roundtrip_for_all_keys() {
        let mut config = GlobalConfig::default();
        config.set("use-stack-tool", "true").unwrap();
        assert_eq!(config.get("use-stack-tool").unwrap(), "true");
        config.set("erks-root", "/tmp/erks").unwrap();
        assert_eq!(config.get("erks-root").unwrap(), "/tmp/erks");
        config.set("show-pr-checks", "true").unwrap();
        assert_eq!(config.get("show-pr-checks").unwrap(), "true");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut config = GlobalConfig::default();
        assert!(config.set("no-such-key", "1").is_err());
    }

    #[test]
    fn set_rejects_bad_bool() {
        let mut config = GlobalConfig::default();
        assert!(config.set("use-stack-tool", "yes").is_err());
    }

    #[test]
    fn load_save_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        let mut config = GlobalConfig::default();
        config.shell_setup_complete = true;
        config.save_to(&path).unwrap();
        let loaded = GlobalConfig::load_from(&path).unwrap();
        assert!(loaded.shell_setup_complete);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = GlobalConfig::load_from(&dir.path().join("nope")).unwrap();
        assert_eq!(loaded.show_pr_info, GlobalConfig::default().show_pr_info);
    }
}
