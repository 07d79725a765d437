//! Configuration file schema for dockaudit.
//!
//! Configuration is optional. When present it narrows which packs run, which
//! rules and paths are ignored, and what severity fails the audit.

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::dockerfile::LoadOptions;
use crate::rules::{find_pack, select_packs, RuleError, RulePack, Runner, Severity};

/// File names looked up in the working directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["dockaudit.yaml", ".dockaudit.yaml"];

/// Errors from loading or validating a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid excluded_paths pattern {pattern:?}: {source}")]
    InvalidGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("invalid rule id {0:?}, expected `pack` or `pack/rule`")]
    InvalidRuleId(String),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub version: String,
    /// Packs to run; empty runs every pack
    #[serde(default)]
    pub packs: Vec<String>,
    /// `pack/rule` ids (or whole packs) whose findings are dropped
    #[serde(default)]
    pub disabled_rules: Vec<String>,
    /// Glob patterns for build files to skip (e.g., "legacy/**")
    #[serde(default)]
    pub excluded_paths: Vec<String>,
    /// Directory names skipped during discovery, on top of the built-in list
    #[serde(default)]
    pub ignore_dirs: Vec<String>,
    /// Worker threads (0 = one per core)
    #[serde(default)]
    pub jobs: Option<usize>,
    /// Lowest severity that fails the audit (default: error)
    #[serde(default)]
    pub fail_on: Option<Severity>,
    /// Per-rule severity, keyed by `pack/rule`
    #[serde(default)]
    pub severity_overrides: HashMap<String, Severity>,
}

impl Config {
    /// Parse a config from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find a config file: the working directory first, then the user
    /// config directory.
    pub fn discover<P: AsRef<Path>>(dir: P) -> Option<PathBuf> {
        let dir = dir.as_ref();
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
            .or_else(|| {
                directories::ProjectDirs::from("", "", "dockaudit")
                    .map(|dirs| dirs.config_dir().join("config.yaml"))
                    .filter(|p| p.is_file())
            })
    }

    /// Load an explicit config, or a discovered one, or defaults.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => Self::discover(dir),
        };
        match path {
            Some(p) => {
                log::debug!("using config {}", p.display());
                let config = Self::parse_file(&p)?;
                config.validate()?;
                Ok((config, Some(p)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    /// Check pack names, rule ids and glob patterns.
    pub fn validate(&self) -> Result<(), ConfigError> {
        select_packs(&self.packs)?;

        for id in self.disabled_rules.iter().chain(self.severity_overrides.keys()) {
            let pack = id.split('/').next().unwrap_or(id);
            if pack.is_empty() || id.split('/').count() > 2 || id.ends_with('/') {
                return Err(ConfigError::InvalidRuleId(id.clone()));
            }
            if find_pack(pack).is_none() {
                return Err(RuleError::UnknownPack(pack.to_string()).into());
            }
        }

        self.excluded_globset()?;
        Ok(())
    }

    /// Returns the severity that fails the audit (defaults to error).
    pub fn fail_on(&self) -> Severity {
        self.fail_on.unwrap_or(Severity::Error)
    }

    /// Compile `excluded_paths`, or None when there are none.
    pub fn excluded_globset(&self) -> Result<Option<GlobSet>, ConfigError> {
        if self.excluded_paths.is_empty() {
            return Ok(None);
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            let glob = Glob::new(pattern).map_err(|source| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|source| ConfigError::InvalidGlob {
            pattern: self.excluded_paths.join(", "),
            source,
        })?;
        Ok(Some(set))
    }

    pub fn load_options(&self) -> Result<LoadOptions, ConfigError> {
        Ok(LoadOptions {
            jobs: self.jobs.unwrap_or(0),
            extra_ignores: self.ignore_dirs.clone(),
            excluded: self.excluded_globset()?,
        })
    }

    /// Build a runner from this config. `packs` from the command line take
    /// precedence over the configured list.
    pub fn runner(&self, packs: &[String]) -> Result<Runner, ConfigError> {
        let names: &[String] = if packs.is_empty() { &self.packs } else { packs };
        let selected: Vec<&'static dyn RulePack> = select_packs(names)?;
        Ok(Runner::new()
            .packs(selected)
            .disable(&self.disabled_rules)
            .severity_overrides(self.severity_overrides.clone())
            .load_options(self.load_options()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
version: "1"
packs: [hadolint, anchore]
disabled_rules:
  - hadolint/cd-in-run
excluded_paths:
  - "legacy/**"
ignore_dirs: [generated]
jobs: 4
fail_on: warning
severity_overrides:
  anchore/root-user: warning
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.packs, vec!["hadolint", "anchore"]);
        assert_eq!(config.fail_on(), Severity::Warning);
        assert_eq!(
            config.severity_overrides.get("anchore/root-user"),
            Some(&Severity::Warning)
        );
        config.validate().unwrap();

        let options = config.load_options().unwrap();
        assert_eq!(options.jobs, 4);
        assert_eq!(options.extra_ignores, vec!["generated"]);
        assert!(options
            .excluded
            .unwrap()
            .is_match("legacy/app/Dockerfile"));
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert!(config.packs.is_empty());
        assert_eq!(config.fail_on(), Severity::Error);
        assert!(config.excluded_globset().unwrap().is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_unknown_names() {
        let config = Config {
            packs: vec!["nope".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Rule(RuleError::UnknownPack(_)))
        ));

        let config = Config {
            disabled_rules: vec!["hadolint/x/y".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRuleId(_))));

        let config = Config {
            excluded_paths: vec!["a/[".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidGlob { .. })));
    }

    #[test]
    fn test_load_discovers_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(".dockaudit.yaml"), "jobs: 2\n").unwrap();

        let (config, path) = Config::load(None, temp.path()).unwrap();
        assert_eq!(config.jobs, Some(2));
        assert_eq!(path, Some(temp.path().join(".dockaudit.yaml")));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("dockaudit.yaml");
        std::fs::write(&path, "jobs: [not a number\n").unwrap();

        let err = Config::load(Some(&path), temp.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("dockaudit.yaml"));
    }

    #[test]
    fn test_runner_cli_packs_take_precedence() {
        let config = Config {
            packs: vec!["nope".to_string()],
            ..Default::default()
        };
        assert!(config.runner(&["hadolint".to_string()]).is_ok());
        assert!(config.runner(&[]).is_err());
    }
}
