//! Core types for rule pack results.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dockerfile::BuildFileModel;

/// Severity levels for findings, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" | "warn" => Ok(Severity::Warning),
            "info" => Ok(Severity::Info),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// A single issue reported by a rule pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Pack that produced the finding, e.g. "hadolint".
    pub pack: String,
    /// Rule within the pack, e.g. "unpinned-package".
    pub rule: String,
    pub severity: Severity,
    /// Absolute path of the Dockerfile.
    pub path: PathBuf,
    /// 1-based line, or 0 for file-level findings.
    pub line: usize,
    pub message: String,
}

impl Finding {
    pub fn new(
        pack: &str,
        rule: &str,
        severity: Severity,
        model: &BuildFileModel,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            pack: pack.to_string(),
            rule: rule.to_string(),
            severity,
            path: model.path().to_path_buf(),
            line,
            message: message.into(),
        }
    }

    /// Qualified rule id, `pack/rule`.
    pub fn id(&self) -> String {
        format!("{}/{}", self.pack, self.rule)
    }

    /// Render as `"<path>: <message>"` with the path relative to `root`.
    pub fn to_line(&self, root: &Path) -> String {
        format!("{}: {}", display_path(root, &self.path), self.message)
    }
}

/// Path of `file` relative to `root`, or its base name when it lies
/// outside `root` (or is `root` itself).
pub fn display_path(root: &Path, file: &Path) -> String {
    let base_name = || {
        file.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.to_string_lossy().to_string())
    };

    match file.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().replace('\\', "/"),
        _ => base_name(),
    }
}

/// A finding that was silenced by an inline directive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuppressedFinding {
    pub finding: Finding,
    pub suppression: super::Suppression,
}

/// Results of auditing a set of Dockerfiles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditResult {
    /// Directory paths are reported relative to.
    pub root: PathBuf,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub suppressed: Vec<SuppressedFinding>,
    /// Number of Dockerfiles parsed.
    pub scanned: usize,
}

impl AuditResult {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Check if any finding is at or above `severity`.
    pub fn has_at_least(&self, severity: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= severity)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Findings as `"<path>: <message>"` lines.
    pub fn lines(&self) -> Vec<String> {
        self.findings.iter().map(|f| f.to_line(&self.root)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path_relative() {
        let root = Path::new("/repo");
        assert_eq!(
            display_path(root, Path::new("/repo/services/api/Dockerfile")),
            "services/api/Dockerfile"
        );
    }

    #[test]
    fn test_display_path_outside_root() {
        let root = Path::new("/repo");
        assert_eq!(
            display_path(root, Path::new("/elsewhere/build.dockerfile")),
            "build.dockerfile"
        );
        assert_eq!(
            display_path(Path::new("/repo/Dockerfile"), Path::new("/repo/Dockerfile")),
            "Dockerfile"
        );
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        assert_eq!("WARN".parse::<Severity>(), Ok(Severity::Warning));
        assert!("fatal".parse::<Severity>().is_err());
    }

    #[test]
    fn test_finding_line() {
        let model = BuildFileModel::parse_content("/repo/app/Dockerfile", "FROM alpine");
        let finding = Finding::new("anchore", "root-user", Severity::Error, &model, 1, "runs as root");
        assert_eq!(finding.id(), "anchore/root-user");
        assert_eq!(finding.to_line(Path::new("/repo")), "app/Dockerfile: runs as root");
    }

    #[test]
    fn test_has_at_least() {
        let model = BuildFileModel::parse_content("/repo/Dockerfile", "");
        let mut result = AuditResult::new("/repo");
        result
            .findings
            .push(Finding::new("dockle", "x", Severity::Warning, &model, 0, "m"));
        assert!(result.has_at_least(Severity::Info));
        assert!(result.has_at_least(Severity::Warning));
        assert!(!result.has_at_least(Severity::Error));
        assert_eq!(result.lines(), vec!["Dockerfile: m"]);
    }
}
