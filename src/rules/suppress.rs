//! Inline suppression of findings via Dockerfile comments.
//!
//! Supports suppression comments like:
//! - `# dockaudit:ignore <target> - <reason>` silences the next instruction
//! - `# dockaudit:ignore-file <target> - <reason>` silences the whole file
//!
//! `<target>` is `pack/rule`, a bare pack name, or `*` for everything.
//! Several targets may be given separated by commas.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::{Finding, SuppressedFinding};

/// How a suppression applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuppressionType {
    /// Applies to the instruction that follows the comment
    NextInstruction,
    /// Applies to the entire file
    File,
}

/// An inline suppression directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    /// `pack/rule`, `pack`, or `*`
    pub target: String,
    /// Human-readable reason
    pub reason: String,
    /// File containing the suppression
    pub file: PathBuf,
    /// Line the suppression applies to (0 for file-level)
    pub line: usize,
    pub suppression_type: SuppressionType,
}

lazy_static::lazy_static! {
    static ref SUPPRESSION_PATTERN: Regex =
        Regex::new(r"^\s*#\s*dockaudit:(ignore(?:-file)?)\s+(\S+)\s*(?:-\s*(.*))?$").unwrap();
}

/// Parse suppression directives from file content.
///
/// A next-instruction directive binds to the first following line that is
/// neither blank nor a comment, which is where that instruction starts.
pub fn parse_suppressions(file: &Path, content: &str) -> Vec<Suppression> {
    let lines: Vec<&str> = content.lines().collect();
    let mut suppressions = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let Some(caps) = SUPPRESSION_PATTERN.captures(line) else {
            continue;
        };
        let directive = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let targets = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let reason = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let (suppression_type, applies_to) = if directive == "ignore-file" {
            (SuppressionType::File, 0)
        } else {
            let next = lines
                .iter()
                .enumerate()
                .skip(idx + 1)
                .find(|(_, l)| {
                    let t = l.trim();
                    !t.is_empty() && !t.starts_with('#')
                })
                .map(|(i, _)| i + 1);
            match next {
                Some(line_number) => (SuppressionType::NextInstruction, line_number),
                None => continue,
            }
        };

        for target in targets.split(',').filter(|t| !t.is_empty()) {
            suppressions.push(Suppression {
                target: target.to_string(),
                reason: reason.clone(),
                file: file.to_path_buf(),
                line: applies_to,
                suppression_type,
            });
        }
    }

    suppressions
}

/// Check if a finding matches a suppression.
pub fn matches_suppression(finding: &Finding, suppression: &Suppression) -> bool {
    if finding.path != suppression.file {
        return false;
    }

    let target = suppression.target.as_str();
    let target_matches = target == "*"
        || target.eq_ignore_ascii_case(&finding.pack)
        || target.eq_ignore_ascii_case(&finding.id());
    if !target_matches {
        return false;
    }

    match suppression.suppression_type {
        SuppressionType::File => true,
        SuppressionType::NextInstruction => finding.line == suppression.line,
    }
}

/// Separate findings into active and suppressed.
pub fn filter_suppressed(
    findings: Vec<Finding>,
    suppressions: &[Suppression],
) -> (Vec<Finding>, Vec<SuppressedFinding>) {
    let mut active = Vec::new();
    let mut suppressed = Vec::new();

    for finding in findings {
        match suppressions
            .iter()
            .find(|s| matches_suppression(&finding, s))
        {
            Some(suppression) => suppressed.push(SuppressedFinding {
                finding,
                suppression: suppression.clone(),
            }),
            None => active.push(finding),
        }
    }

    (active, suppressed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::BuildFileModel;
    use crate::rules::Severity;

    const CONTENT: &str = r#"# dockaudit:ignore-file cosign - provenance is added by CI
FROM ubuntu:22.04

# dockaudit:ignore hadolint/curl-pipe-shell,dockle - vendor installer
# fetched from a pinned URL
RUN curl -fsSL https://x.example/install.sh | sh
USER root
"#;

    fn finding(pack: &str, rule: &str, line: usize) -> Finding {
        let model = BuildFileModel::parse_content("/repo/Dockerfile", "");
        Finding::new(pack, rule, Severity::Error, &model, line, "m")
    }

    #[test]
    fn test_parse_suppressions() {
        let suppressions = parse_suppressions(Path::new("/repo/Dockerfile"), CONTENT);
        assert_eq!(suppressions.len(), 3);

        assert_eq!(suppressions[0].suppression_type, SuppressionType::File);
        assert_eq!(suppressions[0].target, "cosign");
        assert_eq!(suppressions[0].reason, "provenance is added by CI");
        assert_eq!(suppressions[0].line, 0);

        // The plain comment between directive and RUN is skipped
        assert_eq!(suppressions[1].suppression_type, SuppressionType::NextInstruction);
        assert_eq!(suppressions[1].target, "hadolint/curl-pipe-shell");
        assert_eq!(suppressions[1].line, 6);
        assert_eq!(suppressions[2].target, "dockle");
        assert_eq!(suppressions[2].line, 6);
    }

    #[test]
    fn test_directive_at_end_of_file_is_dropped() {
        let suppressions =
            parse_suppressions(Path::new("/repo/Dockerfile"), "FROM a\n# dockaudit:ignore *\n");
        assert!(suppressions.is_empty());
    }

    #[test]
    fn test_plain_comments_are_not_directives() {
        let suppressions = parse_suppressions(
            Path::new("/repo/Dockerfile"),
            "# see dockaudit:ignore docs\nRUN echo '# dockaudit:ignore *'\n",
        );
        assert!(suppressions.is_empty());
    }

    #[test]
    fn test_matches_suppression() {
        let suppressions = parse_suppressions(Path::new("/repo/Dockerfile"), CONTENT);

        let curl = finding("hadolint", "curl-pipe-shell", 6);
        assert!(matches_suppression(&curl, &suppressions[1]));

        let other_rule = finding("hadolint", "unpinned-package", 6);
        assert!(!suppressions.iter().any(|s| matches_suppression(&other_rule, s)));

        let wrong_line = finding("dockle", "sudo", 7);
        assert!(!suppressions.iter().any(|s| matches_suppression(&wrong_line, s)));

        let whole_file = finding("cosign", "unsigned-base", 2);
        assert!(matches_suppression(&whole_file, &suppressions[0]));

        let wildcard = Suppression {
            target: "*".to_string(),
            reason: String::new(),
            file: PathBuf::from("/repo/Dockerfile"),
            line: 0,
            suppression_type: SuppressionType::File,
        };
        assert!(matches_suppression(&wrong_line, &wildcard));

        let elsewhere = Suppression {
            file: PathBuf::from("/repo/other/Dockerfile"),
            ..wildcard
        };
        assert!(!matches_suppression(&wrong_line, &elsewhere));
    }

    #[test]
    fn test_filter_suppressed() {
        let suppressions = parse_suppressions(Path::new("/repo/Dockerfile"), CONTENT);
        let findings = vec![
            finding("hadolint", "curl-pipe-shell", 6),
            finding("anchore", "root-user", 7),
            finding("cosign", "missing-source-label", 0),
        ];
        let (active, suppressed) = filter_suppressed(findings, &suppressions);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), "anchore/root-user");
        assert_eq!(suppressed.len(), 2);
        assert_eq!(suppressed[1].suppression.target, "cosign");
    }
}
