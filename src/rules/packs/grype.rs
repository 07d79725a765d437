//! Vulnerability matching in the style of grype, limited to what the build
//! file states: pinned package versions with well-known advisories, and how
//! much of the inventory cannot be matched at all because it floats.

use crate::dockerfile::{extract_package_installs, BuildFileModel, PackageInstall};
use crate::rules::pack::{deferred, Findings, RulePack};
use crate::rules::{Finding, Severity};

use super::is_package_name;

const PACK: &str = "grype";

/// (package name, affected version prefix, advisory).
const KNOWN_VULNERABLE: &[(&str, &str, &str)] = &[
    ("openssl", "1.0.1", "CVE-2014-0160 (Heartbleed)"),
    ("bash", "4.2", "CVE-2014-6271 (Shellshock)"),
    ("pyyaml", "5.3", "CVE-2020-14343"),
    ("requests", "2.19", "CVE-2018-18074"),
    ("urllib3", "1.24", "CVE-2019-11324"),
    ("jinja2", "2.10", "CVE-2019-10906"),
    ("lodash", "4.17.15", "CVE-2020-8203"),
    ("minimist", "1.2.5", "CVE-2021-44906"),
    ("axios", "0.21.0", "CVE-2020-28168"),
];

pub struct GrypePack;

impl RulePack for GrypePack {
    fn name(&self) -> &'static str {
        PACK
    }

    fn description(&self) -> &'static str {
        "Vulnerability matching: pinned versions with known advisories, unmatched inventory"
    }

    fn check<'a>(&'a self, model: &'a BuildFileModel) -> Findings<'a> {
        Box::new(
            deferred(move || known_vulnerable(model))
                .chain(deferred(move || unpinned_inventory(model))),
        )
    }
}

/// `version` is `affected` or continues it with a non-digit (`1.0.1f`, `5.3.1`).
fn version_matches(version: &str, affected: &str) -> bool {
    match version.strip_prefix(affected) {
        Some(rest) => !rest.starts_with(|c: char| c.is_ascii_digit()),
        None => false,
    }
}

fn advisory_for(install: &PackageInstall) -> Option<&'static str> {
    // Range specifiers say nothing about the installed version.
    if install.package.contains(['>', '<', '~', '!']) {
        return None;
    }
    let name = install.name().to_ascii_lowercase();
    let version = install.version()?;
    KNOWN_VULNERABLE
        .iter()
        .find(|(pkg, affected, _)| *pkg == name && version_matches(version, affected))
        .map(|(_, _, advisory)| *advisory)
}

fn known_vulnerable(model: &BuildFileModel) -> Vec<Finding> {
    extract_package_installs(model)
        .into_iter()
        .filter_map(|p| {
            advisory_for(&p).map(|advisory| {
                Finding::new(
                    PACK,
                    "known-vulnerable-version",
                    Severity::Error,
                    model,
                    p.line,
                    format!("{} {} is affected by {}", p.name(), p.version().unwrap_or(""), advisory),
                )
            })
        })
        .collect()
}

fn unpinned_inventory(model: &BuildFileModel) -> Option<Finding> {
    let installs: Vec<PackageInstall> = extract_package_installs(model)
        .into_iter()
        .filter(is_package_name)
        .collect();
    let unpinned = installs.iter().filter(|p| !p.version_pinned).count();
    if unpinned == 0 {
        return None;
    }
    Some(Finding::new(
        PACK,
        "unpinned-inventory",
        Severity::Info,
        model,
        0,
        format!(
            "{} of {} installed packages float; they cannot be matched against advisories",
            unpinned,
            installs.len()
        ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn findings(content: &str) -> Vec<Finding> {
        let model = BuildFileModel::parse_content("/repo/Dockerfile", content);
        GrypePack.check(&model).collect()
    }

    #[test]
    fn test_version_matches() {
        assert!(version_matches("1.0.1f-1ubuntu2", "1.0.1"));
        assert!(version_matches("5.3.1", "5.3"));
        assert!(version_matches("4.17.15", "4.17.15"));
        assert!(!version_matches("1.0.10", "1.0.1"));
        assert!(!version_matches("4.17.21", "4.17.15"));
    }

    #[test]
    fn test_known_vulnerable_versions() {
        let found = findings(
            "FROM python:3.12\nRUN pip install --no-cache-dir PyYAML==5.3.1 requests>=2.19\nRUN npm install lodash@4.17.15 lodash@4.17.21\n",
        );
        let rules: Vec<(&str, usize)> = found.iter().map(|f| (f.rule.as_str(), f.line)).collect();
        assert_eq!(
            rules,
            vec![
                ("known-vulnerable-version", 2),
                ("known-vulnerable-version", 3),
            ]
        );
        assert!(found[0].message.contains("CVE-2020-14343"));
        assert!(found[1].message.contains("CVE-2020-8203"));
    }

    #[test]
    fn test_unpinned_inventory() {
        let found = findings("FROM debian:12\nRUN apt-get install -y curl git=1:2.39.2-1\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].rule, "unpinned-inventory");
        assert_eq!(found[0].line, 0);
        assert!(found[0].message.starts_with("1 of 2"));
    }
}
