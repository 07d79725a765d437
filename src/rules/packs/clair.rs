//! Vulnerability heuristics in the spirit of clair: end-of-life base images
//! and packages with a long CVE history installed without a pinned version.

use once_cell::sync::Lazy;
use phf::phf_set;

use crate::dockerfile::{external_base_images, extract_package_installs, BuildFileModel, ImageRef};
use crate::rules::pack::{deferred, Findings, RulePack};
use crate::rules::{Finding, Severity};

const PACK: &str = "clair";

/// Base images past end of life: (short name, tags, label).
/// An empty tag list means every tag.
static END_OF_LIFE: Lazy<Vec<(&'static str, Vec<&'static str>, &'static str)>> = Lazy::new(|| {
    vec![
        ("ubuntu", vec!["12.04", "14.04", "16.04", "18.04", "trusty", "xenial", "bionic"], "Ubuntu"),
        ("debian", vec!["7", "8", "9", "wheezy", "jessie", "stretch"], "Debian"),
        ("centos", vec![], "CentOS Linux"),
        ("alpine", vec!["3.12", "3.13", "3.14", "3.15", "3.16"], "Alpine"),
        ("python", vec!["2", "3.6", "3.7"], "Python"),
        ("node", vec!["8", "10", "12", "14", "16"], "Node.js"),
        ("php", vec!["5", "7"], "PHP"),
        ("golang", vec!["1.16", "1.17", "1.18", "1.19"], "Go"),
    ]
});

static RISKY_PACKAGES: phf::Set<&'static str> = phf_set! {
    "openssl",
    "imagemagick",
    "ghostscript",
    "telnet",
    "telnetd",
    "netcat",
    "netcat-traditional",
    "ftp",
    "rsh-client",
    "openssh-server",
};

pub struct ClairPack;

impl RulePack for ClairPack {
    fn name(&self) -> &'static str {
        PACK
    }

    fn description(&self) -> &'static str {
        "Vulnerability heuristics: end-of-life base images, unpinned high-risk packages"
    }

    fn check<'a>(&'a self, model: &'a BuildFileModel) -> Findings<'a> {
        Box::new(
            deferred(move || end_of_life_bases(model))
                .chain(deferred(move || risky_packages(model))),
        )
    }
}

/// `tag` equals `release` or extends it with `.` or `-` (`18.04.1`, `12-alpine`).
fn tag_matches(tag: &str, release: &str) -> bool {
    match tag.strip_prefix(release) {
        Some("") => true,
        Some(rest) => rest.starts_with('.') || rest.starts_with('-'),
        None => false,
    }
}

fn end_of_life_label(image: &ImageRef) -> Option<&'static str> {
    let name = image.short_name().to_ascii_lowercase();
    END_OF_LIFE
        .iter()
        .find(|(eol_name, releases, _)| {
            *eol_name == name
                && (releases.is_empty()
                    || image
                        .tag
                        .as_deref()
                        .map_or(false, |tag| releases.iter().any(|r| tag_matches(tag, r))))
        })
        .map(|(_, _, label)| *label)
}

fn end_of_life_bases(model: &BuildFileModel) -> Vec<Finding> {
    external_base_images(model)
        .into_iter()
        .filter_map(|image| {
            end_of_life_label(&image).map(|label| {
                Finding::new(
                    PACK,
                    "eol-base-image",
                    Severity::Warning,
                    model,
                    image.line,
                    format!(
                        "base image {} is an end-of-life {} release and no longer gets security fixes",
                        image, label
                    ),
                )
            })
        })
        .collect()
}

fn is_risky(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    RISKY_PACKAGES.contains(name.as_str()) || name.starts_with("libssl")
}

fn risky_packages(model: &BuildFileModel) -> Vec<Finding> {
    extract_package_installs(model)
        .into_iter()
        .filter(|p| !p.version_pinned && is_risky(p.name()))
        .map(|p| {
            Finding::new(
                PACK,
                "risky-package",
                Severity::Warning,
                model,
                p.line,
                format!(
                    "{} has a long CVE history; pin a patched version",
                    p.name()
                ),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(content: &str) -> Vec<(String, usize)> {
        let model = BuildFileModel::parse_content("/repo/Dockerfile", content);
        ClairPack.check(&model).map(|f| (f.rule, f.line)).collect()
    }

    #[test]
    fn test_tag_matches() {
        assert!(tag_matches("18.04", "18.04"));
        assert!(tag_matches("12-alpine", "12"));
        assert!(tag_matches("2.7.18", "2"));
        assert!(!tag_matches("120", "12"));
        assert!(!tag_matches("3.120", "3.12"));
    }

    #[test]
    fn test_end_to_end_fixture() {
        let found = rules(
            "FROM ubuntu:18.04\nRUN apt-get install -y openssl curl\nENV API_KEY=abcd1234\nEXPOSE 22 2375/tcp\nUSER root\n",
        );
        assert_eq!(
            found,
            vec![
                ("eol-base-image".to_string(), 1),
                ("risky-package".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_eol_images() {
        let found = rules(
            "FROM node:12-alpine AS build\nFROM docker.io/library/python:2.7\nFROM centos\nFROM node:20\nFROM build\n",
        );
        let lines: Vec<usize> = found.iter().map(|(_, l)| *l).collect();
        assert_eq!(lines, vec![1, 2, 3]);
    }

    #[test]
    fn test_pinned_risky_package_is_fine() {
        let found = rules("FROM debian:12\nRUN apt-get install -y openssl=3.0.11-1 libssl3 telnet=0.17\n");
        assert_eq!(found, vec![("risky-package".to_string(), 2)]);
    }
}
