//! Image hygiene checks in the style of dockle's CIS-DI checkpoints.

use regex::Regex;

use crate::dockerfile::{find_commands, has_healthcheck, instructions_of, BuildFileModel};
use crate::rules::pack::{deferred, Findings, RulePack};
use crate::rules::{Finding, Severity};

use super::run_findings;

const PACK: &str = "dockle";

lazy_static::lazy_static! {
    static ref SUDO: Regex = Regex::new(r"(?:^|[\s;&|(])sudo\s").unwrap();
    static ref REMOTE_URL: Regex = Regex::new(r"(?i)\bhttps?://").unwrap();
    static ref APT_UPDATE: Regex = Regex::new(r"(?i)\bapt(?:-get)?\s+update\b").unwrap();
    static ref APT_INSTALL: Regex = Regex::new(r"(?i)\bapt(?:-get)?\s+install\b").unwrap();
    static ref CREDENTIAL_FILE: Regex = Regex::new(
        r"(?i)(?:^|[\s/])(?:\.env|\.npmrc|\.pypirc|\.netrc|\.git-credentials|id_rsa|id_ed25519|[^\s/]+\.pem|[^\s/]+\.key)(?:\s|$)"
    ).unwrap();
}

pub struct DocklePack;

impl RulePack for DocklePack {
    fn name(&self) -> &'static str {
        PACK
    }

    fn description(&self) -> &'static str {
        "Image hygiene: healthcheck, sudo, remote ADD, credential files, stale apt caches"
    }

    fn check<'a>(&'a self, model: &'a BuildFileModel) -> Findings<'a> {
        Box::new(
            deferred(move || missing_healthcheck(model))
                .chain(deferred(move || {
                    run_findings(
                        model,
                        &SUDO,
                        (PACK, "sudo", Severity::Warning),
                        "avoid sudo in RUN; switch USER instead",
                    )
                }))
                .chain(deferred(move || remote_add(model)))
                .chain(deferred(move || credential_files(model)))
                .chain(deferred(move || update_alone(model))),
        )
    }
}

fn missing_healthcheck(model: &BuildFileModel) -> Option<Finding> {
    if model.base_images().is_empty() || has_healthcheck(model) {
        return None;
    }
    Some(Finding::new(
        PACK,
        "no-healthcheck",
        Severity::Warning,
        model,
        0,
        "no HEALTHCHECK instruction",
    ))
}

fn remote_add(model: &BuildFileModel) -> Vec<Finding> {
    instructions_of(model, "ADD")
        .into_iter()
        .filter(|i| REMOTE_URL.is_match(&i.value))
        .map(|i| {
            Finding::new(
                PACK,
                "add-remote",
                Severity::Warning,
                model,
                i.line,
                "ADD fetches a remote URL without verification; download with a checksum instead",
            )
        })
        .collect()
}

fn credential_files(model: &BuildFileModel) -> Vec<Finding> {
    instructions_of(model, "COPY")
        .into_iter()
        .chain(instructions_of(model, "ADD"))
        .filter(|i| CREDENTIAL_FILE.is_match(&i.value))
        .map(|i| {
            Finding::new(
                PACK,
                "credential-file",
                Severity::Error,
                model,
                i.line,
                format!("{} copies a credential file into the image", i.kind),
            )
        })
        .collect()
}

/// `apt-get update` in a RUN that installs nothing leaves a stale cache layer.
fn update_alone(model: &BuildFileModel) -> Vec<Finding> {
    find_commands(model, &APT_UPDATE)
        .into_iter()
        .filter(|run| !APT_INSTALL.is_match(&run.value))
        .map(|run| {
            Finding::new(
                PACK,
                "update-alone",
                Severity::Warning,
                model,
                run.line,
                "apt-get update without install in the same RUN caches a stale index",
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(content: &str) -> Vec<(String, usize)> {
        let model = BuildFileModel::parse_content("/repo/Dockerfile", content);
        DocklePack.check(&model).map(|f| (f.rule, f.line)).collect()
    }

    #[test]
    fn test_missing_healthcheck() {
        assert_eq!(
            rules("FROM alpine:3.19\n"),
            vec![("no-healthcheck".to_string(), 0)]
        );
        assert!(rules("FROM alpine:3.19\nHEALTHCHECK CMD true\n").is_empty());
        assert!(rules("").is_empty());
    }

    #[test]
    fn test_sudo_and_remote_add() {
        let found = rules(
            "FROM alpine:3.19\nRUN sudo make install\nRUN echo pseudo-sudo\nADD https://x.example/a.tgz /tmp/\nADD app.tgz /srv/\nHEALTHCHECK NONE\n",
        );
        assert_eq!(
            found,
            vec![("sudo".to_string(), 2), ("add-remote".to_string(), 4)]
        );
    }

    #[test]
    fn test_credential_files() {
        let found = rules(
            "FROM node:20\nCOPY .npmrc package.json ./\nCOPY certs/server.pem /etc/ssl/\nCOPY src/ /app/src/\nADD id_rsa /root/.ssh/\nHEALTHCHECK NONE\n",
        );
        let lines: Vec<usize> = found
            .iter()
            .filter(|(r, _)| r == "credential-file")
            .map(|(_, l)| *l)
            .collect();
        assert_eq!(lines, vec![2, 3, 5]);
    }

    #[test]
    fn test_update_alone() {
        let found = rules(
            "FROM debian:12\nRUN apt-get update\nRUN apt-get update && apt-get install -y tini\nHEALTHCHECK NONE\n",
        );
        assert_eq!(found, vec![("update-alone".to_string(), 2)]);
    }
}
