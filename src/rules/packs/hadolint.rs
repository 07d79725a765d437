//! Lint checks modelled on the common hadolint DL rules.

use regex::Regex;

use crate::dockerfile::{
    detect_curl_pipe_sh, detect_wget_pipe_sh, extract_package_installs, find_commands,
    instructions_of, BuildFileModel,
};
use crate::rules::pack::{deferred, Findings, RulePack};
use crate::rules::{Finding, Severity};

use super::{is_package_name, run_findings};

const PACK: &str = "hadolint";

lazy_static::lazy_static! {
    static ref APT_INSTALL: Regex = Regex::new(r"(?i)\bapt(?:-get)?\s+install\b").unwrap();
    static ref PIP_INSTALL: Regex = Regex::new(r"(?i)\bpip3?\s+install\b").unwrap();
    static ref APK_ADD: Regex = Regex::new(r"(?i)\bapk\s+add\b").unwrap();
    static ref APT_KEY: Regex = Regex::new(r"(?i)\bapt-key\s+add\b").unwrap();
    static ref CHMOD_777: Regex = Regex::new(r"\bchmod\s+(?:-R\s+)?0?777\b").unwrap();
    static ref CD_COMMAND: Regex = Regex::new(r"(?:^|&&|;|\|\|)\s*cd\s").unwrap();
}

pub struct HadolintPack;

impl RulePack for HadolintPack {
    fn name(&self) -> &'static str {
        PACK
    }

    fn description(&self) -> &'static str {
        "Dockerfile lint: version pinning, pipe-to-shell, package manager caches, deprecated syntax"
    }

    fn check<'a>(&'a self, model: &'a BuildFileModel) -> Findings<'a> {
        Box::new(
            deferred(move || unpinned_packages(model))
                .chain(deferred(move || pipe_to_shell(model)))
                .chain(deferred(move || missing_flag(
                    model,
                    &APT_INSTALL,
                    "--no-install-recommends",
                    "no-install-recommends",
                    "apt install without --no-install-recommends pulls in extra packages",
                )))
                .chain(deferred(move || missing_flag(
                    model,
                    &PIP_INSTALL,
                    "--no-cache-dir",
                    "pip-no-cache-dir",
                    "pip install without --no-cache-dir keeps the wheel cache in the layer",
                )))
                .chain(deferred(move || missing_flag(
                    model,
                    &APK_ADD,
                    "--no-cache",
                    "apk-no-cache",
                    "apk add without --no-cache keeps the index in the layer",
                )))
                .chain(deferred(move || {
                    run_findings(
                        model,
                        &APT_KEY,
                        (PACK, "apt-key", Severity::Warning),
                        "apt-key is deprecated; use a keyring file with signed-by",
                    )
                }))
                .chain(deferred(move || {
                    run_findings(
                        model,
                        &CHMOD_777,
                        (PACK, "chmod-777", Severity::Warning),
                        "chmod 777 makes files world-writable",
                    )
                }))
                .chain(deferred(move || {
                    run_findings(
                        model,
                        &CD_COMMAND,
                        (PACK, "cd-in-run", Severity::Info),
                        "use WORKDIR instead of cd in RUN",
                    )
                }))
                .chain(deferred(move || maintainer(model))),
        )
    }
}

fn unpinned_packages(model: &BuildFileModel) -> Vec<Finding> {
    extract_package_installs(model)
        .into_iter()
        .filter(|p| !p.version_pinned && is_package_name(p))
        .map(|p| {
            Finding::new(
                PACK,
                "unpinned-package",
                Severity::Warning,
                model,
                p.line,
                format!("{} package {} is not version-pinned", p.manager, p.package),
            )
        })
        .collect()
}

fn pipe_to_shell(model: &BuildFileModel) -> Vec<Finding> {
    let curl = detect_curl_pipe_sh(model).into_iter().map(|run| {
        Finding::new(
            PACK,
            "curl-pipe-shell",
            Severity::Error,
            model,
            run.line,
            "curl output piped into a shell runs unverified code",
        )
    });
    let wget = detect_wget_pipe_sh(model).into_iter().map(|run| {
        Finding::new(
            PACK,
            "wget-pipe-shell",
            Severity::Error,
            model,
            run.line,
            "wget output piped into a shell runs unverified code",
        )
    });
    curl.chain(wget).collect()
}

fn missing_flag(
    model: &BuildFileModel,
    command: &Regex,
    flag: &str,
    rule: &str,
    message: &str,
) -> Vec<Finding> {
    find_commands(model, command)
        .into_iter()
        .filter(|run| !run.value.contains(flag))
        .map(|run| Finding::new(PACK, rule, Severity::Info, model, run.line, message))
        .collect()
}

fn maintainer(model: &BuildFileModel) -> Vec<Finding> {
    instructions_of(model, "MAINTAINER")
        .into_iter()
        .map(|i| {
            Finding::new(
                PACK,
                "maintainer-deprecated",
                Severity::Info,
                model,
                i.line,
                "MAINTAINER is deprecated; use LABEL org.opencontainers.image.authors",
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(content: &str) -> Vec<(String, usize)> {
        let model = BuildFileModel::parse_content("/repo/Dockerfile", content);
        HadolintPack
            .check(&model)
            .map(|f| (f.rule, f.line))
            .collect()
    }

    fn has(found: &[(String, usize)], rule: &str, line: usize) -> bool {
        found.iter().any(|(r, l)| r == rule && *l == line)
    }

    #[test]
    fn test_unpinned_packages() {
        let found = rules(
            "FROM ubuntu:22.04\nRUN apt-get install -y --no-install-recommends curl=7.81.0 git\n",
        );
        assert_eq!(found, vec![("unpinned-package".to_string(), 2)]);
    }

    #[test]
    fn test_requirements_file_is_not_a_package() {
        let found = rules("FROM python:3.12\nRUN pip install --no-cache-dir -r requirements.txt\n");
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_pipe_to_shell() {
        let found = rules(
            "FROM alpine:3.19\nRUN curl -sSL https://x.example/i.sh | sh\nRUN wget -qO- https://x.example/i.sh | bash\n",
        );
        assert!(has(&found, "curl-pipe-shell", 2));
        assert!(has(&found, "wget-pipe-shell", 3));
    }

    #[test]
    fn test_missing_cache_flags() {
        let found = rules(
            "FROM alpine:3.19\nRUN apk add git=2.43.0-r0\nRUN pip install flask==3.0.0\nRUN apt-get install -y vim=2:9.0\n",
        );
        assert!(has(&found, "apk-no-cache", 2));
        assert!(has(&found, "pip-no-cache-dir", 3));
        assert!(has(&found, "no-install-recommends", 4));
        assert!(!found.iter().any(|(r, _)| r == "unpinned-package"));
    }

    #[test]
    fn test_command_idioms() {
        let found = rules(
            "FROM debian:12\nMAINTAINER someone@example.org\nRUN apt-key add /tmp/key.gpg\nRUN chmod -R 777 /srv\nRUN cd /src && make\n",
        );
        assert!(has(&found, "maintainer-deprecated", 2));
        assert!(has(&found, "apt-key", 3));
        assert!(has(&found, "chmod-777", 4));
        assert!(has(&found, "cd-in-run", 5));
    }

    #[test]
    fn test_clean_file() {
        let found = rules(
            "FROM alpine:3.19\nWORKDIR /app\nRUN apk add --no-cache tini=0.19.0-r1\nRUN chmod 755 /app\n",
        );
        assert!(found.is_empty(), "{:?}", found);
    }
}
