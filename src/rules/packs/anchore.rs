//! Policy checks in the spirit of Anchore's default policy bundle.
//!
//! | Rule | Sev | What it checks |
//! |------|-----|----------------|
//! | `root-user` | Error | Final USER is root, or no USER at all |
//! | `floating-base-image` | Warning | Base image untagged or `:latest` |
//! | `ssh-port` | Error | Port 22 exposed |
//! | `sensitive-env` | Error | ENV key names a credential and has a value |

use regex::Regex;

use crate::dockerfile::{
    assignments_of, exposed_port_lines, external_base_images, final_user, BuildFileModel,
};
use crate::rules::pack::{deferred, Findings, RulePack};
use crate::rules::{Finding, Severity};

use super::is_root_user;

const PACK: &str = "anchore";

lazy_static::lazy_static! {
    static ref SENSITIVE_KEY: Regex = Regex::new(
        r"(?i)(passw(or)?d|secret|token|api_?key|access_?key|private_?key|credential)s?$"
    ).unwrap();
}

pub struct AnchorePack;

impl RulePack for AnchorePack {
    fn name(&self) -> &'static str {
        PACK
    }

    fn description(&self) -> &'static str {
        "Policy gate: root user, floating base tags, SSH exposure, credential-named ENV"
    }

    fn check<'a>(&'a self, model: &'a BuildFileModel) -> Findings<'a> {
        Box::new(
            deferred(move || root_user(model))
                .chain(deferred(move || floating_base_images(model)))
                .chain(deferred(move || ssh_port(model)))
                .chain(deferred(move || sensitive_env(model))),
        )
    }
}

fn root_user(model: &BuildFileModel) -> Option<Finding> {
    if model.base_images().is_empty() {
        return None;
    }
    match final_user(model) {
        None => Some(Finding::new(
            PACK,
            "root-user",
            Severity::Error,
            model,
            0,
            "no USER instruction; the container runs as root",
        )),
        Some(user) if user.is_empty() || is_root_user(&user) => {
            let line = model.users().last().map(|i| i.line).unwrap_or(0);
            let message = if user.is_empty() {
                "final USER names no user; the container runs as root".to_string()
            } else {
                format!("final USER is {:?}; the container runs as root", user)
            };
            Some(Finding::new(
                PACK,
                "root-user",
                Severity::Error,
                model,
                line,
                message,
            ))
        }
        Some(_) => None,
    }
}

fn floating_base_images(model: &BuildFileModel) -> Vec<Finding> {
    external_base_images(model)
        .into_iter()
        .filter(|image| image.is_floating())
        .map(|image| {
            Finding::new(
                PACK,
                "floating-base-image",
                Severity::Warning,
                model,
                image.line,
                format!(
                    "base image {} does not pin a tag; builds are not reproducible",
                    image
                ),
            )
        })
        .collect()
}

fn ssh_port(model: &BuildFileModel) -> Option<Finding> {
    let (_, line) = exposed_port_lines(model)
        .into_iter()
        .find(|(port, _)| *port == 22)?;
    Some(Finding::new(
        PACK,
        "ssh-port",
        Severity::Error,
        model,
        line,
        "port 22 is exposed; containers should not run an SSH daemon",
    ))
}

fn sensitive_env(model: &BuildFileModel) -> Vec<Finding> {
    assignments_of(model, "ENV")
        .into_iter()
        .filter(|a| !a.value.is_empty() && SENSITIVE_KEY.is_match(&a.key))
        .map(|a| {
            Finding::new(
                PACK,
                "sensitive-env",
                Severity::Error,
                model,
                a.line,
                format!(
                    "ENV {} looks like a credential; it is baked into every image layer",
                    a.key
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
        AnchorePack
            .check(&model)
            .map(|f| (f.rule, f.line))
            .collect()
    }

    #[test]
    fn test_end_to_end_fixture() {
        let found = rules(
            "FROM ubuntu:18.04\nRUN apt-get install -y openssl curl\nENV API_KEY=abcd1234\nEXPOSE 22 2375/tcp\nUSER root\n",
        );
        assert_eq!(
            found,
            vec![
                ("root-user".to_string(), 5),
                ("ssh-port".to_string(), 4),
                ("sensitive-env".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_missing_user() {
        let found = rules("FROM alpine:3.19\nRUN true\n");
        assert_eq!(found, vec![("root-user".to_string(), 0)]);
    }

    #[test]
    fn test_uid_zero_is_root() {
        let found = rules("FROM alpine:3.19\nUSER 0:0\n");
        assert_eq!(found, vec![("root-user".to_string(), 2)]);
    }

    #[test]
    fn test_bare_user_is_root() {
        let found = rules("FROM alpine:3.19\nUSER app\nUSER\n");
        assert_eq!(found, vec![("root-user".to_string(), 3)]);
    }

    #[test]
    fn test_clean_file() {
        let found = rules("FROM alpine:3.19\nENV PATH_PREFIX=/opt\nEXPOSE 8080\nUSER app\n");
        assert!(found.is_empty());
    }

    #[test]
    fn test_floating_base_images() {
        let found = rules("FROM node AS build\nFROM build\nFROM nginx:latest\nUSER nginx\n");
        assert_eq!(
            found,
            vec![
                ("floating-base-image".to_string(), 1),
                ("floating-base-image".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_empty_credential_not_flagged() {
        let found = rules("FROM alpine:3.19\nENV DB_PASSWORD=\"\"\nUSER app\n");
        assert!(found.is_empty());
    }
}
