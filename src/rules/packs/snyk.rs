//! Dependency-hygiene checks in the style of snyk container advice.

use regex::Regex;

use crate::dockerfile::BuildFileModel;
use crate::rules::pack::{deferred, Findings, RulePack};
use crate::rules::Severity;

use super::run_findings;

const PACK: &str = "snyk";

lazy_static::lazy_static! {
    static ref INSECURE_TRANSPORT: Regex = Regex::new(
        r"(?i)--trusted-host\b|strict-ssl\s+false|--allow-untrusted\b|--no-check-certificate\b|\bcurl\b[^|;&]*\s(?:-k|--insecure)\b|sslverify\s*=\s*(?:0|false)"
    ).unwrap();
    static ref GLOBAL_INSTALL: Regex =
        Regex::new(r"(?i)\bnpm\s+(?:install|i)\s+(?:[^;&|]*\s)?(?:-g|--global)\b|\byarn\s+global\s+add\b").unwrap();
    static ref HTTP_INDEX: Regex =
        Regex::new(r"(?i)(?:--index-url|--extra-index-url|-i|--registry)[\s=]+http://").unwrap();
}

pub struct SnykPack;

impl RulePack for SnykPack {
    fn name(&self) -> &'static str {
        PACK
    }

    fn description(&self) -> &'static str {
        "Dependency hygiene: disabled TLS verification, plain-HTTP indexes, global installs"
    }

    fn check<'a>(&'a self, model: &'a BuildFileModel) -> Findings<'a> {
        Box::new(
            deferred(move || {
                run_findings(
                    model,
                    &INSECURE_TRANSPORT,
                    (PACK, "insecure-transport", Severity::Error),
                    "TLS verification is disabled for a download or package index",
                )
            })
            .chain(deferred(move || {
                run_findings(
                    model,
                    &HTTP_INDEX,
                    (PACK, "http-index", Severity::Error),
                    "package index is fetched over plain HTTP",
                )
            }))
            .chain(deferred(move || {
                run_findings(
                    model,
                    &GLOBAL_INSTALL,
                    (PACK, "global-install", Severity::Info),
                    "global package install; prefer a project-local dependency",
                )
            })),
        )
    }
}
