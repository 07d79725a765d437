//! Supply-chain metadata checks: what a signing and provenance workflow
//! such as cosign expects to find in the build file.

use crate::dockerfile::{external_base_images, BuildFileModel};
use crate::rules::pack::{deferred, Findings, RulePack};
use crate::rules::{Finding, Severity};

const PACK: &str = "cosign";

const SOURCE_LABEL: &str = "org.opencontainers.image.source";
const REVISION_LABEL: &str = "org.opencontainers.image.revision";

pub struct CosignPack;

impl RulePack for CosignPack {
    fn name(&self) -> &'static str {
        PACK
    }

    fn description(&self) -> &'static str {
        "Signing metadata: OCI provenance labels, digest-pinned base images"
    }

    fn check<'a>(&'a self, model: &'a BuildFileModel) -> Findings<'a> {
        Box::new(
            deferred(move || missing_label(model, SOURCE_LABEL, "missing-source-label"))
                .chain(deferred(move || {
                    missing_label(model, REVISION_LABEL, "missing-revision-label")
                }))
                .chain(deferred(move || unpinned_digests(model))),
        )
    }
}

fn missing_label(model: &BuildFileModel, label: &str, rule: &str) -> Option<Finding> {
    if model.base_images().is_empty() || model.labels().contains_key(label) {
        return None;
    }
    Some(Finding::new(
        PACK,
        rule,
        Severity::Info,
        model,
        0,
        format!("no {} label; signatures cannot be traced to a source", label),
    ))
}

fn unpinned_digests(model: &BuildFileModel) -> Vec<Finding> {
    external_base_images(model)
        .into_iter()
        .filter(|image| image.digest.is_none())
        .map(|image| {
            Finding::new(
                PACK,
                "unsigned-base",
                Severity::Warning,
                model,
                image.line,
                format!(
                    "base image {} is not pinned by digest; its signature cannot be verified",
                    image
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
        CosignPack.check(&model).map(|f| (f.rule, f.line)).collect()
    }

    #[test]
    fn test_missing_labels_and_digest() {
        let found = rules("FROM alpine:3.19\n");
        assert_eq!(
            found,
            vec![
                ("missing-source-label".to_string(), 0),
                ("missing-revision-label".to_string(), 0),
                ("unsigned-base".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_fully_attested() {
        let found = rules(
            "FROM alpine:3.19@sha256:51b67269f354137895d43f3b3d810bfacd3945438e94dc5ac55fdac340352f48\n\
             LABEL org.opencontainers.image.source=https://example.org/app \\\n      org.opencontainers.image.revision=abc123\n",
        );
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_stage_references_not_flagged() {
        let found = rules(
            "FROM golang:1.22@sha256:aaaa AS build\nFROM scratch\nCOPY --from=build /app /app\n\
             LABEL org.opencontainers.image.source=x org.opencontainers.image.revision=y\n",
        );
        assert!(found.is_empty(), "{:?}", found);
    }

    #[test]
    fn test_empty_file() {
        assert!(rules("").is_empty());
    }
}
