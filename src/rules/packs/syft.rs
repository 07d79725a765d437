//! Inventory notes in the style of a syft SBOM: which package managers and
//! base images the build pulls from.

use std::collections::BTreeMap;

use crate::dockerfile::{
    external_base_images, extract_package_installs, BuildFileModel, PackageManager,
};
use crate::rules::pack::{deferred, Findings, RulePack};
use crate::rules::{Finding, Severity};

use super::is_package_name;

const PACK: &str = "syft";

pub struct SyftPack;

impl RulePack for SyftPack {
    fn name(&self) -> &'static str {
        PACK
    }

    fn description(&self) -> &'static str {
        "Inventory: packages per manager and external base images"
    }

    fn check<'a>(&'a self, model: &'a BuildFileModel) -> Findings<'a> {
        Box::new(
            deferred(move || package_summary(model))
                .chain(deferred(move || base_image_summary(model))),
        )
    }
}

fn package_summary(model: &BuildFileModel) -> Vec<Finding> {
    // manager -> (first line, package names)
    let mut by_manager: BTreeMap<PackageManager, (usize, Vec<String>)> = BTreeMap::new();
    for install in extract_package_installs(model)
        .into_iter()
        .filter(is_package_name)
    {
        let entry = by_manager
            .entry(install.manager)
            .or_insert_with(|| (install.line, Vec::new()));
        entry.1.push(install.package);
    }

    by_manager
        .into_iter()
        .map(|(manager, (line, packages))| {
            Finding::new(
                PACK,
                "package-summary",
                Severity::Info,
                model,
                line,
                format!(
                    "{} installs {} package(s): {}",
                    manager,
                    packages.len(),
                    packages.join(", ")
                ),
            )
        })
        .collect()
}

fn base_image_summary(model: &BuildFileModel) -> Option<Finding> {
    let images: Vec<String> = external_base_images(model)
        .iter()
        .map(|image| image.to_string())
        .collect();
    if images.is_empty() {
        return None;
    }
    Some(Finding::new(
        PACK,
        "base-images",
        Severity::Info,
        model,
        0,
        format!("built from {}", images.join(", ")),
    ))
}
