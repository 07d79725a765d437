//! Built-in rule packs.
//!
//! Each pack is named after the external scanner whose concerns it mirrors.
//! None of them call that scanner; they are heuristics over the model.

mod anchore;
mod clair;
mod cosign;
mod dockle;
mod grype;
mod hadolint;
mod snyk;
mod syft;
mod trivy;

pub use anchore::AnchorePack;
pub use clair::ClairPack;
pub use cosign::CosignPack;
pub use dockle::DocklePack;
pub use grype::GrypePack;
pub use hadolint::HadolintPack;
pub use snyk::SnykPack;
pub use syft::SyftPack;
pub use trivy::TrivyPack;

use regex::Regex;

use crate::dockerfile::{find_commands, BuildFileModel, PackageInstall};
use crate::rules::{Finding, Severity};

/// One finding per RUN instruction matching `pattern`.
pub(crate) fn run_findings(
    model: &BuildFileModel,
    pattern: &Regex,
    (pack, rule, severity): (&str, &str, Severity),
    message: &str,
) -> Vec<Finding> {
    find_commands(model, pattern)
        .into_iter()
        .map(|run| Finding::new(pack, rule, severity, model, run.line, message))
        .collect()
}

/// Tokens that are file paths, URLs or variables rather than package names.
pub(crate) fn is_package_name(install: &PackageInstall) -> bool {
    let pkg = install.package.as_str();
    !(pkg.starts_with('.')
        || pkg.starts_with('/')
        || pkg.starts_with('$')
        || pkg.contains("://")
        || pkg.ends_with(".txt")
        || pkg.ends_with(".whl")
        || pkg.ends_with(".tar.gz"))
}

/// `root`, uid 0, optionally with a group (`root:root`, `0:0`).
pub(crate) fn is_root_user(user: &str) -> bool {
    let name = user.split(':').next().unwrap_or(user).trim();
    name.eq_ignore_ascii_case("root") || name == "0"
}
