//! Audit runner that loads build files and applies the selected rule packs.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::dockerfile::{load_build_files, with_jobs, BuildFileModel, BuildFileTarget, LoadOptions};

use super::{
    filter_suppressed, parse_suppressions, registry, AuditResult, Finding, RulePack, Severity,
    Suppression,
};

/// Executes rule packs against every build file under a target.
pub struct Runner {
    packs: Vec<&'static dyn RulePack>,
    disabled: HashSet<String>,
    severity_overrides: HashMap<String, Severity>,
    load_options: LoadOptions,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    /// Create a runner with every built-in pack enabled.
    pub fn new() -> Self {
        Self {
            packs: registry().to_vec(),
            disabled: HashSet::new(),
            severity_overrides: HashMap::new(),
            load_options: LoadOptions::default(),
        }
    }

    /// Restrict the run to these packs.
    pub fn packs(mut self, packs: Vec<&'static dyn RulePack>) -> Self {
        self.packs = packs;
        self
    }

    /// Drop findings whose `pack/rule` id, or whole pack, is listed.
    pub fn disable<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.disabled
            .extend(ids.into_iter().map(|id| id.as_ref().to_ascii_lowercase()));
        self
    }

    /// Replace the severity of findings by `pack/rule` id.
    pub fn severity_overrides(mut self, overrides: HashMap<String, Severity>) -> Self {
        self.severity_overrides = overrides
            .into_iter()
            .map(|(id, severity)| (id.to_ascii_lowercase(), severity))
            .collect();
        self
    }

    pub fn load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = options;
        self
    }

    /// Run the selected packs over one model, applying disables and overrides.
    pub fn check_model(&self, model: &BuildFileModel) -> Vec<Finding> {
        self.packs
            .iter()
            .flat_map(|pack| pack.check(model))
            .filter(|f| !self.is_disabled(f))
            .map(|mut f| {
                if let Some(severity) = self.severity_overrides.get(&f.id().to_ascii_lowercase()) {
                    f.severity = *severity;
                }
                f
            })
            .collect()
    }

    fn is_disabled(&self, finding: &Finding) -> bool {
        self.disabled.contains(&finding.pack.to_ascii_lowercase())
            || self.disabled.contains(&finding.id().to_ascii_lowercase())
    }

    /// Load every build file under `target` and audit it.
    ///
    /// Findings come back sorted by path, line, pack and rule regardless of
    /// the order files were parsed in.
    pub fn run(&self, target: &BuildFileTarget) -> AuditResult {
        let models = load_build_files(target, &self.load_options);

        let mut findings: Vec<Finding> = with_jobs(self.load_options.jobs, || {
            models
                .par_iter()
                .flat_map_iter(|model| self.check_model(model))
                .collect()
        });

        let suppressions: Vec<Suppression> = models.iter().flat_map(model_suppressions).collect();

        let mut result = AuditResult::new(target.root());
        result.scanned = models.len();
        if !suppressions.is_empty() {
            let (active, suppressed) = filter_suppressed(findings, &suppressions);
            findings = active;
            result.suppressed = suppressed;
        }

        findings.sort_by(|a, b| {
            (&a.path, a.line, &a.pack, &a.rule).cmp(&(&b.path, b.line, &b.pack, &b.rule))
        });
        result.findings = findings;

        log::info!(
            "{} finding(s), {} suppressed, across {} build file(s)",
            result.findings.len(),
            result.suppressed.len(),
            result.scanned
        );
        result
    }
}

/// Directives from the same text the model was built from.
fn model_suppressions(model: &BuildFileModel) -> Vec<Suppression> {
    parse_suppressions(model.path(), model.source())
}
