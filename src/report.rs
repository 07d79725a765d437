//! Output formatting for audit results.
//!
//! Supports four output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: structured output for programmatic consumption
//! - SARIF: Static Analysis Results Interchange Format for IDE/CI integration
//! - Lines: one `<path>: <message>` line per finding

use colored::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::rules::{display_path, find_pack, AuditResult, Finding, Severity, SuppressionType};

// =============================================================================
// JSON Format
// =============================================================================

/// Top-level JSON report.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    pub fail_on: Severity,
    pub passed: bool,
    pub files_scanned: usize,
    pub findings: Vec<JsonFinding>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressed: Vec<JsonSuppressedFinding>,
    pub suppressed_count: usize,
    pub summary: JsonSummary,
}

/// A finding with its path relative to the scanned root.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonFinding {
    /// `pack/rule`
    pub id: String,
    pub pack: String,
    pub rule: String,
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub message: String,
}

/// Suppressed finding with suppression info.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonSuppressedFinding {
    pub finding: JsonFinding,
    pub target: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(rename = "type")]
    pub suppression_type: SuppressionType,
}

/// Finding counts by severity and by pack.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JsonSummary {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
    pub by_pack: BTreeMap<String, usize>,
}

fn finding_to_json(root: &Path, f: &Finding) -> JsonFinding {
    JsonFinding {
        id: f.id(),
        pack: f.pack.clone(),
        rule: f.rule.clone(),
        severity: f.severity,
        file: display_path(root, &f.path),
        line: f.line,
        message: f.message.clone(),
    }
}

/// Build the JSON report for `result`.
pub fn json_report(
    path: &str,
    config_path: Option<&Path>,
    result: &AuditResult,
    fail_on: Severity,
) -> JsonReport {
    let mut summary = JsonSummary {
        error: result.count(Severity::Error),
        warning: result.count(Severity::Warning),
        info: result.count(Severity::Info),
        ..Default::default()
    };
    for f in &result.findings {
        *summary.by_pack.entry(f.pack.clone()).or_default() += 1;
    }

    JsonReport {
        version: env!("CARGO_PKG_VERSION").to_string(),
        path: path.to_string(),
        config: config_path.map(|p| p.to_string_lossy().to_string()),
        fail_on,
        passed: !result.has_at_least(fail_on),
        files_scanned: result.scanned,
        findings: result
            .findings
            .iter()
            .map(|f| finding_to_json(&result.root, f))
            .collect(),
        suppressed: result
            .suppressed
            .iter()
            .map(|sf| JsonSuppressedFinding {
                finding: finding_to_json(&result.root, &sf.finding),
                target: sf.suppression.target.clone(),
                reason: sf.suppression.reason.clone(),
                suppression_type: sf.suppression.suppression_type,
            })
            .collect(),
        suppressed_count: result.suppressed.len(),
        summary,
    }
}

/// Write results in JSON format.
pub fn write_json(
    path: &str,
    config_path: Option<&Path>,
    result: &AuditResult,
    fail_on: Severity,
) -> anyhow::Result<()> {
    let report = json_report(path, config_path, result, fail_on);
    let json = serde_json::to_string_pretty(&report)?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// SARIF Format
// =============================================================================

const SARIF_VERSION: &str = "2.1.0";
const SARIF_SCHEMA: &str = "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/master/Schemata/sarif-schema-2.1.0.json";
const TOOL_NAME: &str = "dockaudit";
const INFO_URI: &str = "https://github.com/zen-systems/dockaudit";

#[derive(Serialize, Deserialize)]
pub struct SarifReport {
    version: String,
    #[serde(rename = "$schema")]
    schema: String,
    runs: Vec<SarifRun>,
}

#[derive(Serialize, Deserialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize, Deserialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize, Deserialize)]
struct SarifDriver {
    name: String,
    version: String,
    #[serde(rename = "informationUri")]
    information_uri: String,
    rules: Vec<SarifRule>,
}

#[derive(Serialize, Deserialize)]
struct SarifRule {
    id: String,
    name: String,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "helpUri", skip_serializing_if = "Option::is_none")]
    help_uri: Option<String>,
    #[serde(rename = "defaultConfiguration")]
    default_config: SarifRuleConfig,
}

#[derive(Serialize, Deserialize)]
struct SarifRuleConfig {
    level: String,
}

#[derive(Serialize, Deserialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: String,
    message: SarifMessage,
    locations: Vec<SarifLocation>,
}

#[derive(Serialize, Deserialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize, Deserialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysicalLocation,
}

#[derive(Serialize, Deserialize)]
struct SarifPhysicalLocation {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifact,
    region: SarifRegion,
}

#[derive(Serialize, Deserialize)]
struct SarifArtifact {
    uri: String,
}

#[derive(Serialize, Deserialize)]
struct SarifRegion {
    #[serde(rename = "startLine")]
    start_line: usize,
}

fn map_severity_to_level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
        Severity::Info => "note",
    }
}

/// `unpinned-package` -> `UnpinnedPackage`
fn pascal_case(rule: &str) -> String {
    rule.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Build the SARIF log for `result`.
pub fn sarif_report(result: &AuditResult) -> SarifReport {
    // One rule entry per id, at the highest severity it was reported with
    let mut rule_levels: BTreeMap<String, (&Finding, Severity)> = BTreeMap::new();
    for f in &result.findings {
        let entry = rule_levels.entry(f.id()).or_insert((f, f.severity));
        entry.1 = entry.1.max(f.severity);
    }

    let rules: Vec<SarifRule> = rule_levels
        .iter()
        .map(|(id, (f, severity))| SarifRule {
            id: id.clone(),
            name: pascal_case(&f.rule),
            short_description: SarifMessage {
                text: find_pack(&f.pack)
                    .map(|p| p.description().to_string())
                    .unwrap_or_else(|| f.pack.clone()),
            },
            help_uri: Some(format!("{}#{}", INFO_URI, f.pack)),
            default_config: SarifRuleConfig {
                level: map_severity_to_level(*severity).to_string(),
            },
        })
        .collect();

    let results: Vec<SarifResult> = result
        .findings
        .iter()
        .map(|f| SarifResult {
            rule_id: f.id(),
            level: map_severity_to_level(f.severity).to_string(),
            message: SarifMessage {
                text: f.message.clone(),
            },
            locations: vec![SarifLocation {
                physical_location: SarifPhysicalLocation {
                    artifact_location: SarifArtifact {
                        uri: display_path(&result.root, &f.path),
                    },
                    region: SarifRegion {
                        start_line: if f.line > 0 { f.line } else { 1 },
                    },
                },
            }],
        })
        .collect();

    SarifReport {
        version: SARIF_VERSION.to_string(),
        schema: SARIF_SCHEMA.to_string(),
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: TOOL_NAME.to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    information_uri: INFO_URI.to_string(),
                    rules,
                },
            },
            results,
        }],
    }
}

/// Write results in SARIF format.
pub fn write_sarif(result: &AuditResult) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&sarif_report(result))?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Lines Format
// =============================================================================

/// Write one `<path>: <message>` line per finding.
pub fn write_lines(result: &AuditResult) {
    for line in result.lines() {
        println!("{}", line);
    }
}

// =============================================================================
// Pretty Format
// =============================================================================

/// Write results in pretty (human-readable) format.
pub fn write_pretty(
    path: &str,
    config_path: Option<&Path>,
    result: &AuditResult,
    fail_on: Severity,
    show_suppressed: bool,
) {
    // Header
    println!();
    print!("  ");
    print!("{}", "dockaudit".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", path);
    if let Some(config) = config_path {
        print!("  {}", "Config:   ".dimmed());
        println!("{}", config.display());
    }
    print!("  {}", "Files:    ".dimmed());
    println!("{}", result.scanned);
    println!();

    let passed = !result.has_at_least(fail_on);
    write_result_summary(result, passed);
    println!();

    if !result.findings.is_empty() {
        write_findings(&result.root, &result.findings);
        println!();
    }

    if !result.suppressed.is_empty() {
        write_suppressed_summary(result, show_suppressed);
        println!();
    }

    print!("  {}", format!("Fail on: {}", fail_on).dimmed());
    print!("  ");
    if passed {
        println!("{}", "PASSED".green());
    } else {
        println!("{}", "FAILED".red());
    }
    println!();
}

fn write_result_summary(result: &AuditResult, passed: bool) {
    if passed {
        print!("  {}", "✓ PASS".green());
    } else {
        print!("  {}", "✗ FAIL".red());
    }

    print!(
        "  {} ",
        result.count(Severity::Error).to_string().red().bold()
    );
    print!("errors  ");
    print!("{} ", result.count(Severity::Warning).to_string().yellow());
    print!("warnings  ");
    print!("{} ", result.count(Severity::Info).to_string().blue());
    print!("info");

    if !result.suppressed.is_empty() {
        print!(
            "  {}",
            format!("({} suppressed)", result.suppressed.len()).dimmed()
        );
    }

    println!();
}

fn write_findings(root: &Path, findings: &[Finding]) {
    println!("  {} ({}):", "Findings".bold(), findings.len());
    println!();

    for f in findings {
        write_severity_tag(f.severity);
        print!("   ");
        print!("{:<32}", f.id().dimmed());
        print!("{}", display_path(root, &f.path).blue());
        if f.line > 0 {
            print!("{}", format!(":{}", f.line).dimmed());
        }
        println!();

        // Message on next line, indented
        println!("            {}", f.message);
        println!();
    }
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
        Severity::Info => print!("    {} ", "INFO ".blue()),
    }
}

fn write_suppressed_summary(result: &AuditResult, show_details: bool) {
    println!("  {} ({}):", "Suppressed".dimmed(), result.suppressed.len());

    if !show_details {
        println!("    {}", "(use --show-suppressed to see details)".dimmed());
        return;
    }

    println!();
    for sf in &result.suppressed {
        let f = &sf.finding;
        let s = &sf.suppression;

        print!("    {:<32}", f.id().dimmed());
        print!("{}", display_path(&result.root, &f.path).blue());
        if s.suppression_type == SuppressionType::File {
            print!("{}", ":* (file)".dimmed());
        } else if f.line > 0 {
            print!("{}", format!(":{}", f.line).dimmed());
        }
        println!();

        if !s.reason.is_empty() {
            println!("            {}", format!("reason: {:?}", s.reason).dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dockerfile::BuildFileModel;

    fn sample_result() -> AuditResult {
        let model = BuildFileModel::parse_content("/repo/api/Dockerfile", "FROM ubuntu");
        let mut result = AuditResult::new("/repo");
        result.scanned = 1;
        result.findings = vec![
            Finding::new("anchore", "root-user", Severity::Error, &model, 0, "runs as root"),
            Finding::new("hadolint", "unpinned-package", Severity::Warning, &model, 3, "curl"),
            Finding::new("hadolint", "unpinned-package", Severity::Warning, &model, 4, "git"),
        ];
        result
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(pascal_case("unpinned-package"), "UnpinnedPackage");
        assert_eq!(pascal_case("chmod-777"), "Chmod777");
        assert_eq!(pascal_case("root_user"), "RootUser");
    }

    #[test]
    fn test_json_report() {
        let report = json_report("/repo", None, &sample_result(), Severity::Error);
        assert!(!report.passed);
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.findings[0].file, "api/Dockerfile");
        assert_eq!(report.findings[0].id, "anchore/root-user");
        assert_eq!(report.summary.error, 1);
        assert_eq!(report.summary.warning, 2);
        assert_eq!(report.summary.by_pack.get("hadolint"), Some(&2));
        assert!(report.config.is_none());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["findings"][1]["severity"], "warning");
        assert!(json.get("suppressed").is_none());
    }

    #[test]
    fn test_sarif_report() {
        let sarif = serde_json::to_value(sarif_report(&sample_result())).unwrap();
        assert_eq!(sarif["version"], "2.1.0");

        let rules = sarif["runs"][0]["tool"]["driver"]["rules"].as_array().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0]["id"], "anchore/root-user");
        assert_eq!(rules[1]["name"], "UnpinnedPackage");
        assert_eq!(rules[1]["defaultConfiguration"]["level"], "warning");

        let results = sarif["runs"][0]["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        // File-level findings are anchored to line 1
        assert_eq!(
            results[0]["locations"][0]["physicalLocation"]["region"]["startLine"],
            1
        );
        assert_eq!(
            results[0]["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "api/Dockerfile"
        );
    }
}
