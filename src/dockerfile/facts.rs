//! Derived facts computed on demand from a [`BuildFileModel`].
//!
//! Every function here is a pure query: it never mutates the model, never
//! caches, and returns an empty result when nothing matches.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::assign::parse_assignments;
use super::model::BuildFileModel;
use super::tokenize::Instruction;

/// Package managers recognised in RUN instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Apt,
    Yum,
    Dnf,
    Apk,
    Pacman,
    Pip,
    Npm,
    Yarn,
}

lazy_static::lazy_static! {
    static ref APT_INSTALL: Regex = Regex::new(r"(?i)\bapt(?:-get)?\s+install\s+([^;&|]+)").unwrap();
    static ref YUM_INSTALL: Regex = Regex::new(r"(?i)\byum\s+install\s+([^;&|]+)").unwrap();
    static ref DNF_INSTALL: Regex = Regex::new(r"(?i)\bdnf\s+install\s+([^;&|]+)").unwrap();
    static ref APK_ADD: Regex = Regex::new(r"(?i)\bapk\s+add\s+([^;&|]+)").unwrap();
    static ref PACMAN_SYNC: Regex = Regex::new(r"\bpacman\s+-S\s+([^;&|]+)").unwrap();
    static ref PIP_INSTALL: Regex = Regex::new(r"(?i)\bpip3?\s+install\s+([^;&|]+)").unwrap();
    static ref NPM_INSTALL: Regex = Regex::new(r"(?i)\bnpm\s+install\s+([^;&|]+)").unwrap();
    static ref YARN_ADD: Regex = Regex::new(r"(?i)\byarn\s+add\s+([^;&|]+)").unwrap();

    static ref COMMAND_SEPARATOR: Regex = Regex::new(r"&&|\|\||;").unwrap();
    static ref INLINE_CONTINUATION: Regex = Regex::new(r"\\\s*").unwrap();

    static ref CURL_PIPE_SHELL: Regex =
        Regex::new(r"(?i)\bcurl\s+[^\n]+\|\s*(?:/(?:usr/)?bin/)?(?:sh|bash)\b").unwrap();
    static ref WGET_PIPE_SHELL: Regex =
        Regex::new(r"(?i)\bwget\s+[^\n]+\|\s*(?:/(?:usr/)?bin/)?(?:sh|bash)\b").unwrap();
}

impl PackageManager {
    pub const ALL: [PackageManager; 8] = [
        PackageManager::Apt,
        PackageManager::Yum,
        PackageManager::Dnf,
        PackageManager::Apk,
        PackageManager::Pacman,
        PackageManager::Pip,
        PackageManager::Npm,
        PackageManager::Yarn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Yum => "yum",
            PackageManager::Dnf => "dnf",
            PackageManager::Apk => "apk",
            PackageManager::Pacman => "pacman",
            PackageManager::Pip => "pip",
            PackageManager::Npm => "npm",
            PackageManager::Yarn => "yarn",
        }
    }

    /// Pattern whose first group captures the package list.
    fn install_pattern(&self) -> &'static Regex {
        match self {
            PackageManager::Apt => &*APT_INSTALL,
            PackageManager::Yum => &*YUM_INSTALL,
            PackageManager::Dnf => &*DNF_INSTALL,
            PackageManager::Apk => &*APK_ADD,
            PackageManager::Pacman => &*PACMAN_SYNC,
            PackageManager::Pip => &*PIP_INSTALL,
            PackageManager::Npm => &*NPM_INSTALL,
            PackageManager::Yarn => &*YARN_ADD,
        }
    }

    /// Whether versions are written `name@version` rather than `name=version`.
    fn uses_at_versions(&self) -> bool {
        matches!(self, PackageManager::Npm | PackageManager::Yarn)
    }

    /// Heuristic pin check. Over-approximates: any `=` or a trailing
    /// `@<something with a digit>` counts as pinned.
    pub fn is_version_pinned(&self, package: &str) -> bool {
        if package.contains('=') {
            return true;
        }
        if self.uses_at_versions() {
            if let Some(at) = package.rfind('@') {
                return at > 0 && package[at + 1..].chars().any(|c| c.is_ascii_digit());
            }
        }
        false
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single package named in an install command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageInstall {
    pub manager: PackageManager,
    /// Package token as written, flags removed.
    pub package: String,
    pub version_pinned: bool,
    pub line: usize,
    pub dockerfile: PathBuf,
}

impl PackageInstall {
    /// Package name without any version specifier.
    pub fn name(&self) -> &str {
        self.split_version().0
    }

    /// The pinned version, if one can be read off the token.
    pub fn version(&self) -> Option<&str> {
        self.split_version().1
    }

    fn split_version(&self) -> (&str, Option<&str>) {
        let pkg = self.package.as_str();
        if self.manager.uses_at_versions() {
            if let Some(at) = pkg.rfind('@') {
                if at > 0 {
                    return (&pkg[..at], Some(&pkg[at + 1..]));
                }
            }
            return (pkg, None);
        }
        for op in ["==", ">=", "<=", "~=", "!="] {
            if let Some((name, version)) = pkg.split_once(op) {
                return (name, Some(version));
            }
        }
        match pkg.split_once('=') {
            Some((name, version)) => (name, Some(version)),
            None => (pkg, None),
        }
    }
}

/// Every package installed by a RUN instruction, across all managers.
pub fn extract_package_installs(model: &BuildFileModel) -> Vec<PackageInstall> {
    let mut installs = Vec::new();
    for run in model.runs() {
        for segment in COMMAND_SEPARATOR.split(&run.value) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            installs.extend(parse_install_segment(segment, run.line, model));
        }
    }
    installs
}

fn parse_install_segment(segment: &str, line: usize, model: &BuildFileModel) -> Vec<PackageInstall> {
    let mut installs = Vec::new();
    for manager in PackageManager::ALL {
        let Some(caps) = manager.install_pattern().captures(segment) else {
            continue;
        };
        let Some(list) = caps.get(1) else {
            continue;
        };
        let list = INLINE_CONTINUATION.replace_all(list.as_str(), " ");
        for token in list.split_whitespace() {
            if token.starts_with('-') {
                continue;
            }
            installs.push(PackageInstall {
                manager,
                package: token.to_string(),
                version_pinned: manager.is_version_pinned(token),
                line,
                dockerfile: model.path().to_path_buf(),
            });
        }
    }
    installs
}

/// Trimmed value of the last USER instruction in the file. A bare `USER`
/// yields an empty string.
///
/// Stage boundaries are not considered: a USER in an earlier stage still
/// counts if no later stage sets one.
pub fn final_user(model: &BuildFileModel) -> Option<String> {
    model.users().last().map(|i| i.value.trim().to_string())
}

/// Numeric ports from every EXPOSE instruction, duplicates preserved.
pub fn exposed_ports(model: &BuildFileModel) -> Vec<u16> {
    exposed_port_lines(model)
        .into_iter()
        .map(|(port, _)| port)
        .collect()
}

/// Like [`exposed_ports`], paired with the line of the EXPOSE.
pub fn exposed_port_lines(model: &BuildFileModel) -> Vec<(u16, usize)> {
    model
        .exposes()
        .flat_map(|i| {
            i.value
                .split_whitespace()
                .filter_map(|token| strip_protocol(token).parse::<u16>().ok())
                .map(move |port| (port, i.line))
        })
        .collect()
}

fn strip_protocol(token: &str) -> &str {
    let lower = token.to_ascii_lowercase();
    if lower.ends_with("/tcp") || lower.ends_with("/udp") {
        &token[..token.len() - 4]
    } else {
        token
    }
}

pub fn has_healthcheck(model: &BuildFileModel) -> bool {
    model.instructions().iter().any(|i| i.kind == "HEALTHCHECK")
}

/// RUN instructions that pipe a curl download straight into a shell.
pub fn detect_curl_pipe_sh(model: &BuildFileModel) -> Vec<&Instruction> {
    find_commands(model, &CURL_PIPE_SHELL)
}

/// RUN instructions that pipe a wget download straight into a shell.
pub fn detect_wget_pipe_sh(model: &BuildFileModel) -> Vec<&Instruction> {
    find_commands(model, &WGET_PIPE_SHELL)
}

/// RUN instructions whose value matches `pattern`.
pub fn find_commands<'a>(model: &'a BuildFileModel, pattern: &Regex) -> Vec<&'a Instruction> {
    model.runs().filter(|i| pattern.is_match(&i.value)).collect()
}

/// All instructions with the given keyword, in source order.
pub fn instructions_of<'a>(model: &'a BuildFileModel, kind: &str) -> Vec<&'a Instruction> {
    model.instructions().iter().filter(|i| i.is(kind)).collect()
}

/// A single ENV/LABEL/ARG assignment with its source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub key: String,
    pub value: String,
    pub line: usize,
}

/// Every assignment made by instructions of `kind`, in source order.
///
/// ARG is supported too; `ARG NAME` without a default yields nothing.
pub fn assignments_of(model: &BuildFileModel, kind: &str) -> Vec<Assignment> {
    instructions_of(model, kind)
        .into_iter()
        .flat_map(|i| {
            parse_assignments(&i.value)
                .into_iter()
                .map(move |(key, value)| Assignment {
                    key,
                    value,
                    line: i.line,
                })
        })
        .collect()
}

/// A FROM reference split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    /// Image name including registry and namespace.
    pub name: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
    /// Stage name from `AS <alias>`.
    pub alias: Option<String>,
    /// Value of `--platform=...`.
    pub platform: Option<String>,
    pub line: usize,
}

impl ImageRef {
    pub fn parse(value: &str, line: usize) -> Option<Self> {
        let mut platform = None;
        let mut tokens = value.split_whitespace().peekable();

        while let Some(&flag) = tokens.peek() {
            if !flag.starts_with("--") {
                break;
            }
            if let Some(p) = flag.strip_prefix("--platform=") {
                platform = Some(p.to_string());
            }
            tokens.next();
        }

        let image = tokens.next()?;
        let alias = match (tokens.next(), tokens.next()) {
            (Some(kw), Some(name)) if kw.eq_ignore_ascii_case("as") => Some(name.to_string()),
            _ => None,
        };

        let (rest, digest) = match image.split_once('@') {
            Some((rest, digest)) => (rest, Some(digest.to_string())),
            None => (image, None),
        };
        // A colon after the last slash is a tag; before it, a registry port.
        let name_start = rest.rfind('/').map(|i| i + 1).unwrap_or(0);
        let (name, tag) = match rest[name_start..].rfind(':') {
            Some(i) => (
                &rest[..name_start + i],
                Some(rest[name_start + i + 1..].to_string()),
            ),
            None => (rest, None),
        };

        Some(Self {
            name: name.to_string(),
            tag,
            digest,
            alias,
            platform,
            line,
        })
    }

    pub fn is_scratch(&self) -> bool {
        self.name.eq_ignore_ascii_case("scratch")
    }

    /// Image name built from a build argument, e.g. `${BASE}`.
    pub fn is_variable(&self) -> bool {
        self.name.contains('$')
    }

    /// Last path component, e.g. `python` for `docker.io/library/python`.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Neither a tag nor a digest, or the floating `latest` tag.
    pub fn is_floating(&self) -> bool {
        self.digest.is_none() && self.tag.as_deref().map_or(true, |t| t == "latest")
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Parsed FROM references, in source order.
pub fn base_image_refs(model: &BuildFileModel) -> Vec<ImageRef> {
    instructions_of(model, "FROM")
        .into_iter()
        .filter_map(|i| ImageRef::parse(&i.value, i.line))
        .collect()
}

/// Base images that come from a registry: not `scratch`, not a reference
/// to an earlier build stage, not built from a variable.
pub fn external_base_images(model: &BuildFileModel) -> Vec<ImageRef> {
    let mut stages: Vec<String> = Vec::new();
    let mut external = Vec::new();
    for image in base_image_refs(model) {
        let is_stage = stages.iter().any(|s| s.eq_ignore_ascii_case(&image.name));
        if let Some(alias) = &image.alias {
            stages.push(alias.clone());
        }
        if is_stage || image.is_scratch() || image.is_variable() {
            continue;
        }
        external.push(image);
    }
    external
}

/// Every derived fact for one file, for display and debugging.
#[derive(Debug, Clone, Serialize)]
pub struct FactSheet {
    pub path: PathBuf,
    pub base_images: Vec<String>,
    pub final_user: Option<String>,
    pub exposed_ports: Vec<u16>,
    pub has_healthcheck: bool,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub package_installs: Vec<PackageInstall>,
    pub curl_pipe_sh_lines: Vec<usize>,
    pub wget_pipe_sh_lines: Vec<usize>,
}

impl FactSheet {
    pub fn collect(model: &BuildFileModel) -> Self {
        Self {
            path: model.path().to_path_buf(),
            base_images: model.base_images().to_vec(),
            final_user: final_user(model),
            exposed_ports: exposed_ports(model),
            has_healthcheck: has_healthcheck(model),
            env: model.env().clone(),
            labels: model.labels().clone(),
            package_installs: extract_package_installs(model),
            curl_pipe_sh_lines: detect_curl_pipe_sh(model).iter().map(|i| i.line).collect(),
            wget_pipe_sh_lines: detect_wget_pipe_sh(model).iter().map(|i| i.line).collect(),
        }
    }
}
