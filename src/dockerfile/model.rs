//! Build-file model assembled from the instruction stream.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use rayon::prelude::*;
use thiserror::Error;

use super::assign::parse_assignments;
use super::select::{discover, BuildFileTarget};
use super::tokenize::{tokenize, Instruction};

/// Errors that can occur while reading a build file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything the rule packs know about one Dockerfile.
///
/// `instructions` is the source of truth. The other views are computed once
/// at assembly and cannot be changed independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFileModel {
    path: PathBuf,
    instructions: Vec<Instruction>,
    base_images: Vec<String>,
    runs: Vec<usize>,
    exposes: Vec<usize>,
    users: Vec<usize>,
    env: BTreeMap<String, String>,
    labels: BTreeMap<String, String>,
    /// Text the instructions were read from, comments included.
    source: String,
}

impl BuildFileModel {
    /// Fold an instruction stream into a model.
    pub fn assemble<P: Into<PathBuf>>(path: P, instructions: Vec<Instruction>) -> Self {
        let mut model = Self {
            path: path.into(),
            instructions: Vec::new(),
            base_images: Vec::new(),
            runs: Vec::new(),
            exposes: Vec::new(),
            users: Vec::new(),
            env: BTreeMap::new(),
            labels: BTreeMap::new(),
            source: String::new(),
        };

        for (idx, instruction) in instructions.iter().enumerate() {
            match instruction.kind.as_str() {
                "FROM" => model.base_images.push(instruction.value.clone()),
                "RUN" => model.runs.push(idx),
                "EXPOSE" => model.exposes.push(idx),
                "USER" => model.users.push(idx),
                // Whole-file merge, later stages overwrite earlier ones.
                "ENV" => model.env.extend(parse_assignments(&instruction.value)),
                "LABEL" => model.labels.extend(parse_assignments(&instruction.value)),
                _ => {}
            }
        }

        model.instructions = instructions;
        model
    }

    /// Tokenize and assemble file content.
    pub fn parse_content<P: Into<PathBuf>>(path: P, content: &str) -> Self {
        let mut model = Self::assemble(path, tokenize(content));
        model.source = content.to_string();
        model
    }

    /// Read and parse a file from disk.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Self, ParseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse_content(path, &content))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// One entry per FROM, in source order.
    pub fn base_images(&self) -> &[String] {
        &self.base_images
    }

    pub fn runs(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.runs.iter().map(move |&i| &self.instructions[i])
    }

    pub fn exposes(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.exposes.iter().map(move |&i| &self.instructions[i])
    }

    pub fn users(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.users.iter().map(move |&i| &self.instructions[i])
    }

    /// Merged ENV values, last write wins.
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    /// Merged LABEL values, last write wins.
    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    /// The parsed text, for reading comment directives. Empty for models
    /// assembled straight from instructions.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Options for loading every build file under a target.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Worker threads for parsing; 0 uses the rayon default.
    pub jobs: usize,
    /// Directory names to skip in addition to the built-in list.
    pub extra_ignores: Vec<String>,
    /// Paths to drop after discovery, matched against the path relative to
    /// the target root.
    pub excluded: Option<GlobSet>,
}

impl LoadOptions {
    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let Some(excluded) = &self.excluded else {
            return false;
        };
        let rel_path = path.strip_prefix(root).unwrap_or(path);
        excluded.is_match(rel_path) || excluded.is_match(path)
    }
}

/// Discover and parse every build file under `target`.
///
/// Files that cannot be read are dropped. Models come back in discovery order.
pub fn load_build_files(target: &BuildFileTarget, options: &LoadOptions) -> Vec<BuildFileModel> {
    let root = target.root();
    let paths: Vec<PathBuf> = discover(target, &options.extra_ignores)
        .into_iter()
        .filter(|p| {
            let excluded = options.is_excluded(root, p);
            if excluded {
                log::debug!("excluded by config: {}", p.display());
            }
            !excluded
        })
        .collect();

    let parse_all = || -> Vec<BuildFileModel> {
        paths
            .par_iter()
            .filter_map(|p| match BuildFileModel::parse_file(p) {
                Ok(model) => Some(model),
                Err(e) => {
                    log::debug!("skipping build file: {}", e);
                    None
                }
            })
            .collect()
    };

    let models = with_jobs(options.jobs, parse_all);

    log::info!(
        "parsed {} of {} build files under {}",
        models.len(),
        paths.len(),
        target.path().display()
    );
    models
}

/// Run `op` on a pool of `jobs` threads, or the global pool when `jobs` is 0.
pub fn with_jobs<R, F>(jobs: usize, op: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    if jobs == 0 {
        return op();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => pool.install(op),
        Err(e) => {
            log::warn!("falling back to the global thread pool: {}", e);
            op()
        }
    }
}

/// Resolve a path and load every build file under it.
///
/// A path that does not exist yields no models.
pub fn load_path<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Vec<BuildFileModel> {
    match BuildFileTarget::resolve(path) {
        Some(target) => load_build_files(&target, options),
        None => Vec::new(),
    }
}
