//! Build file discovery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use phf::phf_set;
use walkdir::WalkDir;

/// Directory names never descended into.
static IGNORED_DIRS: phf::Set<&'static str> = phf_set! {
    "node_modules",
    "dist",
    "build",
    ".git",
    ".hg",
    ".svn",
    ".next",
    ".turbo",
    ".cache",
    "coverage",
    "out",
    "reports",
    "tmp",
    "logs",
    "target",
    "vendor",
    "__pycache__",
};

/// What the caller asked to scan, resolved once at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildFileTarget {
    SingleFile(PathBuf),
    Directory(PathBuf),
}

impl BuildFileTarget {
    /// Resolve a user-supplied path. Returns `None` if it does not exist.
    ///
    /// The path is made absolute but symlinks are not followed, so a linked
    /// file keeps the name it was given.
    pub fn resolve<P: AsRef<Path>>(path: P) -> Option<Self> {
        let path = path.as_ref();
        let abs_path = match std::path::absolute(path) {
            Ok(p) => p,
            Err(e) => {
                log::debug!("cannot resolve {}: {}", path.display(), e);
                return None;
            }
        };

        let metadata = match std::fs::metadata(&abs_path) {
            Ok(m) => m,
            Err(e) => {
                log::debug!("cannot resolve {}: {}", path.display(), e);
                return None;
            }
        };
        if metadata.is_file() {
            Some(BuildFileTarget::SingleFile(abs_path))
        } else if metadata.is_dir() {
            Some(BuildFileTarget::Directory(abs_path))
        } else {
            None
        }
    }

    /// The directory findings are reported relative to.
    pub fn root(&self) -> &Path {
        match self {
            BuildFileTarget::SingleFile(p) => p.parent().unwrap_or(p.as_path()),
            BuildFileTarget::Directory(p) => p,
        }
    }

    /// The resolved path itself.
    pub fn path(&self) -> &Path {
        match self {
            BuildFileTarget::SingleFile(p) | BuildFileTarget::Directory(p) => p,
        }
    }
}

/// Check whether a file name looks like a Dockerfile.
///
/// Matches `Dockerfile`, `*.dockerfile` and `Dockerfile.*`, case-insensitively.
pub fn is_build_file_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "dockerfile" || lower.ends_with(".dockerfile") || lower.starts_with("dockerfile.")
}

fn is_build_file_path(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(is_build_file_name)
        .unwrap_or(false)
}

fn is_ignored_dir(name: &str, extra_ignores: &[String]) -> bool {
    let lower = name.to_lowercase();
    IGNORED_DIRS.contains(lower.as_str())
        || extra_ignores.iter().any(|d| d.eq_ignore_ascii_case(name))
}

/// Find every build file under the target.
///
/// Unreadable entries are skipped. Each file appears once, keyed by its
/// canonical path, in walk order (sorted by file name within a directory).
/// Returned paths are the ones under the target, not link destinations.
pub fn discover(target: &BuildFileTarget, extra_ignores: &[String]) -> Vec<PathBuf> {
    let root = match target {
        BuildFileTarget::SingleFile(path) => {
            return if is_build_file_path(path) {
                vec![path.clone()]
            } else {
                Vec::new()
            };
        }
        BuildFileTarget::Directory(root) => root,
    };

    let mut seen = HashSet::new();
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            !is_ignored_dir(&e.file_name().to_string_lossy(), extra_ignores)
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                log::debug!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_build_file_path(entry.path()) {
            continue;
        }

        // Canonical paths only key the de-duplication; the walked path is kept.
        let key = entry
            .path()
            .canonicalize()
            .unwrap_or_else(|_| entry.path().to_path_buf());
        if seen.insert(key) {
            files.push(entry.path().to_path_buf());
        }
    }

    files
}
