// Path utilities for tree traversal, ignore filtering and output naming
// All functions are pure apart from walk_tree, which reads the filesystem

use jwalk::{Parallelism, WalkDir};
use regex::{Regex, RegexSet};
use std::ffi::OsStr;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::error::{Result, SyncError};

/// Directories created by version control software. Never descended into.
pub const VCS_DIRS: &[&str] = &[".git", ".svn", ".hg", ".bzr"];

/// Suffix inserted before the extension of a minified file.
pub const MINIFIED_SUFFIX: &str = "-min";

fn is_vcs_dir(name: &OsStr) -> bool {
    name.to_str().is_some_and(|name| VCS_DIRS.contains(&name))
}

/// Recursively list every regular file under `root`, sorted.
///
/// VCS metadata directories are pruned before they are read, so their
/// contents are never visited.
pub fn walk_tree(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry_result in WalkDir::new(root)
        .parallelism(Parallelism::RayonNewPool(0))
        .skip_hidden(false)
        .follow_links(false)
        .sort(true)
        .process_read_dir(|_depth, _path, _state, children| {
            children.retain(|child| match child {
                Ok(entry) => !(entry.file_type().is_dir() && is_vcs_dir(entry.file_name())),
                Err(_) => true,
            });
        })
    {
        let entry = entry_result.map_err(|source| SyncError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if entry.file_type().is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Compile ignore patterns once for a whole sync.
pub fn compile_patterns(patterns: &[String]) -> Result<RegexSet> {
    // Compile individually first so a failure names the offending pattern.
    for pattern in patterns {
        Regex::new(pattern).map_err(|source| SyncError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
    }
    RegexSet::new(patterns).map_err(|source| SyncError::InvalidPattern {
        pattern: patterns.join(", "),
        source,
    })
}

/// True if `candidate` contains a match for at least one pattern.
pub fn matches_any(patterns: &RegexSet, candidate: &str) -> bool {
    patterns.is_match(candidate)
}

/// Render `root` with exactly one trailing separator.
pub fn with_trailing_separator(root: &Path) -> String {
    let root = root.to_string_lossy();
    let trimmed = root.trim_end_matches(std::path::is_separator);
    format!("{}{}", trimmed, MAIN_SEPARATOR)
}

/// Strip the `root/` prefix from `path` once. Paths outside `root` are
/// returned unchanged.
pub fn relative_to(root: &Path, path: &Path) -> String {
    let prefix = with_trailing_separator(root);
    let path = path.to_string_lossy();
    match path.strip_prefix(prefix.as_str()) {
        Some(rest) => rest.to_string(),
        None => path.into_owned(),
    }
}

/// Object key for a file under `root`.
pub fn object_key(root: &Path, path: &Path) -> String {
    relative_to(root, path)
}

/// Re-root `path` from `old_root` to `new_root`, replacing only the first
/// occurrence of `old_root`.
pub fn relocate(old_root: &Path, new_root: &Path, path: &Path) -> PathBuf {
    let old_root = with_trailing_separator(old_root);
    let new_root = with_trailing_separator(new_root);
    PathBuf::from(path.to_string_lossy().replacen(&old_root, &new_root, 1))
}

/// Insert `-min` before the extension: `a.css` -> `a-min.css`, `a` -> `a-min`.
pub fn minified_name(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, MINIFIED_SUFFIX, ext.to_string_lossy()),
        None => format!("{}{}", stem, MINIFIED_SUFFIX),
    };
    path.with_file_name(name)
}

/// True if the file stem already carries the minified suffix.
pub fn is_minified(path: &Path) -> bool {
    path.file_stem()
        .is_some_and(|stem| stem.to_string_lossy().ends_with(MINIFIED_SUFFIX))
}

/// Lower-cased extension without the dot, or an empty string.
pub fn extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// Files under a root split by the ignore rules.
#[derive(Debug, Default, Clone)]
pub struct Enumeration {
    pub files: Vec<PathBuf>,
    pub ignored: Vec<PathBuf>,
}

/// Walk `root` and drop every file whose root-relative path matches an
/// ignore pattern.
pub fn enumerate(root: &Path, ignore: &RegexSet) -> Result<Enumeration> {
    let mut enumeration = Enumeration::default();
    for path in walk_tree(root)? {
        if matches_any(ignore, &relative_to(root, &path)) {
            enumeration.ignored.push(path);
        } else {
            enumeration.files.push(path);
        }
    }
    Ok(enumeration)
}
