//! Directory enumeration: turns a root directory and a file-name glob into
//! the list of files a scan will read.
//!
//! The walk is recursive and applies no ignore files of any kind. Symlinked
//! directories are not descended into; a symlink to a regular file is listed
//! like the file itself (at the link's path). Dangling links are left out. The glob is matched against the base name only, so
//! `*.txt` selects `a.txt` and `deep/er/b.TXT` alike.
//!
//! # Unreadable directories
//!
//! A subdirectory that cannot be listed does not stop the walk. It is
//! treated as an empty branch and reported as a [`FileError`] in
//! [`Enumeration::errors`], which the engine forwards as an ordinary error
//! event. Only the root itself is fatal: a missing, non-directory or
//! unlistable root fails the whole enumeration.

use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

use crate::errors::{unify_path, FinderError, FinderResult};
use crate::results::FileError;

const NAME_MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled file-name glob
#[derive(Debug, Clone)]
pub struct NamePattern {
    pattern: Pattern,
}

impl NamePattern {
    pub fn new(pattern: &str) -> FinderResult<Self> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| FinderError::invalid_pattern(format!("'{pattern}': {e}")))?;
        Ok(Self { pattern })
    }

    /// The glob as written
    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }

    /// Checks the base name of `path` against the glob
    pub fn matches_path(&self, path: &Path) -> bool {
        match path.file_name() {
            Some(name) => self
                .pattern
                .matches_with(&name.to_string_lossy(), NAME_MATCH_OPTIONS),
            None => false,
        }
    }
}

/// Output of one directory walk
#[derive(Debug, Clone, Default)]
pub struct Enumeration {
    /// Absolute paths of matching files, in walk order
    pub files: Vec<PathBuf>,
    /// Subdirectories that were skipped because they could not be read
    pub errors: Vec<FileError>,
}

/// Anything that can list the files for a scan.
///
/// The engine only talks to this trait, so a caller can put a different
/// file source behind it (a fixed list, a remote index, a test double).
pub trait PathSource: Send + Sync {
    fn enumerate(&self, root: &Path, pattern: &NamePattern) -> FinderResult<Enumeration>;
}

/// The filesystem walker used by default
#[derive(Debug, Clone, Copy, Default)]
pub struct FsEnumerator;

impl PathSource for FsEnumerator {
    fn enumerate(&self, root: &Path, pattern: &NamePattern) -> FinderResult<Enumeration> {
        enumerate(root, pattern)
    }
}

/// Walks `root` recursively and collects every file whose name matches `pattern`
pub fn enumerate(root: &Path, pattern: &NamePattern) -> FinderResult<Enumeration> {
    let root = check_root(root)?;
    debug!(
        "Enumerating {} for '{}'",
        root.display(),
        pattern.as_str()
    );

    let mut builder = WalkBuilder::new(&root);
    builder
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b));

    let mut enumeration = Enumeration::default();
    for entry in builder.build() {
        match entry {
            Ok(entry) => {
                let is_file = entry.file_type().is_some_and(|ft| ft.is_file())
                    || (entry.path_is_symlink() && entry.path().is_file());
                if is_file && pattern.matches_path(entry.path()) {
                    trace!("Matched name: {}", entry.path().display());
                    enumeration.files.push(entry.into_path());
                }
            }
            Err(err) => {
                let skipped = walk_error(&root, &err);
                warn!("Skipping unreadable directory {}", skipped);
                enumeration.errors.push(skipped);
            }
        }
    }

    debug!(
        "Enumerated {} files ({} directories skipped)",
        enumeration.files.len(),
        enumeration.errors.len()
    );
    Ok(enumeration)
}

/// Verifies the root is an existing, listable directory and makes it absolute
fn check_root(root: &Path) -> FinderResult<PathBuf> {
    let metadata = match fs::metadata(root) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(FinderError::RootNotFound(root.to_path_buf()))
        }
        Err(source) => {
            return Err(FinderError::RootInaccessible {
                path: root.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.is_dir() {
        return Err(FinderError::RootNotADirectory(root.to_path_buf()));
    }

    fs::read_dir(root).map_err(|source| FinderError::RootInaccessible {
        path: root.to_path_buf(),
        source,
    })?;

    Ok(unify_path(root))
}

/// Converts a walk failure into the error record reported for it
pub(crate) fn walk_error(root: &Path, err: &ignore::Error) -> FileError {
    let path = error_path(err)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let message = err
        .io_error()
        .map(ToString::to_string)
        .unwrap_or_else(|| err.to_string());
    FileError::new(path, message)
}

fn error_path(err: &ignore::Error) -> Option<&Path> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.as_path()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            error_path(err)
        }
        ignore::Error::Loop { child, .. } => Some(child.as_path()),
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}
