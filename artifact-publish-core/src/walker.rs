//! # walker: collect every regular file below a build output directory
//!
//! The walker is the read-only half of the publish pipeline: after the build has written
//! its deployment repository into a fresh directory, [`collect_files`] produces the
//! [`FileSet`] that is handed to the artifact store.
//!
//! ## Traversal policy
//! - Directories are recursed into and never appear in the result.
//! - Regular files are added with their full path (`root` joined with the relative path),
//!   so every entry can be opened directly.
//! - Symbolic links and other non-regular entries (sockets, FIFOs, devices) below the root
//!   are skipped and never followed. A link can neither loop the walk nor pull content from
//!   outside the build output into the artifact.
//! - The root itself is resolved with a following stat, so a root given as a link to a
//!   directory is accepted.
//!
//! ## Resources
//! Traversal is sequential and depth-first with at most [`MAX_OPEN_DIRS`] directory
//! handles open at once, however deep or wide the tree is. Async callers should run it via
//! `tokio::task::spawn_blocking`.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, error, info};
use walkdir::WalkDir;

/// Upper bound on simultaneously open directory handles during a walk.
pub const MAX_OPEN_DIRS: usize = 10;

#[derive(Debug, Error)]
pub enum WalkError {
    #[error("directory not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("not a directory: {}", path.display())]
    InvalidInput { path: PathBuf },

    #[error("failed to stat {}: {source}", path.display())]
    StatFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// The regular files found below a root directory.
///
/// Backed by an ordered set so two walks of an unchanged tree compare equal. Callers should
/// still treat it as unordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSet {
    root: PathBuf,
    files: BTreeSet<PathBuf>,
}

impl FileSet {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.contains(path.as_ref())
    }

    /// Full paths of all files.
    pub fn iter(&self) -> impl Iterator<Item = &Path> + '_ {
        self.files.iter().map(PathBuf::as_path)
    }

    /// Paths relative to [`FileSet::root`].
    pub fn relative_paths(&self) -> impl Iterator<Item = &Path> + '_ {
        self.files
            .iter()
            .filter_map(move |p| p.strip_prefix(&self.root).ok())
    }

    pub fn into_paths(self) -> Vec<PathBuf> {
        self.files.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a PathBuf;
    type IntoIter = std::collections::btree_set::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// Recursively collects all regular files below `root`.
///
/// Fails with [`WalkError::NotFound`] if `root` does not exist, [`WalkError::InvalidInput`]
/// if it is not a directory, and [`WalkError::StatFailure`] for any I/O error met while
/// reading entries. No partial result is ever returned.
pub fn collect_files(root: impl AsRef<Path>) -> Result<FileSet, WalkError> {
    let root = root.as_ref();
    debug!(root = %root.display(), "Collecting files");

    let meta = match fs::metadata(root) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            error!(root = %root.display(), "Walk root does not exist");
            return Err(WalkError::NotFound {
                path: root.to_path_buf(),
            });
        }
        Err(e) => {
            error!(error = ?e, root = %root.display(), "Failed to stat walk root");
            return Err(WalkError::StatFailure {
                path: root.to_path_buf(),
                source: e,
            });
        }
    };
    if !meta.is_dir() {
        error!(root = %root.display(), "Walk root is not a directory");
        return Err(WalkError::InvalidInput {
            path: root.to_path_buf(),
        });
    }

    let mut files = BTreeSet::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .max_open(MAX_OPEN_DIRS)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            let message = e.to_string();
            let source = e.into_io_error().unwrap_or_else(|| io::Error::other(message));
            error!(error = %source, path = %path.display(), "Failed to read directory entry");
            WalkError::StatFailure { path, source }
        })?;

        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if file_type.is_file() {
            files.insert(entry.into_path());
        } else {
            debug!(path = %entry.path().display(), "Skipping non-regular entry");
        }
    }

    info!(root = %root.display(), count = files.len(), "Collected files");
    Ok(FileSet {
        root: root.to_path_buf(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{create_dir_all, write};
    use tempfile::tempdir;

    #[test]
    fn file_root_is_invalid_input() {
        let tmp = tempdir().unwrap();
        let file = tmp.path().join("pom.xml");
        write(&file, "<project/>").unwrap();
        let err = collect_files(&file).unwrap_err();
        assert!(matches!(err, WalkError::InvalidInput { .. }), "got {err:?}");
    }

    #[test]
    fn relative_paths_strip_the_root() {
        let tmp = tempdir().unwrap();
        create_dir_all(tmp.path().join("com/example")).unwrap();
        write(tmp.path().join("com/example/lib.jar"), b"jar").unwrap();

        let set = collect_files(tmp.path()).unwrap();
        let rel: Vec<_> = set.relative_paths().collect();
        assert_eq!(rel, vec![Path::new("com/example/lib.jar")]);
        assert!(set.contains(tmp.path().join("com/example/lib.jar")));
    }
}
