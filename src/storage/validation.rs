//! Path validation
//!
//! Resolves caller-supplied relative paths against the storage root and
//! rejects anything that would land outside of it.
//!
//! The caller's path is rebuilt from its normal components on top of the
//! root, so an absolute input such as `/etc/passwd` lands at
//! `<root>/etc/passwd`. The result is then checked component-wise against
//! the root. Symbolic links are never followed, so a link that lives under
//! the root but points elsewhere passes the check.

use log::{debug, info, warn};
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::StorageError;

/// Validates relative paths against a fixed storage root.
#[derive(Debug, Clone)]
pub struct PathGuard {
    resolved_root: PathBuf,
}

impl PathGuard {
    /// Creates a guard for `root`, resolving it to absolute form once.
    pub fn new(root: impl Into<PathBuf>) -> io::Result<Self> {
        let resolved_root = absolute_lexical(&root.into())?;
        Ok(Self { resolved_root })
    }

    /// The storage root in absolute, normalised form
    pub fn resolved_root(&self) -> &Path {
        &self.resolved_root
    }

    /// Resolves an optional sub-path as used by list and upload.
    ///
    /// An empty sub-path names the root itself. Otherwise the sub-path must
    /// not contain `..` and must not start with `/`.
    pub fn resolve_subpath(&self, sub_path: &str) -> Result<PathBuf, StorageError> {
        if sub_path.is_empty() {
            return Ok(self.resolved_root.clone());
        }
        if sub_path.contains("..") || sub_path.starts_with('/') {
            warn!(
                "[PATH] Rejected sub-path {:?} (contains '..' or starts with '/')",
                sub_path
            );
            return Err(StorageError::InvalidPath(sub_path.to_string()));
        }
        self.contain(sub_path)
    }

    /// Resolves a file or directory path as used by download and delete.
    ///
    /// The path must be non-empty, must not contain `..` and must name
    /// something below the root, never the root itself.
    pub fn resolve_target(&self, relative: &str) -> Result<PathBuf, StorageError> {
        if relative.is_empty() || relative.contains("..") {
            warn!("[PATH] Rejected target path {:?}", relative);
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        let resolved = self.contain(relative)?;
        if resolved == self.resolved_root {
            warn!("[PATH] Rejected target {:?}: names the storage root", relative);
            return Err(StorageError::InvalidPath(relative.to_string()));
        }
        Ok(resolved)
    }

    /// Resolves an upload destination and makes sure the directory exists.
    ///
    /// Directory creation is recursive and idempotent. The root itself is
    /// assumed to exist and is never created here.
    pub fn prepare_directory(&self, sub_path: &str) -> Result<PathBuf, StorageError> {
        let target = self.resolve_subpath(sub_path)?;
        if sub_path.is_empty() {
            return Ok(target);
        }

        std::fs::create_dir_all(&target).map_err(|e| {
            warn!("[PATH] Failed to create directory {}: {}", target.display(), e);
            StorageError::DirectoryCreateFailed(target.clone(), e)
        })?;
        info!("[PATH] Created or confirmed directory {}", target.display());

        Ok(target)
    }

    fn contain(&self, relative: &str) -> Result<PathBuf, StorageError> {
        let mut resolved = self.resolved_root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                // Leading `/` or a drive prefix is dropped, never allowed to
                // replace the root.
                Component::RootDir | Component::Prefix(_) | Component::CurDir => {}
                Component::ParentDir => {
                    warn!("[PATH] Rejected {:?}: parent component", relative);
                    return Err(StorageError::InvalidPath(relative.to_string()));
                }
            }
        }

        debug!(
            "[PATH] Validating {:?} -> {} (root {})",
            relative,
            resolved.display(),
            self.resolved_root.display()
        );

        if !resolved.starts_with(&self.resolved_root) {
            warn!(
                "[PATH] Traversal attempt: {} escapes {}",
                resolved.display(),
                self.resolved_root.display()
            );
            return Err(StorageError::InvalidPath(relative.to_string()));
        }

        Ok(resolved)
    }
}

/// Validates a bare upload filename
pub fn validate_filename(filename: &str) -> Result<(), StorageError> {
    if filename.is_empty()
        || filename.contains("..")
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(StorageError::InvalidFilename(filename.to_string()));
    }
    Ok(())
}

/// Makes `path` absolute against the working directory and normalises it.
fn absolute_lexical(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Collapses `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
