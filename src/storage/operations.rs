//! Storage operations
//!
//! Handles directory listing, target inspection and deletion for the HTTP
//! handlers. Every operation resolves its input through a [`PathGuard`]
//! before touching the filesystem.

use chrono::{DateTime, Local};
use log::{info, warn};
use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};
use tokio::fs;

use crate::error::StorageError;
use crate::storage::results::{DeleteResult, FileDescriptor, ItemType, ListResult};
use crate::storage::validation::PathGuard;

/// Lists the immediate children of a sandboxed directory.
///
/// Entries whose metadata cannot be read are skipped and counted; the
/// listing itself still succeeds. A failure of the directory stream itself
/// ends the listing early with whatever was read so far.
pub async fn list_directory(guard: &PathGuard, sub_path: &str) -> Result<ListResult, StorageError> {
    let started = Instant::now();
    let target_dir = guard.resolve_subpath(sub_path)?;

    info!("[LIST] Reading directory {}", target_dir.display());
    let mut reader = fs::read_dir(&target_dir).await.map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(sub_path.to_string())
        } else {
            StorageError::ReadDirFailed(target_dir.clone(), e)
        }
    })?;

    let mut raw_entries = Vec::new();
    let mut unreadable = 0;
    loop {
        match reader.next_entry().await {
            Ok(Some(entry)) => {
                let name = entry.file_name().to_string_lossy().to_string();
                let metadata = entry.metadata().await;
                raw_entries.push((name, metadata));
            }
            Ok(None) => break,
            // The OS directory stream cannot be resumed after an error.
            Err(e) => {
                warn!(
                    "[LIST] Directory stream for {} ended early: {}",
                    target_dir.display(),
                    e
                );
                unreadable += 1;
                break;
            }
        }
    }

    let mut result = describe_entries(sub_path, raw_entries);
    result.skipped += unreadable;

    if result.skipped > 0 {
        warn!("[LIST] Skipped {} unreadable entries", result.skipped);
    }
    info!(
        "[LIST] Returning {} entries from {} in {:?}",
        result.entries.len(),
        target_dir.display(),
        started.elapsed()
    );

    Ok(result)
}

/// Builds descriptors from raw `(name, metadata)` pairs in read order.
pub fn describe_entries(
    sub_path: &str,
    raw_entries: Vec<(String, io::Result<Metadata>)>,
) -> ListResult {
    let mut entries = Vec::with_capacity(raw_entries.len());
    let mut skipped = 0;

    for (name, metadata) in raw_entries {
        let metadata = match metadata {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("[LIST] Cannot read metadata for {}: {}", name, e);
                skipped += 1;
                continue;
            }
        };

        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
        entries.push(FileDescriptor {
            path: join_relative(sub_path, &name),
            extension: extension_of(&name).to_string(),
            size: metadata.len(),
            mod_time: DateTime::<Local>::from(modified),
            is_dir: metadata.is_dir(),
            name,
        });
    }

    ListResult { entries, skipped }
}

/// Looks up a target's metadata, mapping absence to `NotFound`.
pub async fn stat_target(full_path: &Path, relative: &str) -> Result<Metadata, StorageError> {
    match fs::metadata(full_path).await {
        Ok(metadata) => Ok(metadata),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("[PATH] {} does not exist: {}", full_path.display(), e);
            Err(StorageError::NotFound(relative.to_string()))
        }
        Err(e) => Err(StorageError::IoError(e)),
    }
}

/// Deletes a file, or a directory together with its entire subtree.
pub async fn delete_entry(guard: &PathGuard, relative: &str) -> Result<DeleteResult, StorageError> {
    let started = Instant::now();
    let full_path = guard.resolve_target(relative)?;

    info!("[DELETE] Checking {}", full_path.display());
    let metadata = stat_target(&full_path, relative).await?;
    let item_type = if metadata.is_dir() {
        ItemType::Directory
    } else {
        ItemType::File
    };

    let removed = match item_type {
        ItemType::Directory => {
            info!("[DELETE] Removing directory tree {}", full_path.display());
            fs::remove_dir_all(&full_path).await
        }
        ItemType::File => {
            info!("[DELETE] Removing file {}", full_path.display());
            fs::remove_file(&full_path).await
        }
    };
    removed.map_err(|e| StorageError::DeleteFailed(full_path.clone(), e))?;

    let name = base_name(relative);
    info!(
        "[DELETE] Deleted {} {} in {:?}",
        item_type,
        name,
        started.elapsed()
    );

    Ok(DeleteResult { item_type, name })
}

/// Final component of a relative path, or the path itself if it has none
pub fn base_name(relative: &str) -> String {
    Path::new(relative)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| relative.to_string())
}

/// Suffix after the final `.` of a file name, empty if there is none
pub fn extension_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) => &name[index + 1..],
        None => "",
    }
}

fn join_relative(sub_path: &str, name: &str) -> String {
    let mut joined = PathBuf::new();
    for component in Path::new(sub_path).components() {
        if let Component::Normal(part) = component {
            joined.push(part);
        }
    }
    joined.push(name);
    joined.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathGuard) {
        let temp = tempdir().unwrap();
        std::fs::write(temp.path().join("a.txt"), b"hello").unwrap();
        std::fs::create_dir_all(temp.path().join("docs/deep")).unwrap();
        std::fs::write(temp.path().join("docs/report.tar.gz"), b"zz").unwrap();
        std::fs::write(temp.path().join("docs/deep/x"), b"x").unwrap();
        let guard = PathGuard::new(temp.path()).unwrap();
        (temp, guard)
    }

    #[tokio::test]
    async fn test_list_root_is_not_recursive() {
        let (_temp, guard) = setup();
        let result = list_directory(&guard, "").await.unwrap();

        let mut names: Vec<_> = result.entries.iter().map(|e| e.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "docs"]);
        assert_eq!(result.skipped, 0);

        let file = result.entries.iter().find(|e| e.name == "a.txt").unwrap();
        assert_eq!(file.size, 5);
        assert!(!file.is_dir);
        assert_eq!(file.extension, "txt");
        assert_eq!(file.path, "a.txt");

        let dir = result.entries.iter().find(|e| e.name == "docs").unwrap();
        assert!(dir.is_dir);
        assert_eq!(dir.extension, "");
    }

    #[tokio::test]
    async fn test_list_subdirectory_paths_are_relative() {
        let (_temp, guard) = setup();
        let result = list_directory(&guard, "./docs").await.unwrap();

        let report = result
            .entries
            .iter()
            .find(|e| e.name == "report.tar.gz")
            .unwrap();
        assert_eq!(report.path, "docs/report.tar.gz");
        assert_eq!(report.extension, "gz");

        let deep = result.entries.iter().find(|e| e.name == "deep").unwrap();
        assert_eq!(deep.path, "docs/deep");
    }

    #[tokio::test]
    async fn test_list_rejects_traversal() {
        let (_temp, guard) = setup();
        assert!(matches!(
            list_directory(&guard, "../").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            list_directory(&guard, "/etc").await,
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_list_missing_directory_is_not_found() {
        let (_temp, guard) = setup();
        assert!(matches!(
            list_directory(&guard, "nope").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_unreadable_entry_is_skipped_and_counted() {
        let (temp, _guard) = setup();
        let file_meta = std::fs::metadata(temp.path().join("a.txt"));
        let dir_meta = std::fs::metadata(temp.path().join("docs"));
        let broken = Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));

        let result = describe_entries(
            "",
            vec![
                ("a.txt".to_string(), file_meta),
                ("secret".to_string(), broken),
                ("docs".to_string(), dir_meta),
            ],
        );

        assert_eq!(result.skipped, 1);
        let names: Vec<_> = result.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "docs"]);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.txt"), "txt");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".bashrc"), "bashrc");
        assert_eq!(extension_of("trailing."), "");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/b/c.txt"), "c.txt");
        assert_eq!(base_name("c.txt"), "c.txt");
        assert_eq!(base_name("dir/"), "dir");
    }

    #[tokio::test]
    async fn test_delete_file() {
        let (temp, guard) = setup();
        let result = delete_entry(&guard, "a.txt").await.unwrap();
        assert_eq!(result.item_type, ItemType::File);
        assert_eq!(result.name, "a.txt");
        assert!(!temp.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_directory_removes_subtree() {
        let (temp, guard) = setup();
        let result = delete_entry(&guard, "docs").await.unwrap();
        assert_eq!(result.item_type, ItemType::Directory);
        assert!(!temp.path().join("docs").exists());

        let listing = list_directory(&guard, "").await.unwrap();
        assert!(listing.entries.iter().all(|e| e.name != "docs"));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let (_temp, guard) = setup();
        assert!(matches!(
            delete_entry(&guard, "ghost.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_never_reaches_prefix_sibling() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("files");
        let sibling = temp.path().join("files-private");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&sibling).unwrap();
        std::fs::write(sibling.join("secret.txt"), b"s").unwrap();
        let guard = PathGuard::new(&root).unwrap();

        let absolute = sibling.join("secret.txt");
        assert!(matches!(
            delete_entry(&guard, &absolute.to_string_lossy()).await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            delete_entry(&guard, "../files-private").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(sibling.join("secret.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_refuses_storage_root() {
        let (temp, guard) = setup();
        for target in [".", "/", "./"] {
            assert!(matches!(
                delete_entry(&guard, target).await,
                Err(StorageError::InvalidPath(_))
            ));
        }
        assert!(temp.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_rejects_traversal() {
        let (temp, guard) = setup();
        assert!(matches!(
            delete_entry(&guard, "docs/../../a.txt").await,
            Err(StorageError::InvalidPath(_))
        ));
        assert!(temp.path().join("a.txt").exists());
    }
}
