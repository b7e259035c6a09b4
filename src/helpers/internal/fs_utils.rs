//! Common filesystem utilities
//!
//! Moves that survive cross-device boundaries, recursive copies and atomic writes.

use crate::core::error::{DependError, Result};
use std::io::Write;
use std::path::Path;
use walkdir::WalkDir;

/// Create a directory (and all ancestors) if it doesn't exist.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.is_dir() {
        std::fs::create_dir_all(path).map_err(|e| DependError::fs(path, e))?;
    }
    Ok(())
}

/// Ensure a file's parent directory exists.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        ensure_dir(parent)?;
    }
    Ok(())
}

/// Move a file or directory, creating parent directories as needed.
///
/// Tries a rename first. When that fails (cross-device, or a non-empty
/// directory already sits at `dest`), falls back to copy-then-delete; an
/// existing destination directory is merged into.
pub fn move_path(src: &Path, dest: &Path) -> Result<()> {
    ensure_parent_dir(dest)?;

    if std::fs::rename(src, dest).is_ok() {
        return Ok(());
    }

    if src.is_dir() {
        copy_dir_recursive(src, dest)?;
        std::fs::remove_dir_all(src).map_err(|e| DependError::fs(src, e))?;
    } else {
        std::fs::copy(src, dest).map_err(|e| DependError::fs(dest, e))?;
        std::fs::remove_file(src).map_err(|e| DependError::fs(src, e))?;
    }
    Ok(())
}

/// Recursively copy `src` into `dest`, overwriting files that already exist.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            DependError::fs(path, std::io::Error::from(e))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| DependError::fs(entry.path(), std::io::Error::other(e.to_string())))?;
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            ensure_parent_dir(&target)?;
            std::fs::copy(entry.path(), &target).map_err(|e| DependError::fs(&target, e))?;
        }
    }
    Ok(())
}

/// Replace `path` with `content` via a temp file in the same directory.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| DependError::fs(dir, e))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| DependError::fs(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| DependError::fs(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_parent_dir() {
        let temp = tempdir().unwrap();
        let nested = temp.path().join("a/b/c/file.txt");

        ensure_parent_dir(&nested).unwrap();
        assert!(temp.path().join("a/b/c").exists());
    }

    #[test]
    fn test_move_file_creates_parents() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src.txt");
        let dest = temp.path().join("a/b/dest.txt");
        std::fs::write(&src, "content").unwrap();

        move_path(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "content");
    }

    #[test]
    fn test_move_dir_merges_into_existing() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("pkg/YSI_Core");
        let dest = temp.path().join("include/YSI_Core");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("y_core.inc"), "new").unwrap();
        std::fs::write(src.join("nested/y_inner.inc"), "inner").unwrap();
        std::fs::create_dir_all(&dest).unwrap();
        std::fs::write(dest.join("y_core.inc"), "old").unwrap();
        std::fs::write(dest.join("keep.inc"), "keep").unwrap();

        move_path(&src, &dest).unwrap();

        assert!(!src.exists());
        assert_eq!(std::fs::read_to_string(dest.join("y_core.inc")).unwrap(), "new");
        assert_eq!(std::fs::read_to_string(dest.join("keep.inc")).unwrap(), "keep");
        assert!(dest.join("nested/y_inner.inc").exists());
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("server.cfg");
        std::fs::write(&file, "old").unwrap();

        write_atomic(&file, "new\n").unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "new\n");
    }

    #[test]
    fn test_write_atomic_creates_missing_parent() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("gamemodes/main.pwn");

        write_atomic(&file, "#include <a_samp>\n").unwrap();
        assert!(file.exists());
    }
}
