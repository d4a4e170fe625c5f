//! Advisory lock file guarding the output tree across processes.
//!
//! A manual `regenerate` and a running daemon are separate processes, so the
//! pipeline's in-process mutex cannot keep them apart. Every run also holds an
//! exclusive lock on `{output_root}.lock`, a sibling of the tree that
//! [`TreeWriter::clear_all`](crate::outputs::tree::TreeWriter::clear_all)
//! never touches. The lock is released when the [`TreeLock`] is dropped.

use crate::error::{ExportError, Result};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// `{output_root}.lock`, e.g. `public/llms` → `public/llms.lock`.
pub fn default_lock_path(output_root: &Path) -> PathBuf {
    let mut raw = output_root.as_os_str().to_owned();
    raw.push(".lock");
    PathBuf::from(raw)
}

/// An exclusive lock held on the lock file.
#[derive(Debug)]
pub struct TreeLock {
    _file: File,
}

impl TreeLock {
    /// Block (off the async runtime) until the lock at `path` is ours.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] if the lock file cannot be created or locked.
    #[instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub async fn acquire(path: &Path) -> Result<Self> {
        let owned = path.to_path_buf();
        let file = tokio::task::spawn_blocking(move || open_locked(&owned))
            .await
            .map_err(|e| ExportError::io(path, io::Error::other(e)))?
            .map_err(|e| ExportError::io(path, e))?;
        debug!("Acquired tree lock");
        Ok(Self { _file: file })
    }
}

fn open_locked(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_default_lock_path_is_sibling() {
        assert_eq!(
            default_lock_path(Path::new("/srv/public/llms")),
            PathBuf::from("/srv/public/llms.lock")
        );
    }

    #[tokio::test]
    async fn test_second_holder_waits_for_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("llms.lock");

        let first = TreeLock::acquire(&path).await.unwrap();
        assert!(path.exists());

        let contender = tokio::spawn({
            let path = path.clone();
            async move { TreeLock::acquire(&path).await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!contender.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(5), contender)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
