//! The mirrored Markdown tree on disk.
//!
//! [`TreeWriter`] owns one output root. It only ever creates directories,
//! writes files, and deletes the whole tree; it keeps no record of what it
//! wrote between calls.

use crate::error::{ExportError, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Outcome of a [`TreeWriter::clear_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearStats {
    /// Files (and symlinks) removed.
    pub files_removed: usize,
    /// Directories removed, the root included.
    pub dirs_removed: usize,
    /// Entries that could not be listed or removed.
    pub failures: usize,
}

/// Writes exported files below a fixed output root.
#[derive(Debug, Clone)]
pub struct TreeWriter {
    root: PathBuf,
}

impl TreeWriter {
    /// Create a writer for `root`. Nothing is touched until a method runs.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The output root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete the output root and everything below it.
    ///
    /// A missing root is not an error. Removal is best effort: an entry that
    /// cannot be removed is logged and counted, and its siblings are still
    /// removed. The tree is walked with an explicit stack, so depth is bounded
    /// only by memory. Symlinks are removed, never followed.
    #[instrument(level = "info", skip_all, fields(root = %self.root.display()))]
    pub async fn clear_all(&self) -> ClearStats {
        let mut stats = ClearStats::default();

        match fs::symlink_metadata(&self.root).await {
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Output root does not exist; nothing to clear");
                return stats;
            }
            Err(e) => {
                warn!(error = %e, "Cannot inspect output root");
                stats.failures += 1;
                return stats;
            }
            Ok(meta) if !meta.is_dir() => {
                match fs::remove_file(&self.root).await {
                    Ok(()) => stats.files_removed += 1,
                    Err(e) => {
                        warn!(error = %e, "Failed to remove non-directory output root");
                        stats.failures += 1;
                    }
                }
                return stats;
            }
            Ok(_) => {}
        }

        // (dir, children_already_queued)
        let mut stack: Vec<(PathBuf, bool)> = vec![(self.root.clone(), false)];
        while let Some((dir, expanded)) = stack.pop() {
            if expanded {
                match fs::remove_dir(&dir).await {
                    Ok(()) => stats.dirs_removed += 1,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "Failed to remove directory");
                        stats.failures += 1;
                    }
                }
                continue;
            }

            stack.push((dir.clone(), true));
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Failed to list directory");
                    stats.failures += 1;
                    continue;
                }
            };

            loop {
                let entry = match entries.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "Failed to read directory entry");
                        stats.failures += 1;
                        break;
                    }
                };
                let path = entry.path();
                match entry.file_type().await {
                    Ok(ft) if ft.is_dir() => stack.push((path, false)),
                    Ok(_) => match fs::remove_file(&path).await {
                        Ok(()) => stats.files_removed += 1,
                        Err(e) => {
                            warn!(path = %path.display(), error = %e, "Failed to remove file");
                            stats.failures += 1;
                        }
                    },
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to stat entry");
                        stats.failures += 1;
                    }
                }
            }
        }

        info!(
            files = stats.files_removed,
            dirs = stats.dirs_removed,
            failures = stats.failures,
            "Cleared output tree"
        );
        stats
    }

    /// Write `body` to `{root}/{dir_segments...}/{filename}.md`.
    ///
    /// Missing directories are created; an existing file is overwritten.
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Io`] if a directory cannot be created or the
    /// file cannot be written.
    #[instrument(level = "debug", skip_all, fields(%filename))]
    pub async fn write(&self, dir_segments: &[String], filename: &str, body: &str) -> Result<PathBuf> {
        let dir = dir_segments
            .iter()
            .fold(self.root.clone(), |acc, seg| acc.join(seg));
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| ExportError::io(&dir, e))?;

        let path = dir.join(format!("{filename}.{}", crate::paths::EXTENSION));
        fs::write(&path, body)
            .await
            .map_err(|e| ExportError::io(&path, e))?;
        debug!(path = %path.display(), bytes = body.len(), "Wrote file");
        Ok(path)
    }
}
