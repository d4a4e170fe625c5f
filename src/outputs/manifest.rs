//! The `llms.txt` manifest.
//!
//! One file listing every exported item as a Markdown link:
//!
//! ```text
//! # Example Site
//! > Just another site
//!
//! - [Home](https://example.com/.md)
//! - [About](https://example.com/about/.md)
//! ```
//!
//! Link targets are the item's canonical URL with `.md` appended verbatim.
//! For URLs with a trailing slash this does not match where the tree writer
//! puts the file (`about.md`, not `about/.md`). The two are deliberately not
//! reconciled here; see DESIGN.md.

use crate::error::{ExportError, Result};
use crate::models::ManifestEntry;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Renders manifest text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManifestBuilder;

impl ManifestBuilder {
    /// Render the manifest for `entries`, in the order given.
    pub fn build(&self, site_name: &str, site_description: &str, entries: &[ManifestEntry]) -> String {
        let mut out = format!("# {site_name}\n> {site_description}\n\n");
        for entry in entries {
            out.push_str(&format!("- [{}]({}.md)\n", entry.title, entry.link_target));
        }
        out
    }
}

/// Write manifest text to `path`, replacing any previous manifest.
///
/// The parent directory is created if needed.
///
/// # Errors
///
/// Returns [`ExportError::Io`] if the parent cannot be created or the file
/// cannot be written.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_manifest(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| ExportError::io(parent, e))?;
    }
    fs::write(path, text)
        .await
        .map_err(|e| ExportError::io(path, e))?;
    info!(bytes = text.len(), "Wrote manifest");
    Ok(())
}
