//! Mapping of public item URLs onto the output tree.
//!
//! `https://example.com/docs/setup/` becomes `docs/setup.md` below the output
//! root; the site root becomes `index.md`. Segments are percent-decoded and
//! then refused if they could step outside the tree.

use crate::error::{ExportError, Result};
use std::path::PathBuf;
use url::Url;

/// File stem used for an item whose URL path has no segments.
pub const ROOT_FILENAME: &str = "index";

/// Extension appended to every exported file.
pub const EXTENSION: &str = "md";

/// Where one item lands in the output tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedPath {
    /// Directory segments below the output root, outermost first.
    pub dir_segments: Vec<String>,
    /// File stem, without extension.
    pub filename: String,
}

impl MappedPath {
    /// Path relative to the output root, including the `.md` extension.
    pub fn relative_path(&self) -> PathBuf {
        let mut path: PathBuf = self.dir_segments.iter().collect();
        path.push(format!("{}.{EXTENSION}", self.filename));
        path
    }
}

/// Derives output locations from public URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathMapper;

impl PathMapper {
    /// Map a public URL to its directory segments and file stem.
    ///
    /// # Errors
    ///
    /// * [`ExportError::InvalidUrl`] if `url` is not an absolute hierarchical URL
    ///   or a segment is not valid UTF-8 once decoded
    /// * [`ExportError::UnsafePath`] if a segment decodes to `.`, `..`, or
    ///   contains a path separator or NUL
    pub fn map(&self, url: &str) -> Result<MappedPath> {
        let parsed = Url::parse(url).map_err(|e| ExportError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(ExportError::InvalidUrl {
                url: url.to_string(),
                reason: "URL has no hierarchical path".to_string(),
            });
        }

        let mut segments = Vec::new();
        for raw in parsed.path().trim_matches('/').split('/') {
            if raw.is_empty() {
                continue;
            }
            let decoded = urlencoding::decode(raw).map_err(|e| ExportError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            if is_unsafe_segment(&decoded) {
                return Err(ExportError::UnsafePath {
                    url: url.to_string(),
                    segment: decoded.into_owned(),
                });
            }
            segments.push(decoded.into_owned());
        }

        let filename = segments
            .pop()
            .unwrap_or_else(|| ROOT_FILENAME.to_string());
        Ok(MappedPath {
            dir_segments: segments,
            filename,
        })
    }
}

fn is_unsafe_segment(segment: &str) -> bool {
    segment == "." || segment == ".." || segment.contains(['/', '\\', '\0'])
}
