//! Data models for exported content and the files derived from it.
//!
//! This module defines the core data structures used throughout the application:
//! - [`ContentItem`]: A content item as supplied by the content source
//! - [`SiteInfo`]: Site-level name and description used by the manifest header
//! - [`OutputFile`]: A Markdown file derived from one item for one run
//! - [`ManifestEntry`]: One link line in the `llms.txt` manifest
//!
//! Items are read-only for the pipeline: nothing here is mutated once a run
//! has taken its snapshot of the content source.

use serde::{Deserialize, Serialize};

/// Publication state of a content item.
///
/// Only [`PublishStatus::Publish`] items are exported; everything else is
/// filtered out by the content source before the pipeline sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PublishStatus {
    /// Publicly visible.
    #[default]
    Publish,
    /// Work in progress.
    Draft,
    /// Awaiting review.
    Pending,
    /// Visible to authorized users only.
    Private,
    /// Scheduled for a later publication date.
    Future,
    /// Deleted but recoverable.
    Trash,
}

/// A content item as supplied by the content store.
///
/// # Fields
///
/// * `id` - Store identifier
/// * `url` - The canonical public URL; drives both the file path and the manifest link
/// * `title` - Human-readable title used in the manifest
/// * `content` - Rich body (HTML-like markup)
/// * `category` - Owning category name (stamped by the source on load)
/// * `status` - Publication state
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContentItem {
    pub id: u64,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub status: PublishStatus,
}

impl ContentItem {
    /// The item's canonical public URL.
    pub fn canonical_url(&self) -> &str {
        &self.url
    }

    /// The item's display title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Whether the item is eligible for export.
    pub fn is_published(&self) -> bool {
        self.status == PublishStatus::Publish
    }
}

/// Site-level metadata rendered into the manifest header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct SiteInfo {
    /// Site name, rendered as `# {name}`.
    pub name: String,
    /// Site tagline, rendered as `> {description}`.
    #[serde(default)]
    pub description: String,
}

/// A Markdown file derived from one content item.
///
/// Never persisted on its own: it exists between path mapping and the
/// tree writer, and the filesystem is the only record afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Directory segments below the output root, outermost first.
    pub dir_segments: Vec<String>,
    /// File stem; `.md` is appended when written.
    pub filename: String,
    /// Converted Markdown body.
    pub body: String,
}

/// One link line in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Link text.
    pub title: String,
    /// Canonical URL of the item; the manifest appends `.md` to it.
    pub link_target: String,
}

impl From<&ContentItem> for ManifestEntry {
    fn from(item: &ContentItem) -> Self {
        Self {
            title: item.title().to_string(),
            link_target: item.canonical_url().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_defaults_to_publish() {
        let yaml = "id: 7\nurl: https://example.com/about/\ntitle: About\n";
        let item: ContentItem = serde_yaml::from_str(yaml).unwrap();
        assert!(item.is_published());
        assert_eq!(item.content, "");
    }

    #[test]
    fn test_status_deserializes_lowercase() {
        let json = r#"{"id": 1, "url": "https://x/", "title": "Home", "status": "draft"}"#;
        let item: ContentItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.status, PublishStatus::Draft);
        assert!(!item.is_published());
    }

    #[test]
    fn test_manifest_entry_from_item() {
        let item = ContentItem {
            id: 3,
            url: "https://x/about".to_string(),
            title: "About".to_string(),
            content: "<p>hi</p>".to_string(),
            category: "page".to_string(),
            status: PublishStatus::Publish,
        };
        let entry = ManifestEntry::from(&item);
        assert_eq!(entry.title, "About");
        assert_eq!(entry.link_target, "https://x/about");
    }
}
