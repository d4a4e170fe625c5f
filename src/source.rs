//! Content source: the read-only provider of categories and published items.
//!
//! The pipeline only ever talks to the [`ContentSource`] trait, so tests and
//! alternative stores can supply fixed fixtures. [`FileContentSource`] is the
//! implementation the binary uses: it reads a content dump exported by the
//! host platform.
//!
//! # Dump Format
//!
//! ```yaml
//! site:
//!   name: Example
//!   description: Just another site
//! categories:
//!   - name: page
//!     public: true
//!     items:
//!       - id: 2
//!         url: https://example.com/about/
//!         title: About
//!         status: publish
//!         content: "<p>About us</p>"
//! ```
//!
//! Files ending in `.json` are parsed as JSON, everything else as YAML.

use crate::error::{ExportError, Result};
use crate::models::{ContentItem, SiteInfo};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};

/// Read-only provider of exportable content.
///
/// Enumeration order is significant: the pipeline writes files and manifest
/// lines in exactly the order the source yields them.
pub trait ContentSource {
    /// Site-level name and description.
    fn site(&self) -> &SiteInfo;

    /// Names of all public categories, in enumeration order.
    fn public_categories(&self) -> Vec<String>;

    /// Published items of one public category, in enumeration order.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnknownCategory`] if `category` is not public.
    fn published(&self, category: &str) -> Result<Vec<ContentItem>>;
}

#[derive(Debug, Deserialize)]
struct Dump {
    #[serde(default)]
    site: SiteInfo,
    #[serde(default)]
    categories: Vec<CategoryDump>,
}

#[derive(Debug, Deserialize)]
struct CategoryDump {
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default = "default_public")]
    public: bool,
    #[serde(default)]
    items: Vec<ContentItem>,
}

fn default_public() -> bool {
    true
}

/// A category as held in memory by [`FileContentSource`].
#[derive(Debug, Clone)]
pub struct Category {
    /// Machine name, used in hook keys and settings.
    pub name: String,
    /// Display label; falls back to the name.
    pub label: String,
    /// Whether the category is exported at all.
    pub public: bool,
    /// All items, published or not.
    pub items: Vec<ContentItem>,
}

/// Content source backed by a YAML or JSON dump on disk.
#[derive(Debug, Clone, Default)]
pub struct FileContentSource {
    site: SiteInfo,
    categories: Vec<Category>,
}

impl FileContentSource {
    /// Build a source directly from in-memory categories.
    pub fn new(site: SiteInfo, categories: Vec<Category>) -> Self {
        let categories = categories
            .into_iter()
            .map(|mut c| {
                for item in &mut c.items {
                    item.category = c.name.clone();
                }
                c
            })
            .collect();
        Self { site, categories }
    }

    /// Read and parse a content dump.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not parse.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .await
            .map_err(|e| ExportError::io(path, e))?;
        let source = Self::parse(&raw, is_json(path))?;
        info!(
            categories = source.categories.len(),
            public = source.public_categories().len(),
            "Loaded content dump"
        );
        Ok(source)
    }

    /// Parse a dump from a string.
    pub fn parse(raw: &str, json: bool) -> Result<Self> {
        let dump: Dump = if json {
            serde_json::from_str(raw)?
        } else {
            serde_yaml::from_str(raw)?
        };
        let categories = dump
            .categories
            .into_iter()
            .map(|c| Category {
                label: c.label.unwrap_or_else(|| c.name.clone()),
                name: c.name,
                public: c.public,
                items: c.items,
            })
            .collect();
        Ok(Self::new(dump.site, categories))
    }

    /// Display label for a category, if it exists.
    pub fn label(&self, category: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.label.as_str())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

impl ContentSource for FileContentSource {
    fn site(&self) -> &SiteInfo {
        &self.site
    }

    fn public_categories(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| c.public)
            .map(|c| c.name.clone())
            .collect()
    }

    fn published(&self, category: &str) -> Result<Vec<ContentItem>> {
        let cat = self
            .categories
            .iter()
            .find(|c| c.public && c.name == category)
            .ok_or_else(|| ExportError::UnknownCategory(category.to_string()))?;
        let items: Vec<ContentItem> = cat
            .items
            .iter()
            .filter(|item| item.is_published())
            .cloned()
            .collect();
        debug!(category, total = cat.items.len(), published = items.len(), "Enumerated items");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DUMP: &str = r#"
site:
  name: Example
  description: Just another site
categories:
  - name: page
    label: Pages
    items:
      - id: 1
        url: https://example.com/
        title: Home
        content: "<p>Welcome</p>"
      - id: 2
        url: https://example.com/draft/
        title: Draft
        status: draft
  - name: post
    items:
      - id: 3
        url: https://example.com/2025/hello/
        title: Hello
  - name: revision
    public: false
    items:
      - id: 4
        url: https://example.com/?p=4
        title: Hidden
"#;

    #[test]
    fn test_public_categories_preserve_order() {
        let source = FileContentSource::parse(DUMP, false).unwrap();
        assert_eq!(source.public_categories(), vec!["page", "post"]);
        assert_eq!(source.site().name, "Example");
        assert_eq!(source.label("page"), Some("Pages"));
        assert_eq!(source.label("post"), Some("post"));
    }

    #[test]
    fn test_published_filters_and_stamps_category() {
        let source = FileContentSource::parse(DUMP, false).unwrap();
        let items = source.published("page").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Home");
        assert_eq!(items[0].category, "page");
    }

    #[test]
    fn test_non_public_category_is_unknown() {
        let source = FileContentSource::parse(DUMP, false).unwrap();
        assert!(matches!(
            source.published("revision"),
            Err(ExportError::UnknownCategory(c)) if c == "revision"
        ));
        assert!(source.published("nope").is_err());
    }

    #[tokio::test]
    async fn test_load_json_dump() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("content.json");
        let json = r#"{
            "site": {"name": "S", "description": "D"},
            "categories": [
                {"name": "page", "items": [{"id": 1, "url": "https://x/", "title": "Home"}]}
            ]
        }"#;
        std::fs::write(&path, json).unwrap();

        let source = FileContentSource::load(&path).await.unwrap();
        assert_eq!(source.public_categories(), vec!["page"]);
        assert_eq!(source.published("page").unwrap()[0].url, "https://x/");
    }

    #[tokio::test]
    async fn test_load_missing_file_fails_with_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.yaml");
        let err = FileContentSource::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }
}
