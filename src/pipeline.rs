//! Regeneration pipeline: map, convert, write, then index.
//!
//! Two entry points:
//!
//! - [`RegenerationPipeline::full`] clears the whole output tree, exports every
//!   published item of every public category, and rewrites the manifest.
//! - [`RegenerationPipeline::for_category`] exports one category's items over
//!   the existing tree. It neither clears nor touches the manifest, so after a
//!   scheduled partial run the manifest reflects the last full run only.
//!
//! Runs are serialized twice: by a mutex owned by the pipeline, and by an
//! exclusive lock on `{output_root}.lock` that also keeps a manual run in
//! another process from interleaving with the daemon. Items are processed
//! one at a time; a failing item is logged and counted, never fatal.

use crate::convert::ContentConverter;
use crate::error::Result;
use crate::models::{ContentItem, ManifestEntry, OutputFile};
use crate::outputs::lock::{TreeLock, default_lock_path};
use crate::outputs::manifest::{ManifestBuilder, write_manifest};
use crate::outputs::tree::{ClearStats, TreeWriter};
use crate::paths::PathMapper;
use crate::source::ContentSource;
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Locations of the output tree and the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    /// Root of the mirrored `.md` tree.
    pub output_root: PathBuf,
    /// Manifest file; by default `{output_root}.txt`.
    pub manifest_path: PathBuf,
    /// Cross-process lock file; always `{output_root}.lock`.
    pub lock_path: PathBuf,
}

impl OutputLayout {
    /// Layout with the manifest as a `.txt` sibling of the tree root.
    pub fn new(output_root: impl Into<PathBuf>) -> Self {
        let output_root = output_root.into();
        let manifest_path = default_manifest_path(&output_root);
        let lock_path = default_lock_path(&output_root);
        Self {
            output_root,
            manifest_path,
            lock_path,
        }
    }

    /// Override the manifest location.
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }
}

/// `{output_root}.txt`, e.g. `public/llms` → `public/llms.txt`.
pub fn default_manifest_path(output_root: &Path) -> PathBuf {
    let mut raw = output_root.as_os_str().to_owned();
    raw.push(".txt");
    PathBuf::from(raw)
}

/// What a run covered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunScope {
    /// Every public category, with clear and manifest.
    Full,
    /// A single category, no clear, no manifest.
    Category(String),
}

impl fmt::Display for RunScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunScope::Full => f.write_str("full"),
            RunScope::Category(name) => write!(f, "category:{name}"),
        }
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// What the run covered.
    pub scope: RunScope,
    /// Files written.
    pub written: usize,
    /// Items skipped because mapping, conversion or writing failed.
    pub failed: usize,
    /// Writes that replaced a file written earlier in the same run.
    pub collisions: usize,
    /// Lines in the manifest, for full runs.
    pub manifest_entries: Option<usize>,
    /// Result of clearing the tree, for full runs.
    pub cleared: Option<ClearStats>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    fn new(scope: RunScope) -> Self {
        Self {
            scope,
            written: 0,
            failed: 0,
            collisions: 0,
            manifest_entries: None,
            cleared: None,
            duration_ms: 0,
        }
    }
}

/// Exports content items to the Markdown tree and manifest.
#[derive(Debug)]
pub struct RegenerationPipeline<C> {
    converter: C,
    mapper: PathMapper,
    tree: TreeWriter,
    manifest: ManifestBuilder,
    manifest_path: PathBuf,
    lock_path: PathBuf,
    run_lock: Mutex<()>,
}

impl<C: ContentConverter> RegenerationPipeline<C> {
    /// Create a pipeline writing to `layout` with `converter`.
    pub fn new(converter: C, layout: OutputLayout) -> Self {
        Self {
            converter,
            mapper: PathMapper,
            tree: TreeWriter::new(layout.output_root),
            manifest: ManifestBuilder,
            manifest_path: layout.manifest_path,
            lock_path: layout.lock_path,
            run_lock: Mutex::new(()),
        }
    }

    /// Root of the output tree.
    pub fn output_root(&self) -> &Path {
        self.tree.root()
    }

    /// Location of the manifest.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Clear the tree, export every public category, rewrite the manifest.
    ///
    /// # Errors
    ///
    /// Fails only if the tree lock cannot be taken, the source cannot
    /// enumerate a category it listed as public, or the manifest cannot be
    /// written. Per-item failures are counted in the report.
    #[instrument(level = "info", skip_all, fields(root = %self.tree.root().display()))]
    pub async fn full<S: ContentSource + ?Sized>(&self, source: &S) -> Result<RunReport> {
        let _guard = self.run_lock.lock().await;
        let _tree_lock = TreeLock::acquire(&self.lock_path).await?;
        let start = Instant::now();
        let mut report = RunReport::new(RunScope::Full);

        report.cleared = Some(self.tree.clear_all().await);

        // One set for the whole run: collisions across categories count too.
        let mut seen = HashSet::new();
        for category in source.public_categories() {
            let items = source.published(&category)?;
            self.export_items(&category, &items, &mut seen, &mut report)
                .await;
        }

        // The manifest is built from a second enumeration, independent of
        // which writes above succeeded.
        let mut entries = Vec::new();
        for category in source.public_categories() {
            entries.extend(source.published(&category)?.iter().map(ManifestEntry::from));
        }
        let site = source.site();
        let text = self.manifest.build(&site.name, &site.description, &entries);
        write_manifest(&self.manifest_path, &text).await?;
        report.manifest_entries = Some(entries.len());

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            scope = %report.scope,
            written = report.written,
            failed = report.failed,
            manifest_entries = entries.len(),
            duration_ms = report.duration_ms,
            "Full regeneration complete"
        );
        Ok(report)
    }

    /// Export one category's published items over the existing tree.
    ///
    /// # Errors
    ///
    /// Fails if the tree lock cannot be taken or the source does not know
    /// `category` as a public category.
    #[instrument(level = "info", skip_all, fields(%category))]
    pub async fn for_category<S: ContentSource + ?Sized>(
        &self,
        source: &S,
        category: &str,
    ) -> Result<RunReport> {
        let _guard = self.run_lock.lock().await;
        let _tree_lock = TreeLock::acquire(&self.lock_path).await?;
        let start = Instant::now();
        let mut report = RunReport::new(RunScope::Category(category.to_string()));

        let items = source.published(category)?;
        self.export_items(category, &items, &mut HashSet::new(), &mut report)
            .await;

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            scope = %report.scope,
            written = report.written,
            failed = report.failed,
            duration_ms = report.duration_ms,
            "Category regeneration complete"
        );
        Ok(report)
    }

    async fn export_items(
        &self,
        category: &str,
        items: &[ContentItem],
        seen: &mut HashSet<PathBuf>,
        report: &mut RunReport,
    ) {
        debug!(category, count = items.len(), "Exporting category");

        let outcomes: Vec<Option<PathBuf>> = stream::iter(items)
            .then(|item| async move {
                match self.export_item(item).await {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(
                            category,
                            id = item.id,
                            url = %item.canonical_url(),
                            error = %e,
                            "Skipping item"
                        );
                        None
                    }
                }
            })
            .collect()
            .await;

        for path in outcomes {
            match path {
                Some(path) => {
                    if !seen.insert(path.clone()) {
                        report.collisions += 1;
                        warn!(category, path = %path.display(), "Two items map to the same file; the later one wins");
                    }
                    report.written += 1;
                }
                None => report.failed += 1,
            }
        }
    }

    async fn export_item(&self, item: &ContentItem) -> Result<PathBuf> {
        let mapped = self.mapper.map(item.canonical_url())?;
        let relative = mapped.relative_path();
        let body = self.converter.convert(&item.content)?;
        let file = OutputFile {
            dir_segments: mapped.dir_segments,
            filename: mapped.filename,
            body,
        };
        debug!(
            url = %item.canonical_url(),
            path = %relative.display(),
            preview = %truncate_for_log(&file.body, 80),
            "Converted item"
        );
        self.tree
            .write(&file.dir_segments, &file.filename, &file.body)
            .await
    }
}
