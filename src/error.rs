//! Error types shared by the export pipeline, scheduler and configuration.
//!
//! Per-item failures (a bad URL, a failed conversion, a write that hit a
//! permission error) are represented here too, but the pipeline never lets
//! them escape a run: they are logged and counted in the
//! [`RunReport`](crate::pipeline::RunReport).

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Failure raised while converting a rich body to Markdown.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversionError {
    /// Element nesting exceeded the converter's depth limit.
    #[error("markup nested deeper than {depth} elements")]
    TooDeep { depth: usize },
}

/// Errors produced by the exporter.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Filesystem failure, annotated with the path that was being touched.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML (de)serialization failure for settings or content dumps.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON deserialization failure for content dumps.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The item URL could not be parsed as an absolute URL.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// A URL path segment would escape or corrupt the output tree.
    #[error("unsafe path segment {segment:?} in {url:?}")]
    UnsafePath { url: String, segment: String },

    /// The named category is not a public category of the content source.
    #[error("unknown or non-public category: {0}")]
    UnknownCategory(String),

    /// A schedule value outside the allowed set.
    #[error("invalid schedule interval {0:?} (expected one of: none, hourly, twicedaily, daily, weekly, monthly)")]
    InvalidInterval(String),

    /// The converter rejected an item's body.
    #[error("conversion failed: {0}")]
    Conversion(#[from] ConversionError),
}

impl ExportError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
