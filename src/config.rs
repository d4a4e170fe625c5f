//! Persisted exporter settings.
//!
//! Settings live in a YAML file (default `llms_export.yaml`):
//!
//! ```yaml
//! content: ./content.yaml
//! output_root: ./public/llms
//! manifest_path: ./public/llms.txt   # optional, defaults to "{output_root}.txt"
//! schedule:
//!   apply_to_all: daily              # optional, overrides every category
//!   categories:
//!     post: hourly
//!     page: none
//! ```
//!
//! Relative paths are resolved against the working directory. Schedule values
//! are validated when written through [`Settings::set_schedule`] and when the
//! file is parsed, so an invalid interval never reaches the scheduler.

use crate::error::{ExportError, Result};
use crate::pipeline::OutputLayout;
use crate::schedule::{ScheduleConfig, ScheduleInterval};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

/// Default settings file name.
pub const DEFAULT_CONFIG_FILE: &str = "llms_export.yaml";

fn default_content() -> PathBuf {
    PathBuf::from("content.yaml")
}

fn default_output_root() -> PathBuf {
    PathBuf::from("llms")
}

/// Exporter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Content dump read by the file content source.
    #[serde(default = "default_content")]
    pub content: PathBuf,
    /// Root of the exported tree.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,
    /// Manifest location; `{output_root}.txt` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<PathBuf>,
    /// Regeneration schedules.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            content: default_content(),
            output_root: default_output_root(),
            manifest_path: None,
            schedule: ScheduleConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed,
    /// including unknown schedule interval values.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path).await {
            Ok(raw) => {
                let settings = Self::parse(&raw)?;
                info!("Loaded settings");
                Ok(settings)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("Settings file not found; using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ExportError::io(path, e)),
        }
    }

    /// Parse settings from YAML text. Empty text yields defaults.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Write settings to `path`, replacing the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized or written.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn save(&self, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ExportError::io(parent, e))?;
        }
        fs::write(path, yaml)
            .await
            .map_err(|e| ExportError::io(path, e))?;
        info!("Saved settings");
        Ok(())
    }

    /// Output locations derived from these settings.
    pub fn layout(&self) -> OutputLayout {
        let layout = OutputLayout::new(&self.output_root);
        match &self.manifest_path {
            Some(path) => layout.with_manifest_path(path),
            None => layout,
        }
    }

    /// Set one category's schedule from its setting value.
    ///
    /// # Errors
    ///
    /// * [`ExportError::InvalidInterval`] if `value` is not an allowed interval
    /// * [`ExportError::UnknownCategory`] if `category` is not in `public`
    pub fn set_schedule(
        &mut self,
        category: &str,
        value: &str,
        public: &[String],
    ) -> Result<ScheduleInterval> {
        let interval: ScheduleInterval = value.parse()?;
        if !public.iter().any(|c| c == category) {
            return Err(ExportError::UnknownCategory(category.to_string()));
        }
        self.schedule
            .categories
            .insert(category.to_string(), interval);
        Ok(interval)
    }

    /// Set or clear the global override. `None` clears it.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::InvalidInterval`] if `value` is not an allowed interval.
    pub fn set_apply_to_all(&mut self, value: Option<&str>) -> Result<Option<ScheduleInterval>> {
        self.schedule.apply_to_all = value.map(str::parse).transpose()?;
        Ok(self.schedule.apply_to_all)
    }
}
