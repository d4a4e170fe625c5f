//! Long-running trigger loop.
//!
//! On every tick the daemon reloads settings and the content dump, reconciles
//! the per-category triggers, and runs a category export for each trigger
//! that is due. A `SIGHUP` (the "cache was cleared" event) runs a full
//! regeneration immediately, bypassing the schedule. `Ctrl-C` stops the loop.
//!
//! Everything runs on the loop's own task, so at most one export is in
//! flight here. A manual `llms_export regenerate` in another process waits on
//! the tree's lock file until the daemon's current run has finished.

use crate::config::Settings;
use crate::convert::HtmlToMarkdown;
use crate::error::Result;
use crate::pipeline::RegenerationPipeline;
use crate::schedule::{ScheduleCoordinator, TimerRegistry};
use crate::source::{ContentSource, FileContentSource};
use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, instrument, warn};

/// Daemon options.
#[derive(Debug, Clone)]
pub struct DaemonOptions {
    /// Settings file, re-read on every tick.
    pub config_path: PathBuf,
    /// Time between schedule checks.
    pub tick: Duration,
}

/// State owned by the trigger loop.
#[derive(Debug)]
pub struct Daemon {
    options: DaemonOptions,
    settings: Settings,
    pipeline: RegenerationPipeline<HtmlToMarkdown>,
    coordinator: ScheduleCoordinator<TimerRegistry>,
}

impl Daemon {
    /// Create a daemon starting from already loaded `settings`.
    pub fn new(options: DaemonOptions, settings: Settings) -> Self {
        let pipeline = RegenerationPipeline::new(HtmlToMarkdown::default(), settings.layout());
        Self {
            options,
            settings,
            pipeline,
            coordinator: ScheduleCoordinator::new(TimerRegistry::new()),
        }
    }

    /// Run until `Ctrl-C`.
    ///
    /// # Errors
    ///
    /// Fails only if the cache-clear signal handler cannot be installed.
    pub async fn run(mut self) -> Result<()> {
        let mut ticker = interval(self.options.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cache_cleared = CacheClearSignal::install()?;

        info!(
            config = %self.options.config_path.display(),
            tick_secs = self.options.tick.as_secs(),
            "Daemon started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => self.on_tick().await,
                _ = cache_cleared.recv() => self.on_cache_cleared().await,
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Reload settings; keep the previous ones if the file is broken.
    async fn reload_settings(&mut self) {
        match Settings::load(&self.options.config_path).await {
            Ok(settings) => {
                if settings.layout() != self.settings.layout() {
                    info!(
                        root = %settings.output_root.display(),
                        "Output layout changed; rebuilding pipeline"
                    );
                    self.pipeline =
                        RegenerationPipeline::new(HtmlToMarkdown::default(), settings.layout());
                }
                self.settings = settings;
            }
            Err(e) => warn!(error = %e, "Settings reload failed; keeping previous settings"),
        }
    }

    async fn load_source(&self) -> Option<FileContentSource> {
        match FileContentSource::load(&self.settings.content).await {
            Ok(source) => Some(source),
            Err(e) => {
                error!(
                    path = %self.settings.content.display(),
                    error = %e,
                    "Cannot load content dump"
                );
                None
            }
        }
    }

    #[instrument(level = "debug", skip_all)]
    async fn on_tick(&mut self) {
        self.reload_settings().await;
        let Some(source) = self.load_source().await else {
            return;
        };

        let categories = source.public_categories();
        self.coordinator
            .reconcile(&self.settings.schedule, &categories, Utc::now());

        let due = self.coordinator.registry_mut().due(Utc::now());
        debug!(
            due = due.len(),
            armed = self.coordinator.registry().len(),
            "Checked triggers"
        );
        for hook in due {
            match self.coordinator.fire(&hook, &self.pipeline, &source).await {
                Some(Ok(report)) => debug!(
                    %hook,
                    written = report.written,
                    failed = report.failed,
                    next_fire = ?self.coordinator.registry().next_fire(&hook),
                    "Trigger handled"
                ),
                Some(Err(e)) => error!(%hook, error = %e, "Scheduled regeneration failed"),
                None => {}
            }
        }
    }

    #[instrument(level = "info", skip_all)]
    async fn on_cache_cleared(&mut self) {
        info!("Cache cleared; running full regeneration");
        self.reload_settings().await;
        let Some(source) = self.load_source().await else {
            return;
        };
        if let Err(e) = self.pipeline.full(&source).await {
            error!(error = %e, "Full regeneration failed");
        }
    }
}

/// The external "cache was cleared" event: `SIGHUP` on unix.
#[cfg(unix)]
struct CacheClearSignal(tokio::signal::unix::Signal);

#[cfg(unix)]
impl CacheClearSignal {
    fn install() -> Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};
        let sig = signal(SignalKind::hangup())
            .map_err(|e| crate::error::ExportError::io("SIGHUP", e))?;
        Ok(Self(sig))
    }

    async fn recv(&mut self) {
        if self.0.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

/// No cache-clear signal off unix; the future never resolves.
#[cfg(not(unix))]
struct CacheClearSignal;

#[cfg(not(unix))]
impl CacheClearSignal {
    fn install() -> Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await;
    }
}
