//! # LLMs Export
//!
//! Regenerates a mirrored tree of Markdown renditions of published content,
//! plus a single `llms.txt` manifest linking to them, either on demand or on
//! a recurring per-category schedule.
//!
//! ## Usage
//!
//! ```sh
//! llms_export regenerate                 # full rebuild + manifest
//! llms_export category post              # refresh one category
//! llms_export schedule set page weekly   # change a schedule
//! llms_export daemon                     # run schedules; SIGHUP = cache cleared
//! ```
//!
//! ## Architecture
//!
//! 1. **Source**: Load the content dump and enumerate public categories
//! 2. **Mapping**: Derive each item's file path from its public URL
//! 3. **Conversion**: Turn each item's HTML body into Markdown
//! 4. **Output**: Write the `.md` tree, then the manifest (full runs only)

use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod convert;
mod daemon;
mod error;
mod models;
mod outputs;
mod paths;
mod pipeline;
mod schedule;
mod source;
mod utils;

use cli::{Cli, Command, ScheduleCommand};
use config::Settings;
use convert::HtmlToMarkdown;
use daemon::{Daemon, DaemonOptions};
use pipeline::{RegenerationPipeline, RunReport};
use source::{ContentSource, FileContentSource};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(config = %args.config.display(), command = ?args.command, "Parsed CLI arguments");

    let mut settings = Settings::load(&args.config).await?;

    match args.command {
        Command::Regenerate => {
            let source = FileContentSource::load(&settings.content).await?;
            let pipeline = writable_pipeline(&settings).await?;
            let report = pipeline.full(&source).await?;
            summarize(&report);
        }
        Command::Category { name } => {
            let source = FileContentSource::load(&settings.content).await?;
            let pipeline = writable_pipeline(&settings).await?;
            let report = pipeline.for_category(&source, &name).await?;
            summarize(&report);
        }
        Command::Schedule(cmd) => {
            let source = FileContentSource::load(&settings.content).await?;
            let public = source.public_categories();
            match cmd {
                ScheduleCommand::Show => {
                    for category in &public {
                        let label = source.label(category).unwrap_or(category.as_str());
                        info!(
                            %category,
                            %label,
                            interval = %settings.schedule.effective(category),
                            "Schedule"
                        );
                    }
                    if let Some(all) = settings.schedule.apply_to_all {
                        info!(interval = %all, "Global override in effect");
                    }
                }
                ScheduleCommand::Set { category, interval } => {
                    let interval = settings.set_schedule(&category, &interval, &public)?;
                    settings.save(&args.config).await?;
                    info!(%category, %interval, "Schedule updated");
                }
                ScheduleCommand::SetAll { interval } => {
                    let interval = settings.set_apply_to_all(Some(&interval))?;
                    settings.save(&args.config).await?;
                    info!(interval = ?interval.map(|i| i.to_string()), "Global override set");
                }
                ScheduleCommand::ClearAll => {
                    settings.set_apply_to_all(None)?;
                    settings.save(&args.config).await?;
                    info!("Global override cleared");
                }
            }
        }
        Command::Daemon { tick_secs } => {
            let options = DaemonOptions {
                config_path: args.config.clone(),
                tick: Duration::from_secs(tick_secs),
            };
            ensure_writable_dir(parent_or_cwd(&settings.output_root)).await?;
            Daemon::new(options, settings).run().await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Build the pipeline after checking the tree's parent directory is writable.
async fn writable_pipeline(
    settings: &Settings,
) -> Result<RegenerationPipeline<HtmlToMarkdown>, Box<dyn Error>> {
    let layout = settings.layout();
    if let Err(e) = ensure_writable_dir(parent_or_cwd(&layout.output_root)).await {
        error!(
            path = %layout.output_root.display(),
            error = %e,
            "Output location is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }
    Ok(RegenerationPipeline::new(HtmlToMarkdown::default(), layout))
}

fn parent_or_cwd(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn summarize(report: &RunReport) {
    if report.failed > 0 {
        error!(
            scope = %report.scope,
            written = report.written,
            failed = report.failed,
            collisions = report.collisions,
            "Regeneration finished with failures"
        );
    } else {
        info!(
            scope = %report.scope,
            written = report.written,
            collisions = report.collisions,
            manifest_entries = ?report.manifest_entries,
            "Markdown files have been successfully regenerated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_or_cwd() {
        assert_eq!(parent_or_cwd(Path::new("llms")), Path::new("."));
        assert_eq!(parent_or_cwd(Path::new("public/llms")), Path::new("public"));
        assert_eq!(parent_or_cwd(Path::new("/srv/llms")), Path::new("/srv"));
    }
}
