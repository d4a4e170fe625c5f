//! Per-category regeneration schedules.
//!
//! Each public category gets at most one recurring trigger, identified by a
//! hook key (`llms_export_regeneration_{category}`). The
//! [`ScheduleCoordinator`] reconciles a [`ScheduleConfig`] against a
//! [`TriggerRegistry`], and resolves fired hook keys back to categories
//! through a single dispatch table.
//!
//! # Interval Resolution
//!
//! 1. `apply_to_all`, if set, wins for every category
//! 2. otherwise the category's own entry
//! 3. otherwise [`ScheduleInterval::Daily`]

use crate::convert::ContentConverter;
use crate::error::{ExportError, Result};
use crate::pipeline::{RegenerationPipeline, RunReport};
use crate::source::ContentSource;
use chrono::{DateTime, TimeDelta, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, instrument, warn};

/// Prefix of every per-category hook key.
pub const HOOK_PREFIX: &str = "llms_export_regeneration_";

/// Hook key of the trigger for `category`.
pub fn hook_key(category: &str) -> String {
    format!("{HOOK_PREFIX}{category}")
}

/// How often a category is regenerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleInterval {
    /// Never; the category's trigger is disarmed.
    #[serde(rename = "none")]
    Disabled,
    Hourly,
    Twicedaily,
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl ScheduleInterval {
    /// Every allowed value, in display order.
    pub const ALL: [ScheduleInterval; 6] = [
        ScheduleInterval::Disabled,
        ScheduleInterval::Hourly,
        ScheduleInterval::Twicedaily,
        ScheduleInterval::Daily,
        ScheduleInterval::Weekly,
        ScheduleInterval::Monthly,
    ];

    /// Setting value as stored in configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleInterval::Disabled => "none",
            ScheduleInterval::Hourly => "hourly",
            ScheduleInterval::Twicedaily => "twicedaily",
            ScheduleInterval::Daily => "daily",
            ScheduleInterval::Weekly => "weekly",
            ScheduleInterval::Monthly => "monthly",
        }
    }

    /// Time between fires; `None` for [`ScheduleInterval::Disabled`].
    pub fn period(self) -> Option<TimeDelta> {
        match self {
            ScheduleInterval::Disabled => None,
            ScheduleInterval::Hourly => Some(TimeDelta::hours(1)),
            ScheduleInterval::Twicedaily => Some(TimeDelta::hours(12)),
            ScheduleInterval::Daily => Some(TimeDelta::days(1)),
            ScheduleInterval::Weekly => Some(TimeDelta::days(7)),
            ScheduleInterval::Monthly => Some(TimeDelta::days(30)),
        }
    }
}

impl fmt::Display for ScheduleInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduleInterval {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| ExportError::InvalidInterval(s.to_string()))
    }
}

/// Persisted schedule settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Global override applied to every category when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_to_all: Option<ScheduleInterval>,
    /// Per-category settings.
    #[serde(default)]
    pub categories: BTreeMap<String, ScheduleInterval>,
}

impl ScheduleConfig {
    /// Interval in effect for `category`.
    pub fn effective(&self, category: &str) -> ScheduleInterval {
        self.apply_to_all
            .or_else(|| self.categories.get(category).copied())
            .unwrap_or_default()
    }
}

/// External registry of recurring triggers.
pub trait TriggerRegistry {
    /// Whether a trigger is armed under `key`.
    fn is_armed(&self, key: &str) -> bool;

    /// Interval of the trigger armed under `key`.
    fn armed_interval(&self, key: &str) -> Option<ScheduleInterval>;

    /// Arm a recurring trigger first firing at `first_fire`.
    fn arm(&mut self, key: &str, interval: ScheduleInterval, first_fire: DateTime<Utc>);

    /// Remove the trigger under `key`, if any.
    fn disarm(&mut self, key: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Timer {
    interval: ScheduleInterval,
    next_fire: DateTime<Utc>,
}

/// In-memory [`TriggerRegistry`] driven by wall-clock polling.
#[derive(Debug, Clone, Default)]
pub struct TimerRegistry {
    timers: BTreeMap<String, Timer>,
}

impl TimerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Next fire time of `key`.
    pub fn next_fire(&self, key: &str) -> Option<DateTime<Utc>> {
        self.timers.get(key).map(|t| t.next_fire)
    }

    /// Number of armed triggers.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    /// Whether no trigger is armed.
    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Keys due at `now`, in key order.
    ///
    /// Each due trigger is advanced past `now` by whole periods, so a trigger
    /// that missed several periods fires once.
    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut fired = Vec::new();
        for (key, timer) in &mut self.timers {
            if timer.next_fire > now {
                continue;
            }
            let Some(period) = timer.interval.period() else {
                continue;
            };
            let period_secs = period.num_seconds().max(1);
            let behind = (now - timer.next_fire).num_seconds();
            let periods = behind / period_secs + 1;
            timer.next_fire += TimeDelta::seconds(period_secs * periods);
            fired.push(key.clone());
        }
        fired
    }
}

impl TriggerRegistry for TimerRegistry {
    fn is_armed(&self, key: &str) -> bool {
        self.timers.contains_key(key)
    }

    fn armed_interval(&self, key: &str) -> Option<ScheduleInterval> {
        self.timers.get(key).map(|t| t.interval)
    }

    /// Arming with [`ScheduleInterval::Disabled`] is ignored.
    fn arm(&mut self, key: &str, interval: ScheduleInterval, first_fire: DateTime<Utc>) {
        if interval.period().is_none() {
            return;
        }
        self.timers.insert(
            key.to_string(),
            Timer {
                interval,
                next_fire: first_fire,
            },
        );
    }

    fn disarm(&mut self, key: &str) {
        self.timers.remove(key);
    }
}

/// What a [`ScheduleCoordinator::reconcile`] pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Categories newly armed or re-armed at a new interval.
    pub armed: Vec<String>,
    /// Categories whose trigger was removed.
    pub disarmed: Vec<String>,
    /// Categories left as they were.
    pub unchanged: Vec<String>,
}

impl ReconcileReport {
    /// Whether the pass changed nothing.
    pub fn is_noop(&self) -> bool {
        self.armed.is_empty() && self.disarmed.is_empty()
    }
}

/// Keeps triggers in line with the schedule settings and dispatches fires.
#[derive(Debug)]
pub struct ScheduleCoordinator<R> {
    registry: R,
    // hook key -> category
    dispatch: BTreeMap<String, String>,
}

impl<R: TriggerRegistry> ScheduleCoordinator<R> {
    /// Create a coordinator over `registry`.
    pub fn new(registry: R) -> Self {
        Self {
            registry,
            dispatch: BTreeMap::new(),
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// Mutable access to the underlying registry.
    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    /// Arm, re-arm or disarm each category's trigger to match `config`.
    ///
    /// Idempotent: a second call with the same inputs arms nothing. New
    /// triggers first fire at `now`. Categories missing from `categories`
    /// that were previously dispatched lose their trigger.
    #[instrument(level = "debug", skip_all, fields(categories = categories.len()))]
    pub fn reconcile(
        &mut self,
        config: &ScheduleConfig,
        categories: &[String],
        now: DateTime<Utc>,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();
        let current: HashSet<&str> = categories.iter().map(String::as_str).collect();

        for category in categories.iter().unique() {
            let key = hook_key(category);
            let interval = config.effective(category);

            if interval == ScheduleInterval::Disabled {
                if self.registry.is_armed(&key) {
                    self.registry.disarm(&key);
                    report.disarmed.push(category.clone());
                } else {
                    report.unchanged.push(category.clone());
                }
                self.dispatch.remove(&key);
                continue;
            }

            match self.registry.armed_interval(&key) {
                Some(armed) if armed == interval => report.unchanged.push(category.clone()),
                Some(armed) => {
                    debug!(category = %category, from = %armed, to = %interval, "Re-arming trigger");
                    self.registry.disarm(&key);
                    self.registry.arm(&key, interval, now);
                    report.armed.push(category.clone());
                }
                None => {
                    self.registry.arm(&key, interval, now);
                    report.armed.push(category.clone());
                }
            }
            self.dispatch.insert(key, category.clone());
        }

        let stale: Vec<String> = self
            .dispatch
            .iter()
            .filter(|(_, category)| !current.contains(category.as_str()))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            if let Some(category) = self.dispatch.remove(&key) {
                self.registry.disarm(&key);
                report.disarmed.push(category);
            }
        }

        if !report.is_noop() {
            info!(
                armed = ?report.armed,
                disarmed = ?report.disarmed,
                "Schedules reconciled"
            );
        }
        report
    }

    /// Category dispatched by `hook`.
    pub fn category_for(&self, hook: &str) -> Option<&str> {
        self.dispatch.get(hook).map(String::as_str)
    }

    /// Handle a fired trigger by regenerating its category.
    ///
    /// Returns `None` if `hook` is not in the dispatch table.
    pub async fn fire<C, S>(
        &self,
        hook: &str,
        pipeline: &RegenerationPipeline<C>,
        source: &S,
    ) -> Option<Result<RunReport>>
    where
        C: ContentConverter,
        S: ContentSource + ?Sized,
    {
        let Some(category) = self.category_for(hook) else {
            warn!(%hook, "Fired trigger has no dispatch entry");
            return None;
        };
        info!(%hook, %category, "Scheduled regeneration firing");
        Some(pipeline.for_category(source, category).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::HtmlToMarkdown;
    use crate::pipeline::OutputLayout;
    use crate::source::FileContentSource;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 6, 12, 0, 0).unwrap()
    }

    fn cats(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    /// Registry that counts arm calls, to catch double arming.
    #[derive(Default)]
    struct CountingRegistry {
        inner: TimerRegistry,
        arms: usize,
    }

    impl TriggerRegistry for CountingRegistry {
        fn is_armed(&self, key: &str) -> bool {
            self.inner.is_armed(key)
        }
        fn armed_interval(&self, key: &str) -> Option<ScheduleInterval> {
            self.inner.armed_interval(key)
        }
        fn arm(&mut self, key: &str, interval: ScheduleInterval, first_fire: DateTime<Utc>) {
            self.arms += 1;
            self.inner.arm(key, interval, first_fire);
        }
        fn disarm(&mut self, key: &str) {
            self.inner.disarm(key);
        }
    }

    #[test]
    fn test_interval_parse_and_display() {
        for interval in ScheduleInterval::ALL {
            assert_eq!(interval.as_str().parse::<ScheduleInterval>().unwrap(), interval);
        }
        assert!(matches!(
            "fortnightly".parse::<ScheduleInterval>(),
            Err(ExportError::InvalidInterval(_))
        ));
        assert_eq!(ScheduleInterval::Disabled.to_string(), "none");
    }

    #[test]
    fn test_interval_serde_spelling() {
        let yaml = serde_yaml::to_string(&ScheduleInterval::Twicedaily).unwrap();
        assert_eq!(yaml.trim(), "twicedaily");
        let none: ScheduleInterval = serde_yaml::from_str("none").unwrap();
        assert_eq!(none, ScheduleInterval::Disabled);
        assert!(serde_yaml::from_str::<ScheduleInterval>("yearly").is_err());
    }

    #[test]
    fn test_effective_interval_resolution() {
        let mut config = ScheduleConfig::default();
        assert_eq!(config.effective("post"), ScheduleInterval::Daily);

        config.categories.insert("post".into(), ScheduleInterval::Hourly);
        assert_eq!(config.effective("post"), ScheduleInterval::Hourly);
        assert_eq!(config.effective("page"), ScheduleInterval::Daily);

        config.apply_to_all = Some(ScheduleInterval::Weekly);
        assert_eq!(config.effective("post"), ScheduleInterval::Weekly);
        assert_eq!(config.effective("page"), ScheduleInterval::Weekly);
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let mut coordinator = ScheduleCoordinator::new(CountingRegistry::default());
        let mut config = ScheduleConfig::default();
        config.categories.insert("page".into(), ScheduleInterval::Disabled);
        let categories = cats(&["page", "post", "product"]);

        let first = coordinator.reconcile(&config, &categories, t0());
        assert_eq!(first.armed, cats(&["post", "product"]));
        assert_eq!(coordinator.registry().arms, 2);

        let second = coordinator.reconcile(&config, &categories, t0() + TimeDelta::minutes(5));
        assert!(second.is_noop());
        assert_eq!(second.unchanged.len(), 3);
        assert_eq!(coordinator.registry().arms, 2);
        assert_eq!(coordinator.registry().inner.len(), 2);
        // Not re-armed, so the first fire time is untouched.
        assert_eq!(coordinator.registry().inner.next_fire(&hook_key("post")), Some(t0()));
    }

    #[test]
    fn test_reconcile_disarms_none_and_rearms_changes() {
        let mut coordinator = ScheduleCoordinator::new(TimerRegistry::new());
        let categories = cats(&["page", "post"]);
        let mut config = ScheduleConfig::default();
        coordinator.reconcile(&config, &categories, t0());
        assert!(coordinator.registry().is_armed(&hook_key("page")));

        config.categories.insert("page".into(), ScheduleInterval::Disabled);
        config.categories.insert("post".into(), ScheduleInterval::Hourly);
        let report = coordinator.reconcile(&config, &categories, t0());

        assert_eq!(report.disarmed, cats(&["page"]));
        assert_eq!(report.armed, cats(&["post"]));
        assert!(!coordinator.registry().is_armed(&hook_key("page")));
        assert_eq!(
            coordinator.registry().armed_interval(&hook_key("post")),
            Some(ScheduleInterval::Hourly)
        );
        assert_eq!(coordinator.category_for(&hook_key("page")), None);
        assert_eq!(coordinator.category_for(&hook_key("post")), Some("post"));
    }

    #[test]
    fn test_reconcile_apply_to_all_overrides() {
        let mut coordinator = ScheduleCoordinator::new(TimerRegistry::new());
        let config = ScheduleConfig {
            apply_to_all: Some(ScheduleInterval::Disabled),
            categories: [("post".to_string(), ScheduleInterval::Hourly)].into(),
        };
        coordinator.reconcile(&config, &cats(&["page", "post"]), t0());
        assert!(coordinator.registry().is_empty());
    }

    #[test]
    fn test_reconcile_drops_vanished_categories() {
        let mut coordinator = ScheduleCoordinator::new(TimerRegistry::new());
        let config = ScheduleConfig::default();
        coordinator.reconcile(&config, &cats(&["page", "post"]), t0());

        let report = coordinator.reconcile(&config, &cats(&["page"]), t0());
        assert_eq!(report.disarmed, cats(&["post"]));
        assert!(!coordinator.registry().is_armed(&hook_key("post")));
        assert_eq!(coordinator.category_for(&hook_key("post")), None);
    }

    #[test]
    fn test_timer_registry_due_collapses_missed_periods() {
        let mut registry = TimerRegistry::new();
        registry.arm("a", ScheduleInterval::Hourly, t0());
        registry.arm("b", ScheduleInterval::Daily, t0() + TimeDelta::hours(2));
        registry.arm("off", ScheduleInterval::Disabled, t0());
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.due(t0() - TimeDelta::seconds(1)), Vec::<String>::new());
        assert_eq!(registry.due(t0()), vec!["a"]);
        assert_eq!(registry.next_fire("a"), Some(t0() + TimeDelta::hours(1)));

        // Five hours later: one fire each, not five for "a".
        let later = t0() + TimeDelta::hours(5) + TimeDelta::minutes(30);
        assert_eq!(registry.due(later), vec!["a", "b"]);
        assert_eq!(registry.next_fire("a"), Some(t0() + TimeDelta::hours(6)));
        assert_eq!(registry.next_fire("b"), Some(t0() + TimeDelta::hours(26)));
        assert!(registry.due(later).is_empty());
    }

    #[tokio::test]
    async fn test_fire_runs_the_dispatched_category() {
        let dir = TempDir::new().unwrap();
        let source = FileContentSource::parse(
            r#"
site: {name: S, description: D}
categories:
  - name: page
    items: [{id: 1, url: "https://x/about/", title: About, content: "<p>a</p>"}]
  - name: post
    items: [{id: 2, url: "https://x/news/hi/", title: Hi, content: "<p>b</p>"}]
"#,
            false,
        )
        .unwrap();
        let pipeline = RegenerationPipeline::new(
            HtmlToMarkdown::default(),
            OutputLayout::new(dir.path().join("llms")),
        );
        let mut coordinator = ScheduleCoordinator::new(TimerRegistry::new());
        coordinator.reconcile(&ScheduleConfig::default(), &source.public_categories(), t0());

        let due = coordinator.registry_mut().due(t0());
        assert_eq!(due.len(), 2);

        let report = coordinator
            .fire(&hook_key("post"), &pipeline, &source)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.written, 1);
        assert!(dir.path().join("llms/news/hi.md").exists());
        assert!(!dir.path().join("llms/about.md").exists());

        assert!(coordinator.fire("unknown_hook", &pipeline, &source).await.is_none());
    }
}
