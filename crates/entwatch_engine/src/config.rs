//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use std::time::Duration;

/// Configuration for the change engine.
///
/// All fields are hot-reloadable through [`ConfigPatch`]; changing the
/// poll interval while the scheduler is running restarts its timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Master switch; a disabled engine refuses to start.
    pub enabled: bool,

    /// Delay between scheduled poll cycles.
    pub poll_interval: Duration,

    /// Entity types to poll, in processing order.
    pub tracked_entity_types: Vec<String>,

    /// Maximum records fetched per entity type per cycle.
    pub max_records_per_poll: usize,

    /// Maximum entities loaded per type during the initial baseline.
    pub initial_snapshot_limit: usize,

    /// When false, events are still produced and returned but not
    /// delivered to subscribers.
    pub notifications_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(30),
            tracked_entity_types: Vec::new(),
            max_records_per_poll: 100,
            initial_snapshot_limit: 500,
            notifications_enabled: true,
        }
    }
}

impl EngineConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the engine may start.
    #[must_use]
    pub const fn enabled(mut self, value: bool) -> Self {
        self.enabled = value;
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Appends an entity type to track. Duplicates are ignored.
    #[must_use]
    pub fn track(mut self, entity_type: impl Into<String>) -> Self {
        let entity_type = entity_type.into();
        if !self.tracked_entity_types.contains(&entity_type) {
            self.tracked_entity_types.push(entity_type);
        }
        self
    }

    /// Sets the per-type record cap per cycle.
    #[must_use]
    pub const fn max_records_per_poll(mut self, limit: usize) -> Self {
        self.max_records_per_poll = limit;
        self
    }

    /// Sets the baseline load cap per entity type.
    #[must_use]
    pub const fn initial_snapshot_limit(mut self, limit: usize) -> Self {
        self.initial_snapshot_limit = limit;
        self
    }

    /// Sets whether events are delivered to subscribers.
    #[must_use]
    pub const fn notifications_enabled(mut self, value: bool) -> Self {
        self.notifications_enabled = value;
        self
    }

    /// Validates field constraints.
    pub fn validate(&self) -> EngineResult<()> {
        if self.poll_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "poll interval must be positive".into(),
            ));
        }
        if self.max_records_per_poll == 0 {
            return Err(EngineError::InvalidConfig(
                "max records per poll must be positive".into(),
            ));
        }
        if self.initial_snapshot_limit == 0 {
            return Err(EngineError::InvalidConfig(
                "initial snapshot limit must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// A partial configuration merged over the current one by
/// `ChangeEngine::update_config`.
///
/// `None` fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    /// New master switch value.
    pub enabled: Option<bool>,
    /// New poll interval.
    pub poll_interval: Option<Duration>,
    /// Replacement tracked-type list.
    pub tracked_entity_types: Option<Vec<String>>,
    /// New per-type record cap.
    pub max_records_per_poll: Option<usize>,
    /// New baseline load cap.
    pub initial_snapshot_limit: Option<usize>,
    /// New notification switch value.
    pub notifications_enabled: Option<bool>,
}

impl ConfigPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the result of applying this patch to `base`, after
    /// validating the merged configuration.
    pub fn apply_to(&self, base: &EngineConfig) -> EngineResult<EngineConfig> {
        let mut merged = base.clone();
        if let Some(enabled) = self.enabled {
            merged.enabled = enabled;
        }
        if let Some(interval) = self.poll_interval {
            merged.poll_interval = interval;
        }
        if let Some(types) = &self.tracked_entity_types {
            merged.tracked_entity_types = types.clone();
        }
        if let Some(limit) = self.max_records_per_poll {
            merged.max_records_per_poll = limit;
        }
        if let Some(limit) = self.initial_snapshot_limit {
            merged.initial_snapshot_limit = limit;
        }
        if let Some(notifications) = self.notifications_enabled {
            merged.notifications_enabled = notifications;
        }
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.enabled);
        assert!(config.notifications_enabled);
        assert_eq!(config.initial_snapshot_limit, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = EngineConfig::new()
            .poll_interval(Duration::from_millis(250))
            .track("task")
            .track("invoice")
            .track("task")
            .max_records_per_poll(50)
            .notifications_enabled(false);

        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.tracked_entity_types, vec!["task", "invoice"]);
        assert_eq!(config.max_records_per_poll, 50);
        assert!(!config.notifications_enabled);
    }

    #[test]
    fn validation_rejects_zero_values() {
        let config = EngineConfig::new().poll_interval(Duration::ZERO);
        assert!(config.validate().is_err());

        let config = EngineConfig::new().max_records_per_poll(0);
        assert!(config.validate().is_err());

        let config = EngineConfig::new().initial_snapshot_limit(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn patch_merges_only_set_fields() {
        let base = EngineConfig::new().track("task");
        let patch = ConfigPatch {
            poll_interval: Some(Duration::from_secs(5)),
            notifications_enabled: Some(false),
            ..ConfigPatch::default()
        };

        let merged = patch.apply_to(&base).unwrap();
        assert_eq!(merged.poll_interval, Duration::from_secs(5));
        assert!(!merged.notifications_enabled);
        // Untouched fields survive.
        assert_eq!(merged.tracked_entity_types, vec!["task"]);
        assert_eq!(merged.max_records_per_poll, base.max_records_per_poll);
    }

    #[test]
    fn patch_rejects_invalid_merge() {
        let base = EngineConfig::default();
        let patch = ConfigPatch {
            poll_interval: Some(Duration::ZERO),
            ..ConfigPatch::default()
        };
        assert!(patch.apply_to(&base).is_err());
    }

    #[test]
    fn empty_patch_is_identity() {
        let base = EngineConfig::new().track("task").max_records_per_poll(7);
        let merged = ConfigPatch::new().apply_to(&base).unwrap();
        assert_eq!(merged, base);
    }
}
