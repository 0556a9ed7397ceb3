use serde::{Deserialize, Serialize};

use crate::core::DEFAULT_MAX_PASSES_PER_FLUSH;
use crate::error::{SchedResult, SchedulerError};

/// Public dashboard bootstrap configuration.
///
/// This type is serializable so host applications can persist/load scheduler
/// setup without inventing their own ad-hoc format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Upper bound on pass executions within one flush.
    #[serde(default = "default_max_passes_per_flush")]
    pub max_passes_per_flush: usize,
    /// New targets start `Active` instead of `Inactive`.
    #[serde(default)]
    pub activate_on_create: bool,
    /// New targets get their data-format stage invalidated on creation.
    #[serde(default = "default_render_on_create")]
    pub render_on_create: bool,
    /// Drain asynchronous completions before each flush.
    #[serde(default = "default_process_completions_on_flush")]
    pub process_completions_on_flush: bool,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_passes_per_flush: default_max_passes_per_flush(),
            activate_on_create: false,
            render_on_create: default_render_on_create(),
            process_completions_on_flush: default_process_completions_on_flush(),
        }
    }

    #[must_use]
    pub fn with_max_passes_per_flush(mut self, limit: usize) -> Self {
        self.max_passes_per_flush = limit;
        self
    }

    #[must_use]
    pub fn with_activate_on_create(mut self, enabled: bool) -> Self {
        self.activate_on_create = enabled;
        self
    }

    #[must_use]
    pub fn with_render_on_create(mut self, enabled: bool) -> Self {
        self.render_on_create = enabled;
        self
    }

    #[must_use]
    pub fn with_process_completions_on_flush(mut self, enabled: bool) -> Self {
        self.process_completions_on_flush = enabled;
        self
    }

    pub fn validate(&self) -> SchedResult<()> {
        if self.max_passes_per_flush == 0 {
            return Err(SchedulerError::InvalidConfig(
                "max_passes_per_flush must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn from_json_str(input: &str) -> SchedResult<Self> {
        let config: Self = serde_json::from_str(input).map_err(|e| {
            SchedulerError::InvalidConfig(format!("failed to parse dashboard config: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> SchedResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            SchedulerError::Serialization(format!("failed to serialize dashboard config: {e}"))
        })
    }
}

fn default_max_passes_per_flush() -> usize {
    DEFAULT_MAX_PASSES_PER_FLUSH
}

fn default_render_on_create() -> bool {
    true
}

fn default_process_completions_on_flush() -> bool {
    true
}
