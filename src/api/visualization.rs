use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{ContainerSize, ScaleDictionary, ScaleValues, SourceId, TargetId};
use crate::error::{SchedResult, SchedulerError};

use super::completion::{Completion, CompletionHandle};
use super::config_state::{ConfigAttributes, ConfigChange, ConfigState};

/// Results of one data source at formatting time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResults {
    pub source: SourceId,
    pub results: Value,
}

/// Every source's current results combined with the config snapshot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DomainData {
    pub sources: Vec<SourceResults>,
    pub config: ConfigAttributes,
}

impl DomainData {
    pub fn to_value(&self) -> SchedResult<Value> {
        serde_json::to_value(self).map_err(|e| {
            SchedulerError::Serialization(format!("failed to serialize domain data: {e}"))
        })
    }

    #[must_use]
    pub fn results_of(&self, source: SourceId) -> Option<&Value> {
        self.sources
            .iter()
            .find(|entry| entry.source == source)
            .map(|entry| &entry.results)
    }
}

/// Which stage a config change invalidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigReaction {
    Reformat,
    Rerender,
    Reflow,
    Ignore,
}

/// Type-specific behavior of a visualization.
///
/// Only `update_view` is required; the remaining hooks default to the
/// behavior of a plain "format everything, always re-render" component.
pub trait Visualization {
    fn type_name(&self) -> &'static str;

    /// Transforms the combined domain object into formatted data.
    fn format_data(&mut self, domain: &DomainData) -> SchedResult<Value> {
        domain.to_value()
    }

    /// Whether new formatted data warrants a view update.
    fn should_update(&self, _previous: Option<&Value>, _next: &Value) -> bool {
        true
    }

    /// Values this visualization contributes to the scale bound under `scale`.
    /// `None` withdraws the target from that scale.
    fn scale_values(&self, _scale: &str, _formatted: &Value) -> Option<ScaleValues> {
        None
    }

    /// Runs once, before the first view update.
    fn setup(&mut self, _config: &ConfigState) -> SchedResult<()> {
        Ok(())
    }

    fn update_view(&mut self, cx: &mut ViewContext<'_>) -> SchedResult<()>;

    fn reflow(&mut self, _cx: &ReflowContext) -> SchedResult<()> {
        Ok(())
    }

    fn on_config_change(&self, _change: &ConfigChange) -> ConfigReaction {
        ConfigReaction::Reformat
    }
}

/// Inputs and completion controls for one view update.
pub struct ViewContext<'a> {
    target: TargetId,
    run: u64,
    formatted: &'a Value,
    config: &'a ConfigState,
    scales: &'a ScaleDictionary,
    size: ContainerSize,
    printing: bool,
    completions: &'a Sender<Completion>,
    deferred: bool,
    errors: Vec<String>,
}

pub(crate) struct ViewOutcome {
    pub deferred: bool,
    pub errors: Vec<String>,
}

impl<'a> ViewContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        target: TargetId,
        run: u64,
        formatted: &'a Value,
        config: &'a ConfigState,
        scales: &'a ScaleDictionary,
        size: ContainerSize,
        printing: bool,
        completions: &'a Sender<Completion>,
    ) -> Self {
        Self {
            target,
            run,
            formatted,
            config,
            scales,
            size,
            printing,
            completions,
            deferred: false,
            errors: Vec::new(),
        }
    }

    #[must_use]
    pub fn target(&self) -> TargetId {
        self.target
    }

    #[must_use]
    pub fn run(&self) -> u64 {
        self.run
    }

    /// Latest formatted data; `Null` before the first data-format run.
    #[must_use]
    pub fn formatted_data(&self) -> &Value {
        self.formatted
    }

    #[must_use]
    pub fn config(&self) -> &ConfigState {
        self.config
    }

    #[must_use]
    pub fn size(&self) -> ContainerSize {
        self.size
    }

    #[must_use]
    pub fn is_printing(&self) -> bool {
        self.printing
    }

    /// Latest values the other registrants broadcast for `scale`, merged
    /// key by key. Empty for names this target is not bound to.
    #[must_use]
    pub fn scale_values(&self, scale: &str) -> ScaleValues {
        self.scales
            .get(scale)
            .map(|handle| handle.borrow().values_seen_by(self.target))
            .unwrap_or_default()
    }

    /// Extent of `key` across every contribution to `scale`.
    #[must_use]
    pub fn scale_extent(&self, scale: &str, key: &str) -> Option<(f64, f64)> {
        self.scales
            .get(scale)
            .and_then(|handle| handle.borrow().extent(key))
    }

    /// Switches this view update to asynchronous completion.
    ///
    /// "rendered" fires only once the returned handle is completed.
    pub fn defer_completion(&mut self) -> CompletionHandle {
        self.deferred = true;
        CompletionHandle::new(self.target, self.run, self.completions.clone())
    }

    /// Raises the target's "error" signal and suppresses "rendered" for this run.
    pub fn raise_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub(crate) fn finish(self) -> ViewOutcome {
        ViewOutcome {
            deferred: self.deferred,
            errors: self.errors,
        }
    }
}

/// Layout inputs for a reflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflowContext {
    pub target: TargetId,
    pub size: ContainerSize,
    pub printing: bool,
}
