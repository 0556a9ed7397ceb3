mod completion;
mod config_state;
mod dashboard_config;
mod data_source;
mod lifecycle;
mod snapshot;
mod target;
mod triggers;
mod visualization;

use std::sync::mpsc::{self, Receiver, Sender};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::{
    FlushReport, Invalidation, Pass, ScaleHandle, ScaleRegistry, Scheduler, TargetId,
};
use crate::error::{SchedResult, SchedulerError};
use crate::extensions::{TargetEvent, TargetObserver};

pub use completion::{Completion, CompletionHandle, CompletionOutcome};
pub use config_state::{ConfigAttributes, ConfigChange, ConfigState};
pub use dashboard_config::DashboardConfig;
pub use data_source::{DataSource, SharedDataSource};
pub use snapshot::{DASHBOARD_SNAPSHOT_JSON_SCHEMA_V1, DashboardSnapshot, TargetSnapshot};
pub use target::{
    DATA_FORMAT_PRIORITY, REFLOW_PRIORITY, SetupState, TargetOptions, TargetState,
    VIEW_UPDATE_PRIORITY, VisualizationTarget,
};
pub use visualization::{
    ConfigReaction, DomainData, ReflowContext, SourceResults, ViewContext, Visualization,
};

/// Hosting surface for a page of visualizations.
///
/// Owns the global scheduler, every target, the shared scale registry and
/// the completion channel for asynchronous view updates.
pub struct Dashboard {
    config: DashboardConfig,
    scheduler: Scheduler<VisualizationTarget>,
    targets: IndexMap<TargetId, VisualizationTarget>,
    scales: ScaleRegistry,
    completion_tx: Sender<Completion>,
    completion_rx: Receiver<Completion>,
    next_target_id: u32,
    printing: bool,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("targets", &self.targets.len())
            .field("printing", &self.printing)
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    pub fn new(config: DashboardConfig) -> SchedResult<Self> {
        config.validate()?;
        let (completion_tx, completion_rx) = mpsc::channel();
        Ok(Self {
            config,
            scheduler: Scheduler::new().with_max_passes_per_flush(config.max_passes_per_flush),
            targets: IndexMap::new(),
            scales: ScaleRegistry::new(),
            completion_tx,
            completion_rx,
            next_target_id: 1,
            printing: false,
        })
    }

    #[must_use]
    pub fn config(&self) -> DashboardConfig {
        self.config
    }

    #[must_use]
    pub fn target(&self, id: TargetId) -> Option<&VisualizationTarget> {
        self.targets.get(&id)
    }

    pub fn target_ids(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.targets.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    #[must_use]
    pub fn is_printing(&self) -> bool {
        self.printing
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler<VisualizationTarget> {
        &self.scheduler
    }

    #[must_use]
    pub fn scale_registry(&self) -> &ScaleRegistry {
        &self.scales
    }

    /// Shared scale for `name`, created on first use.
    pub fn scale(&mut self, name: &str) -> ScaleHandle {
        self.scales.scale(name)
    }

    #[must_use]
    pub fn is_active(&self, id: TargetId) -> bool {
        self.targets
            .get(&id)
            .is_some_and(|target| target.state() == TargetState::Active)
    }

    #[must_use]
    pub fn is_valid(&self, id: TargetId, pass: Pass<VisualizationTarget>) -> bool {
        self.scheduler.is_valid(id, pass.name())
    }

    #[must_use]
    pub fn pending_passes(&self, id: TargetId) -> Vec<&'static str> {
        self.targets
            .get(&id)
            .map(|target| target.pending().names().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn formatted_data(&self, id: TargetId) -> Option<&Value> {
        self.targets.get(&id).and_then(VisualizationTarget::formatted_data)
    }

    pub fn subscribe(&mut self, id: TargetId, observer: Box<dyn TargetObserver>) -> SchedResult<()> {
        self.target_mut(id)?.observers_mut().register(observer)
    }

    pub fn unsubscribe(&mut self, id: TargetId, observer_id: &str) -> SchedResult<bool> {
        Ok(self.target_mut(id)?.observers_mut().unregister(observer_id))
    }

    /// Invalidates one pass on one target.
    pub fn invalidate(
        &mut self,
        id: TargetId,
        pass: Pass<VisualizationTarget>,
    ) -> SchedResult<Invalidation> {
        self.scheduler.invalidate(&mut self.targets, id, pass)
    }

    /// Drops an outstanding pass without running it.
    pub fn mark_valid(&mut self, id: TargetId, pass: Pass<VisualizationTarget>) {
        self.scheduler.mark_valid(id, pass.name());
    }

    /// Runs every currently invalid pass across all active targets.
    pub fn flush(&mut self) -> SchedResult<FlushReport> {
        if self.config.process_completions_on_flush {
            self.process_completions();
        }
        self.scheduler.flush(&mut self.targets)
    }

    /// Flushes until no queued work remains, returning the number of flushes.
    pub fn flush_until_idle(&mut self, max_flushes: usize) -> SchedResult<usize> {
        let mut flushes = 0;
        while self.scheduler.has_queued_work() {
            if flushes == max_flushes {
                return Err(SchedulerError::FlushLimitExceeded { limit: max_flushes });
            }
            self.flush()?;
            flushes += 1;
        }
        Ok(flushes)
    }

    /// Applies every asynchronous completion received so far.
    pub fn process_completions(&mut self) -> usize {
        let received: Vec<Completion> = self.completion_rx.try_iter().collect();
        let count = received.len();
        for completion in received {
            self.apply_completion(completion);
        }
        count
    }

    fn apply_completion(&mut self, completion: Completion) {
        let Some(target) = self.targets.get_mut(&completion.target) else {
            debug!(target = %completion.target, "completion for removed target ignored");
            return;
        };
        let Some(in_flight) = target.take_in_flight(completion.run) else {
            warn!(
                target = %completion.target,
                run = completion.run,
                "stale completion ignored"
            );
            return;
        };

        match completion.outcome {
            CompletionOutcome::Done if !in_flight.errored => target.record_rendered(),
            CompletionOutcome::Done => {
                debug!(target = %completion.target, run = in_flight.run, "rendered suppressed after error");
            }
            CompletionOutcome::Failed(message) => target.emit(TargetEvent::Error { message }),
        }
        self.scheduler.release(completion.target);
    }

    fn target_mut(&mut self, id: TargetId) -> SchedResult<&mut VisualizationTarget> {
        self.targets
            .get_mut(&id)
            .ok_or(SchedulerError::UnknownTarget(id))
    }

    fn allocate_target_id(&mut self) -> TargetId {
        let id = TargetId::new(self.next_target_id);
        self.next_target_id += 1;
        id
    }
}
