use std::fmt;
use std::rc::Rc;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::core::{
    ContainerSize, Pass, PassContext, PendingWorkSet, Schedulable, ScaleDictionary, SourceId,
    TargetId,
};
use crate::error::SchedResult;
use crate::extensions::{ObserverSet, TargetContext, TargetEvent};

use super::completion::Completion;
use super::config_state::ConfigState;
use super::data_source::DataSource;
use super::visualization::{DomainData, ReflowContext, SourceResults, ViewContext, Visualization};

pub const DATA_FORMAT_PRIORITY: f64 = 10.0;
pub const VIEW_UPDATE_PRIORITY: f64 = 20.0;
pub const REFLOW_PRIORITY: f64 = 30.0;

/// Lifecycle state of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetState {
    Inactive,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetupState {
    Uninitialized,
    Initialized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InFlightView {
    pub run: u64,
    pub errored: bool,
}

/// Everything needed to build a target; ids and channels are wired by the dashboard.
pub struct TargetOptions {
    pub(crate) visualization: Box<dyn Visualization>,
    pub(crate) sources: Vec<Rc<dyn DataSource>>,
    pub(crate) config: ConfigState,
    pub(crate) scale_names: Vec<String>,
    pub(crate) size: ContainerSize,
}

impl TargetOptions {
    #[must_use]
    pub fn new(visualization: impl Visualization + 'static) -> Self {
        Self {
            visualization: Box::new(visualization),
            sources: Vec::new(),
            config: ConfigState::new(),
            scale_names: Vec::new(),
            size: ContainerSize::default(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: Rc<dyn DataSource>) -> Self {
        self.sources.push(source);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: ConfigState) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_scales<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scale_names = names.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_size(mut self, size: ContainerSize) -> Self {
        self.size = size;
        self
    }
}

/// One visualization component and its three-stage update pipeline.
pub struct VisualizationTarget {
    id: TargetId,
    // scheduler participant
    state: TargetState,
    pending: PendingWorkSet<Self>,
    in_flight: Option<InFlightView>,
    next_run: u64,
    // data-source consumer
    sources: Vec<Rc<dyn DataSource>>,
    config: ConfigState,
    formatted: Option<Value>,
    // scale participant
    scales: ScaleDictionary,
    // view
    visualization: Box<dyn Visualization>,
    setup: SetupState,
    size: ContainerSize,
    printing: bool,
    render_count: u64,
    observers: ObserverSet,
    completions: Sender<Completion>,
}

impl fmt::Debug for VisualizationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisualizationTarget")
            .field("id", &self.id)
            .field("type", &self.visualization.type_name())
            .field("state", &self.state)
            .field("pending", &self.pending.names().collect::<Vec<_>>())
            .field("in_flight", &self.in_flight)
            .field("setup", &self.setup)
            .field("render_count", &self.render_count)
            .finish_non_exhaustive()
    }
}

impl VisualizationTarget {
    pub const DATA_FORMAT: Pass<Self> =
        Pass::deactivation_aware("data_format", DATA_FORMAT_PRIORITY, Self::run_data_format);
    pub const VIEW_UPDATE: Pass<Self> =
        Pass::deactivation_aware("view_update", VIEW_UPDATE_PRIORITY, Self::run_view_update);
    pub const REFLOW: Pass<Self> =
        Pass::deactivation_aware("reflow", REFLOW_PRIORITY, Self::run_reflow);

    pub(crate) fn new(
        id: TargetId,
        options: TargetOptions,
        scales: ScaleDictionary,
        completions: Sender<Completion>,
    ) -> Self {
        for scale in scales.values() {
            scale.borrow_mut().register(id);
        }
        Self {
            id,
            state: TargetState::Inactive,
            pending: PendingWorkSet::new(),
            in_flight: None,
            next_run: 0,
            sources: options.sources,
            config: options.config,
            formatted: None,
            scales,
            visualization: options.visualization,
            setup: SetupState::Uninitialized,
            size: options.size,
            printing: false,
            render_count: 0,
            observers: ObserverSet::default(),
            completions,
        }
    }

    #[must_use]
    pub fn id(&self) -> TargetId {
        self.id
    }

    #[must_use]
    pub fn state(&self) -> TargetState {
        self.state
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.visualization.type_name()
    }

    #[must_use]
    pub fn setup_state(&self) -> SetupState {
        self.setup
    }

    #[must_use]
    pub fn formatted_data(&self) -> Option<&Value> {
        self.formatted.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &ConfigState {
        &self.config
    }

    #[must_use]
    pub fn size(&self) -> ContainerSize {
        self.size
    }

    #[must_use]
    pub fn is_printing(&self) -> bool {
        self.printing
    }

    #[must_use]
    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    #[must_use]
    pub fn scales(&self) -> &ScaleDictionary {
        &self.scales
    }

    #[must_use]
    pub fn pending(&self) -> &PendingWorkSet<Self> {
        &self.pending
    }

    #[must_use]
    pub fn consumes(&self, source: SourceId) -> bool {
        self.sources.iter().any(|entry| entry.id() == source)
    }

    #[must_use]
    pub fn context(&self) -> TargetContext {
        TargetContext {
            target: self.id,
            active: self.is_active(),
            render_count: self.render_count,
            printing: self.printing,
        }
    }

    pub(crate) fn visualization(&self) -> &dyn Visualization {
        self.visualization.as_ref()
    }

    pub(crate) fn observers_mut(&mut self) -> &mut ObserverSet {
        &mut self.observers
    }

    pub(crate) fn emit(&mut self, event: TargetEvent) {
        let context = self.context();
        trace!(target = %self.id, event = event.kind(), "target signal");
        self.observers.emit(&event, context);
    }

    pub(crate) fn set_state(&mut self, state: TargetState) {
        self.state = state;
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Pass<Self>> {
        self.pending.take()
    }

    pub(crate) fn config_mut(&mut self) -> &mut ConfigState {
        &mut self.config
    }

    pub(crate) fn set_size(&mut self, size: ContainerSize) -> bool {
        if self.size == size {
            return false;
        }
        self.size = size;
        true
    }

    pub(crate) fn set_printing(&mut self, printing: bool) -> bool {
        if self.printing == printing {
            return false;
        }
        self.printing = printing;
        true
    }

    pub(crate) fn replace_scales(&mut self, scales: ScaleDictionary) -> ScaleDictionary {
        for scale in scales.values() {
            scale.borrow_mut().register(self.id);
        }
        std::mem::replace(&mut self.scales, scales)
    }

    pub(crate) fn take_scales(&mut self) -> ScaleDictionary {
        std::mem::take(&mut self.scales)
    }

    pub(crate) fn in_flight(&self) -> Option<InFlightView> {
        self.in_flight
    }

    pub(crate) fn mark_in_flight_errored(&mut self) {
        if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.errored = true;
        }
    }

    pub(crate) fn take_in_flight(&mut self, run: u64) -> Option<InFlightView> {
        match self.in_flight {
            Some(in_flight) if in_flight.run == run => self.in_flight.take(),
            _ => None,
        }
    }

    pub(crate) fn record_rendered(&mut self) {
        self.render_count += 1;
        self.emit(TargetEvent::Rendered);
    }

    pub(crate) fn teardown(&mut self) {
        self.pending.clear();
        self.in_flight = None;
        self.emit(TargetEvent::Removed);
        self.observers.clear();
    }

    fn domain_data(&self) -> DomainData {
        DomainData {
            sources: self
                .sources
                .iter()
                .map(|source| SourceResults {
                    source: source.id(),
                    results: source.current_results(),
                })
                .collect(),
            config: self.config.snapshot(),
        }
    }

    fn broadcast_scale_values(&self, formatted: &Value, cx: &mut PassContext<Self>) {
        for (name, scale) in &self.scales {
            let broadcast = match self.visualization.scale_values(name, formatted) {
                Some(values) => scale.borrow_mut().set_values(self.id, values),
                None => scale.borrow_mut().unregister(self.id),
            };
            for recipient in broadcast.recipients {
                cx.invalidate_target(recipient, Self::VIEW_UPDATE);
            }
        }
    }

    fn run_data_format(&mut self, cx: &mut PassContext<Self>) -> SchedResult<()> {
        let domain = self.domain_data();
        let formatted = self.visualization.format_data(&domain)?;
        self.broadcast_scale_values(&formatted, cx);

        let update = self
            .visualization
            .should_update(self.formatted.as_ref(), &formatted);
        self.formatted = Some(formatted);
        if update {
            cx.invalidate(Self::VIEW_UPDATE);
        } else {
            trace!(target = %self.id, "formatted data unchanged, view update skipped");
        }
        Ok(())
    }

    fn run_view_update(&mut self, _cx: &mut PassContext<Self>) -> SchedResult<()> {
        if self.setup == SetupState::Uninitialized {
            self.visualization.setup(&self.config)?;
            self.setup = SetupState::Initialized;
            debug!(target = %self.id, "visualization setup complete");
        }

        self.next_run += 1;
        let run = self.next_run;
        let null = Value::Null;
        let mut view = ViewContext::new(
            self.id,
            run,
            self.formatted.as_ref().unwrap_or(&null),
            &self.config,
            &self.scales,
            self.size,
            self.printing,
            &self.completions,
        );
        self.visualization.update_view(&mut view)?;
        let outcome = view.finish();

        let errored = !outcome.errors.is_empty();
        for message in outcome.errors {
            self.emit(TargetEvent::Error { message });
        }

        if outcome.deferred {
            self.in_flight = Some(InFlightView { run, errored });
            trace!(target = %self.id, run, "view update in flight");
        } else if !errored {
            self.record_rendered();
        }
        Ok(())
    }

    fn run_reflow(&mut self, _cx: &mut PassContext<Self>) -> SchedResult<()> {
        let reflow = ReflowContext {
            target: self.id,
            size: self.size,
            printing: self.printing,
        };
        self.visualization.reflow(&reflow)?;
        self.emit(TargetEvent::Reflowed {
            size: self.size,
            printing: self.printing,
        });
        Ok(())
    }
}

impl Schedulable for VisualizationTarget {
    fn is_active(&self) -> bool {
        self.state == TargetState::Active
    }

    fn defer_work(&mut self, pass: Pass<Self>) {
        if self.pending.record(pass) {
            trace!(target = %self.id, pass = pass.name(), "pending work recorded");
        }
    }

    fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }
}
