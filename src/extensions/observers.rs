use serde::{Deserialize, Serialize};

use crate::core::{ContainerSize, TargetId};
use crate::error::{SchedResult, SchedulerError};

/// Read-only state snapshot passed to observer hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetContext {
    pub target: TargetId,
    pub active: bool,
    pub render_count: u64,
    pub printing: bool,
}

/// Signals a target emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetEvent {
    Activated,
    Deactivated,
    /// One view update (sync or async) completed successfully.
    Rendered,
    /// Rendering logic reported a failure.
    Error { message: String },
    Reflowed { size: ContainerSize, printing: bool },
    Removed,
}

impl TargetEvent {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Activated => "activated",
            Self::Deactivated => "deactivated",
            Self::Rendered => "rendered",
            Self::Error { .. } => "error",
            Self::Reflowed { .. } => "reflowed",
            Self::Removed => "removed",
        }
    }
}

/// Hook interface for code that reacts to target signals.
pub trait TargetObserver {
    fn id(&self) -> &str;
    fn on_event(&mut self, event: &TargetEvent, context: TargetContext);
}

/// Observers attached to one target, notified in registration order.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn TargetObserver>>,
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.observers.iter().map(|observer| observer.id()))
            .finish()
    }
}

impl ObserverSet {
    pub fn register(&mut self, observer: Box<dyn TargetObserver>) -> SchedResult<()> {
        if self.observers.iter().any(|existing| existing.id() == observer.id()) {
            return Err(SchedulerError::InvalidConfig(format!(
                "observer id `{}` is already registered",
                observer.id()
            )));
        }
        self.observers.push(observer);
        Ok(())
    }

    pub fn unregister(&mut self, id: &str) -> bool {
        let before = self.observers.len();
        self.observers.retain(|observer| observer.id() != id);
        before != self.observers.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn emit(&mut self, event: &TargetEvent, context: TargetContext) {
        for observer in &mut self.observers {
            observer.on_event(event, context);
        }
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }
}
