use std::fmt;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::core::{PassContext, TargetId};
use crate::error::SchedResult;

/// Method a pass is bound to. Runs against the owning target.
pub type PassMethod<T> = fn(&mut T, &mut PassContext<T>) -> SchedResult<()>;

/// Ordering key of a pass. Lower values run first within a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(OrderedFloat<f64>);

impl Priority {
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(OrderedFloat(value))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0.into_inner()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a pass reacts to an inactive target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassMode {
    /// Always enters the run queue and always executes.
    Always,
    /// Recorded into the target's pending-work set while the target is
    /// inactive and replayed when it activates.
    DeactivationAware,
}

/// A named, priority-ordered unit of recomputation bound to one method.
///
/// The definition is shared by every target of the same type; validity is
/// tracked per target by the [`Scheduler`](crate::core::Scheduler).
pub struct Pass<T> {
    name: &'static str,
    priority: Priority,
    mode: PassMode,
    method: PassMethod<T>,
}

impl<T> Pass<T> {
    #[must_use]
    pub const fn new(name: &'static str, priority: f64, method: PassMethod<T>) -> Self {
        Self {
            name,
            priority: Priority::new(priority),
            mode: PassMode::Always,
            method,
        }
    }

    #[must_use]
    pub const fn deactivation_aware(
        name: &'static str,
        priority: f64,
        method: PassMethod<T>,
    ) -> Self {
        Self {
            name,
            priority: Priority::new(priority),
            mode: PassMode::DeactivationAware,
            method,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub const fn mode(&self) -> PassMode {
        self.mode
    }

    #[must_use]
    pub const fn is_deactivation_aware(&self) -> bool {
        matches!(self.mode, PassMode::DeactivationAware)
    }

    #[must_use]
    pub const fn key(&self, target: TargetId) -> PassKey {
        PassKey {
            target,
            pass: self.name,
        }
    }

    pub(crate) fn run(&self, target: &mut T, cx: &mut PassContext<T>) -> SchedResult<()> {
        (self.method)(target, cx)
    }
}

impl<T> Clone for Pass<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Pass<T> {}

impl<T> PartialEq for Pass<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl<T> Eq for Pass<T> {}

impl<T> fmt::Debug for Pass<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

/// Per-target identity of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PassKey {
    pub target: TargetId,
    pub pass: &'static str,
}
