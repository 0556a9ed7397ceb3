//! Signal surface exposed to hosting code.
//!
//! Observers are notified synchronously; they never mutate target internals.

pub mod observers;

pub use observers::{ObserverSet, TargetContext, TargetEvent, TargetObserver};
