use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::core::{Pass, PassKey, Priority, TargetId};
use crate::error::{SchedResult, SchedulerError};

/// Default bound on pass executions within one flush.
pub const DEFAULT_MAX_PASSES_PER_FLUSH: usize = 10_000;

/// Capability a target exposes to the scheduler.
///
/// The scheduler never inspects concrete target types; it only asks whether
/// work may run now and hands back work that has to wait.
pub trait Schedulable: Sized {
    fn is_active(&self) -> bool;

    /// Stores a pass that could not run because the target is inactive.
    fn defer_work(&mut self, pass: Pass<Self>);

    /// `true` while an asynchronous pass on this target awaits completion.
    fn is_busy(&self) -> bool {
        false
    }
}

/// Lookup of targets by id, implemented by whatever collection owns them.
pub trait TargetStore<T> {
    fn target(&self, id: TargetId) -> Option<&T>;
    fn target_mut(&mut self, id: TargetId) -> Option<&mut T>;
}

impl<T> TargetStore<T> for IndexMap<TargetId, T> {
    fn target(&self, id: TargetId) -> Option<&T> {
        self.get(&id)
    }

    fn target_mut(&mut self, id: TargetId) -> Option<&mut T> {
        self.get_mut(&id)
    }
}

impl<T> TargetStore<T> for HashMap<TargetId, T> {
    fn target(&self, id: TargetId) -> Option<&T> {
        self.get(&id)
    }

    fn target_mut(&mut self, id: TargetId) -> Option<&mut T> {
        self.get_mut(&id)
    }
}

/// Handed to a bound method while it runs.
///
/// Invalidations recorded here are applied by the scheduler right after the
/// method returns successfully, before the next pass is selected.
pub struct PassContext<T> {
    target: TargetId,
    follow_ups: SmallVec<[(TargetId, Pass<T>); 4]>,
}

impl<T> PassContext<T> {
    #[must_use]
    pub fn new(target: TargetId) -> Self {
        Self {
            target,
            follow_ups: SmallVec::new(),
        }
    }

    #[must_use]
    pub fn target(&self) -> TargetId {
        self.target
    }

    /// Invalidates another pass on the running target.
    pub fn invalidate(&mut self, pass: Pass<T>) {
        self.follow_ups.push((self.target, pass));
    }

    /// Invalidates a pass on a different target.
    pub fn invalidate_target(&mut self, target: TargetId, pass: Pass<T>) {
        self.follow_ups.push((target, pass));
    }

    #[must_use]
    pub fn follow_up_count(&self) -> usize {
        self.follow_ups.len()
    }
}

impl<T> fmt::Debug for PassContext<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassContext")
            .field("target", &self.target)
            .field("follow_ups", &self.follow_ups.len())
            .finish()
    }
}

/// What an invalidation request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Invalidation {
    /// Entered the run queue for the current or next flush.
    Queued,
    /// The pass was already invalid for this target; nothing changed.
    AlreadyInvalid,
    /// Issued mid-flush behind the current position; runs next flush.
    NextFlush,
    /// Target inactive; recorded in its pending-work set.
    Deferred,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExecutedPass {
    pub target: TargetId,
    pub pass: &'static str,
    pub priority: Priority,
}

/// Outcome of one successful flush.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FlushReport {
    pub executed: Vec<ExecutedPass>,
    pub deferred_to_pending: usize,
    pub held_for_busy: usize,
    pub dropped_missing: usize,
}

impl FlushReport {
    #[must_use]
    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    #[must_use]
    pub fn ran(&self, target: TargetId, pass: &str) -> usize {
        self.executed
            .iter()
            .filter(|entry| entry.target == target && entry.pass == pass)
            .count()
    }
}

struct QueuedPass<T> {
    priority: Priority,
    seq: u64,
    target: TargetId,
    pass: Pass<T>,
}

impl<T> QueuedPass<T> {
    fn key(&self) -> PassKey {
        self.pass.key(self.target)
    }
}

impl<T> PartialEq for QueuedPass<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl<T> Eq for QueuedPass<T> {}

impl<T> PartialOrd for QueuedPass<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the max-heap pops the lowest priority, then the oldest entry.
impl<T> Ord for QueuedPass<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<T> fmt::Debug for QueuedPass<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedPass")
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("target", &self.target)
            .field("pass", &self.pass.name())
            .finish()
    }
}

/// Global run queue shared by every target of one dashboard.
pub struct Scheduler<T> {
    queue: BinaryHeap<QueuedPass<T>>,
    invalid: HashSet<PassKey>,
    next_flush: Vec<QueuedPass<T>>,
    held: Vec<QueuedPass<T>>,
    running: Option<(PassKey, Priority)>,
    next_seq: u64,
    max_passes_per_flush: usize,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("queued", &self.queue.len())
            .field("invalid", &self.invalid.len())
            .field("next_flush", &self.next_flush.len())
            .field("held", &self.held.len())
            .field("max_passes_per_flush", &self.max_passes_per_flush)
            .finish_non_exhaustive()
    }
}

impl<T> Scheduler<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            invalid: HashSet::new(),
            next_flush: Vec::new(),
            held: Vec::new(),
            running: None,
            next_seq: 0,
            max_passes_per_flush: DEFAULT_MAX_PASSES_PER_FLUSH,
        }
    }

    #[must_use]
    pub fn with_max_passes_per_flush(mut self, limit: usize) -> Self {
        self.max_passes_per_flush = limit.max(1);
        self
    }

    #[must_use]
    pub fn max_passes_per_flush(&self) -> usize {
        self.max_passes_per_flush
    }

    #[must_use]
    pub fn is_valid(&self, target: TargetId, pass: &'static str) -> bool {
        !self.invalid.contains(&PassKey { target, pass })
    }

    /// Names of the passes currently invalid for `target`, in run order.
    #[must_use]
    pub fn invalid_passes(&self, target: TargetId) -> Vec<&'static str> {
        let mut entries: Vec<&QueuedPass<T>> = self
            .queue
            .iter()
            .chain(self.next_flush.iter())
            .chain(self.held.iter())
            .filter(|queued| queued.target == target)
            .collect();
        entries.sort_by(|a, b| b.cmp(a));
        entries.into_iter().map(|queued| queued.pass.name()).collect()
    }

    /// `true` when the next flush has something to run.
    #[must_use]
    pub fn has_queued_work(&self) -> bool {
        !self.queue.is_empty()
    }

    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn held_len(&self) -> usize {
        self.held.len()
    }

    /// Drops a pass without running it.
    pub fn mark_valid(&mut self, target: TargetId, pass: &'static str) {
        let key = PassKey { target, pass };
        if !self.invalid.remove(&key) {
            return;
        }
        self.queue.retain(|queued| queued.key() != key);
        self.next_flush.retain(|queued| queued.key() != key);
        self.held.retain(|queued| queued.key() != key);
        trace!(%target, pass, "pass marked valid without running");
    }

    /// Drops every outstanding pass of `target` without running it.
    pub fn forget(&mut self, target: TargetId) {
        self.invalid.retain(|key| key.target != target);
        self.queue.retain(|queued| queued.target != target);
        self.next_flush.retain(|queued| queued.target != target);
        self.held.retain(|queued| queued.target != target);
        debug!(%target, "scheduler dropped outstanding work for target");
    }

    /// Re-queues passes that were held back while `target` was busy.
    pub fn release(&mut self, target: TargetId) -> usize {
        let mut released = 0;
        let mut index = 0;
        while index < self.held.len() {
            if self.held[index].target == target {
                let queued = self.held.swap_remove(index);
                self.queue.push(queued);
                released += 1;
            } else {
                index += 1;
            }
        }
        if released > 0 {
            trace!(%target, released, "released passes held for busy target");
        }
        released
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn enqueue(&mut self, target: TargetId, pass: Pass<T>) -> Invalidation {
        let key = pass.key(target);
        if !self.invalid.insert(key) {
            return Invalidation::AlreadyInvalid;
        }

        let queued = QueuedPass {
            priority: pass.priority(),
            seq: self.next_seq(),
            target,
            pass,
        };

        if let Some((running_key, running_priority)) = self.running
            && (pass.priority() < running_priority || key == running_key)
        {
            trace!(%target, pass = pass.name(), "pass invalidated behind flush position");
            self.next_flush.push(queued);
            return Invalidation::NextFlush;
        }

        trace!(%target, pass = pass.name(), priority = %pass.priority(), "pass queued");
        self.queue.push(queued);
        Invalidation::Queued
    }
}

impl<T: Schedulable> Scheduler<T> {
    /// Marks `pass` invalid for `target` and requests scheduling.
    ///
    /// Deactivation-aware passes on an inactive target are recorded in the
    /// target's pending-work set instead of the run queue.
    pub fn invalidate<S: TargetStore<T>>(
        &mut self,
        targets: &mut S,
        target: TargetId,
        pass: Pass<T>,
    ) -> SchedResult<Invalidation> {
        let entry = targets
            .target_mut(target)
            .ok_or(SchedulerError::UnknownTarget(target))?;

        if pass.is_deactivation_aware() && !entry.is_active() {
            entry.defer_work(pass);
            trace!(%target, pass = pass.name(), "pass deferred on inactive target");
            return Ok(Invalidation::Deferred);
        }

        Ok(self.enqueue(target, pass))
    }

    /// Re-invalidates `passes` against `target`, typically after activation.
    pub fn replay<S: TargetStore<T>>(
        &mut self,
        targets: &mut S,
        target: TargetId,
        passes: Vec<Pass<T>>,
    ) -> SchedResult<usize> {
        let mut queued = 0;
        for pass in passes {
            if matches!(
                self.invalidate(targets, target, pass)?,
                Invalidation::Queued | Invalidation::NextFlush
            ) {
                queued += 1;
            }
        }
        Ok(queued)
    }

    /// Runs every queued pass in ascending priority order.
    ///
    /// A bound method error aborts the flush: the failing pass stays invalid
    /// and queued, so the next flush retries it.
    pub fn flush<S: TargetStore<T>>(&mut self, targets: &mut S) -> SchedResult<FlushReport> {
        let mut report = FlushReport::default();
        let result = self.drain(targets, &mut report);
        self.running = None;
        let carried = self.next_flush.len();
        self.queue.extend(self.next_flush.drain(..));

        match result {
            Ok(()) => {
                debug!(
                    executed = report.executed.len(),
                    deferred = report.deferred_to_pending,
                    held = report.held_for_busy,
                    carried,
                    "flush complete"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, executed = report.executed.len(), "flush aborted");
                Err(err)
            }
        }
    }

    fn drain<S: TargetStore<T>>(
        &mut self,
        targets: &mut S,
        report: &mut FlushReport,
    ) -> SchedResult<()> {
        while let Some(queued) = self.queue.pop() {
            let key = queued.key();
            let Some(target) = targets.target_mut(queued.target) else {
                self.invalid.remove(&key);
                report.dropped_missing += 1;
                continue;
            };

            if target.is_busy() {
                report.held_for_busy += 1;
                self.held.push(queued);
                continue;
            }

            if queued.pass.is_deactivation_aware() && !target.is_active() {
                self.invalid.remove(&key);
                target.defer_work(queued.pass);
                report.deferred_to_pending += 1;
                trace!(target = %queued.target, pass = key.pass, "skipped pass on inactive target");
                continue;
            }

            if report.executed.len() >= self.max_passes_per_flush {
                self.queue.push(queued);
                return Err(SchedulerError::FlushLimitExceeded {
                    limit: self.max_passes_per_flush,
                });
            }

            self.running = Some((key, queued.priority));
            let mut cx = PassContext::new(queued.target);
            trace!(target = %queued.target, pass = key.pass, "running pass");
            if let Err(err) = queued.pass.run(target, &mut cx) {
                self.queue.push(queued);
                return Err(match err {
                    SchedulerError::PassFailed { .. } => err,
                    other => SchedulerError::PassFailed {
                        target: key.target,
                        pass: key.pass,
                        message: other.to_string(),
                    },
                });
            }

            self.invalid.remove(&key);
            report.executed.push(ExecutedPass {
                target: queued.target,
                pass: key.pass,
                priority: queued.priority,
            });

            for (follow_target, follow_pass) in cx.follow_ups {
                match self.invalidate(targets, follow_target, follow_pass) {
                    Ok(_) => {}
                    Err(SchedulerError::UnknownTarget(missing)) => {
                        warn!(target = %missing, pass = follow_pass.name(), "follow-up invalidation for unknown target ignored");
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(())
    }
}
