use tracing::debug;

use crate::core::TargetId;
use crate::error::{SchedResult, SchedulerError};
use crate::extensions::TargetEvent;

use super::{Dashboard, TargetOptions, TargetState, VisualizationTarget};

impl Dashboard {
    /// Builds a target, binds its scales and returns its id.
    ///
    /// The target starts `Inactive` unless `activate_on_create` is set.
    pub fn add_target(&mut self, options: TargetOptions) -> SchedResult<TargetId> {
        let id = self.allocate_target_id();
        let scales = self
            .scales
            .dictionary(options.scale_names.iter().map(String::as_str));
        let mut target =
            VisualizationTarget::new(id, options, scales, self.completion_tx.clone());
        target.set_printing(self.printing);
        debug!(target = %id, kind = target.type_name(), "target added");
        self.targets.insert(id, target);

        if self.config.activate_on_create {
            self.activate(id)?;
        }
        if self.config.render_on_create {
            self.invalidate(id, VisualizationTarget::DATA_FORMAT)?;
        }
        Ok(id)
    }

    /// Inactive → Active; replays every pass recorded while inactive.
    ///
    /// Returns `false` if the target was already active.
    pub fn activate(&mut self, id: TargetId) -> SchedResult<bool> {
        let target = self.target_mut(id)?;
        if target.state() == TargetState::Active {
            return Ok(false);
        }
        target.set_state(TargetState::Active);
        target.emit(TargetEvent::Activated);
        let pending = target.take_pending();
        let replayed = pending.len();
        self.scheduler.replay(&mut self.targets, id, pending)?;
        debug!(target = %id, replayed, "target activated");
        Ok(true)
    }

    /// Active → Inactive. Subscriptions stay live; only execution stops.
    ///
    /// Returns `false` if the target was already inactive.
    pub fn deactivate(&mut self, id: TargetId) -> SchedResult<bool> {
        let target = self.target_mut(id)?;
        if target.state() == TargetState::Inactive {
            return Ok(false);
        }
        target.set_state(TargetState::Inactive);
        target.emit(TargetEvent::Deactivated);
        debug!(target = %id, "target deactivated");
        Ok(true)
    }

    /// Tears a target down from either state.
    ///
    /// Unregisters it from every scale, drops all outstanding work without
    /// running it and detaches it from data, resize and print notifications.
    pub fn remove(&mut self, id: TargetId) -> SchedResult<()> {
        let mut target = self
            .targets
            .shift_remove(&id)
            .ok_or(SchedulerError::UnknownTarget(id))?;
        self.scheduler.forget(id);

        let mut recipients = Vec::new();
        for scale in target.take_scales().values() {
            recipients.extend(scale.borrow_mut().unregister(id).recipients);
        }
        target.teardown();
        self.scales.prune();

        for recipient in recipients {
            if self.targets.contains_key(&recipient) {
                self.invalidate(recipient, VisualizationTarget::VIEW_UPDATE)?;
            }
        }
        debug!(target = %id, "target removed");
        Ok(())
    }
}
