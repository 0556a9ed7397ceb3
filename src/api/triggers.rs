use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::core::{
    ContainerSize, Invalidation, ScaleDictionary, ScaleValues, SourceId, TargetId,
};
use crate::error::{SchedResult, SchedulerError};
use crate::extensions::TargetEvent;

use super::{ConfigAttributes, ConfigChange, ConfigReaction, Dashboard, VisualizationTarget};

impl Dashboard {
    /// Full refresh: invalidates both data-format and view-update.
    pub fn render(&mut self, id: TargetId) -> SchedResult<()> {
        self.invalidate(id, VisualizationTarget::DATA_FORMAT)?;
        self.invalidate(id, VisualizationTarget::VIEW_UPDATE)?;
        Ok(())
    }

    pub fn invalidate_reflow(&mut self, id: TargetId) -> SchedResult<Invalidation> {
        self.invalidate(id, VisualizationTarget::REFLOW)
    }

    /// Delivers a "results changed" notification from `source`.
    ///
    /// Returns the number of subscribed targets.
    pub fn notify_results_changed(&mut self, source: SourceId) -> SchedResult<usize> {
        let subscribers: Vec<TargetId> = self
            .targets
            .values()
            .filter(|target| target.consumes(source))
            .map(VisualizationTarget::id)
            .collect();
        for id in &subscribers {
            self.invalidate(*id, VisualizationTarget::DATA_FORMAT)?;
        }
        trace!(%source, subscribers = subscribers.len(), "results changed");
        Ok(subscribers.len())
    }

    /// Sets one config attribute on a target.
    pub fn set_config(
        &mut self,
        id: TargetId,
        key: impl Into<String>,
        value: Value,
    ) -> SchedResult<Option<ConfigReaction>> {
        let change = self.target_mut(id)?.config_mut().set(key, value);
        self.apply_config_change(id, change)
    }

    pub fn set_config_many(
        &mut self,
        id: TargetId,
        attributes: ConfigAttributes,
    ) -> SchedResult<Option<ConfigReaction>> {
        let change = self.target_mut(id)?.config_mut().set_many(attributes);
        self.apply_config_change(id, change)
    }

    pub fn unset_config(&mut self, id: TargetId, key: &str) -> SchedResult<Option<ConfigReaction>> {
        let change = self.target_mut(id)?.config_mut().unset(key);
        self.apply_config_change(id, change)
    }

    fn apply_config_change(
        &mut self,
        id: TargetId,
        change: Option<ConfigChange>,
    ) -> SchedResult<Option<ConfigReaction>> {
        let Some(change) = change else {
            return Ok(None);
        };
        let reaction = self.target_mut(id)?.visualization().on_config_change(&change);
        trace!(target = %id, ?reaction, keys = change.changed.len(), "config changed");
        match reaction {
            ConfigReaction::Reformat => {
                self.invalidate(id, VisualizationTarget::DATA_FORMAT)?;
            }
            ConfigReaction::Rerender => {
                self.invalidate(id, VisualizationTarget::VIEW_UPDATE)?;
            }
            ConfigReaction::Reflow => {
                self.invalidate(id, VisualizationTarget::REFLOW)?;
            }
            ConfigReaction::Ignore => {}
        }
        Ok(Some(reaction))
    }

    /// Container resize notification. Unchanged sizes are ignored.
    pub fn resize(&mut self, id: TargetId, size: ContainerSize) -> SchedResult<bool> {
        if !self.target_mut(id)?.set_size(size) {
            return Ok(false);
        }
        self.invalidate(id, VisualizationTarget::REFLOW)?;
        Ok(true)
    }

    pub fn print_start(&mut self) -> SchedResult<usize> {
        self.set_printing(true)
    }

    pub fn print_end(&mut self) -> SchedResult<usize> {
        self.set_printing(false)
    }

    fn set_printing(&mut self, printing: bool) -> SchedResult<usize> {
        if self.printing == printing {
            return Ok(0);
        }
        self.printing = printing;
        let ids: Vec<TargetId> = self.targets.keys().copied().collect();
        let mut reflowed = 0;
        for id in ids {
            if self.target_mut(id)?.set_printing(printing) {
                self.invalidate(id, VisualizationTarget::REFLOW)?;
                reflowed += 1;
            }
        }
        debug!(printing, reflowed, "print context changed");
        Ok(reflowed)
    }

    /// Raises the "error" signal on a target.
    ///
    /// An in-flight asynchronous view update will not emit "rendered".
    pub fn raise_error(&mut self, id: TargetId, message: impl Into<String>) -> SchedResult<()> {
        let target = self.target_mut(id)?;
        target.mark_in_flight_errored();
        target.emit(TargetEvent::Error {
            message: message.into(),
        });
        Ok(())
    }

    /// Replaces the scales a target participates in.
    ///
    /// The target leaves scales missing from `dictionary`, joins the new ones
    /// and reformats so it contributes values to them.
    pub fn set_scale_dictionary(
        &mut self,
        id: TargetId,
        dictionary: ScaleDictionary,
    ) -> SchedResult<()> {
        let previous = self.target_mut(id)?.replace_scales(dictionary);
        let mut recipients = Vec::new();
        {
            let current = self.target_mut(id)?.scales();
            for (name, scale) in &previous {
                let kept = current
                    .values()
                    .any(|handle| Rc::ptr_eq(handle, scale));
                if !kept {
                    trace!(target = %id, scale = %name, "leaving scale");
                    recipients.extend(scale.borrow_mut().unregister(id).recipients);
                }
            }
        }
        drop(previous);
        self.scales.prune();

        for recipient in recipients {
            if recipient != id && self.targets.contains_key(&recipient) {
                self.invalidate(recipient, VisualizationTarget::VIEW_UPDATE)?;
            }
        }
        self.invalidate(id, VisualizationTarget::DATA_FORMAT)?;
        Ok(())
    }

    /// Stores `values` as the contribution of `id` to the scale it binds
    /// under `name` and invalidates the view-update stage of every other
    /// registrant before returning.
    ///
    /// Returns the number of targets notified. A name the target does not
    /// bind contributes nothing.
    pub fn set_scale_values(
        &mut self,
        id: TargetId,
        name: &str,
        values: ScaleValues,
    ) -> SchedResult<usize> {
        let Some(scale) = self
            .targets
            .get(&id)
            .ok_or(SchedulerError::UnknownTarget(id))?
            .scales()
            .get(name)
            .cloned()
        else {
            trace!(target = %id, scale = name, "scale not bound, values ignored");
            return Ok(0);
        };

        let broadcast = scale.borrow_mut().set_values(id, values);
        let mut notified = 0;
        for recipient in broadcast.recipients {
            if self.targets.contains_key(&recipient) {
                self.invalidate(recipient, VisualizationTarget::VIEW_UPDATE)?;
                notified += 1;
            }
        }
        Ok(notified)
    }

    /// Convenience over [`set_scale_dictionary`](Self::set_scale_dictionary)
    /// resolving names through the dashboard's registry.
    pub fn set_scale_names<'a>(
        &mut self,
        id: TargetId,
        names: impl IntoIterator<Item = &'a str>,
    ) -> SchedResult<()> {
        let dictionary = self.scales.dictionary(names);
        self.set_scale_dictionary(id, dictionary)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use crate::api::{
        ConfigChange, ConfigReaction, Dashboard, DashboardConfig, SharedDataSource,
        TargetOptions, ViewContext, Visualization, VisualizationTarget,
    };
    use crate::core::{ContainerSize, ScaleValues, SourceId};
    use crate::error::{SchedResult, SchedulerError};

    struct Styled;

    impl Visualization for Styled {
        fn type_name(&self) -> &'static str {
            "styled"
        }

        fn update_view(&mut self, _cx: &mut ViewContext<'_>) -> SchedResult<()> {
            Ok(())
        }

        fn on_config_change(&self, change: &ConfigChange) -> ConfigReaction {
            if change.touches("color") {
                ConfigReaction::Rerender
            } else if change.touches("title") {
                ConfigReaction::Ignore
            } else {
                ConfigReaction::Reformat
            }
        }
    }

    fn active_dashboard() -> Dashboard {
        let config = DashboardConfig::new()
            .with_activate_on_create(true)
            .with_render_on_create(false);
        Dashboard::new(config).expect("dashboard")
    }

    #[test]
    fn config_reaction_selects_invalidated_stage() {
        let mut dashboard = active_dashboard();
        let id = dashboard.add_target(TargetOptions::new(Styled)).expect("add");

        let reaction = dashboard
            .set_config(id, "color", json!("red"))
            .expect("set color");
        assert_eq!(reaction, Some(ConfigReaction::Rerender));
        assert!(!dashboard.is_valid(id, VisualizationTarget::VIEW_UPDATE));
        assert!(dashboard.is_valid(id, VisualizationTarget::DATA_FORMAT));

        let reaction = dashboard
            .set_config(id, "title", json!("Sales"))
            .expect("set title");
        assert_eq!(reaction, Some(ConfigReaction::Ignore));

        let reaction = dashboard
            .set_config(id, "bins", json!(12))
            .expect("set bins");
        assert_eq!(reaction, Some(ConfigReaction::Reformat));
        assert!(!dashboard.is_valid(id, VisualizationTarget::DATA_FORMAT));
    }

    #[test]
    fn unchanged_config_value_is_not_a_change() {
        let mut dashboard = active_dashboard();
        let id = dashboard.add_target(TargetOptions::new(Styled)).expect("add");
        dashboard.set_config(id, "bins", json!(4)).expect("set");
        dashboard.flush().expect("flush");

        let reaction = dashboard.set_config(id, "bins", json!(4)).expect("set again");
        assert!(reaction.is_none());
        assert!(!dashboard.scheduler().has_queued_work());
    }

    #[test]
    fn results_changed_reaches_only_subscribers() {
        let mut dashboard = active_dashboard();
        let source = SharedDataSource::new(SourceId::new(7), Value::Null);
        let subscribed = dashboard
            .add_target(TargetOptions::new(Styled).with_source(source.into_source()))
            .expect("subscribed");
        let other = dashboard.add_target(TargetOptions::new(Styled)).expect("other");

        let notified = dashboard
            .notify_results_changed(SourceId::new(7))
            .expect("notify");
        assert_eq!(notified, 1);
        assert!(!dashboard.is_valid(subscribed, VisualizationTarget::DATA_FORMAT));
        assert!(dashboard.is_valid(other, VisualizationTarget::DATA_FORMAT));
    }

    #[test]
    fn resize_ignores_unchanged_size() {
        let mut dashboard = active_dashboard();
        let id = dashboard
            .add_target(TargetOptions::new(Styled).with_size(ContainerSize::new(300, 200)))
            .expect("add");

        assert!(!dashboard.resize(id, ContainerSize::new(300, 200)).expect("same"));
        assert!(dashboard.is_valid(id, VisualizationTarget::REFLOW));
        assert!(dashboard.resize(id, ContainerSize::new(640, 480)).expect("grow"));
        assert!(!dashboard.is_valid(id, VisualizationTarget::REFLOW));
    }

    #[test]
    fn print_mode_reflows_every_target_once() {
        let mut dashboard = active_dashboard();
        let first = dashboard.add_target(TargetOptions::new(Styled)).expect("first");
        let second = dashboard.add_target(TargetOptions::new(Styled)).expect("second");

        assert_eq!(dashboard.print_start().expect("start"), 2);
        assert_eq!(dashboard.print_start().expect("start again"), 0);
        assert!(dashboard.is_printing());
        let report = dashboard.flush().expect("flush");
        assert_eq!(report.ran(first, "reflow"), 1);
        assert_eq!(report.ran(second, "reflow"), 1);

        assert_eq!(dashboard.print_end().expect("end"), 2);
        assert!(!dashboard.target(first).expect("first").is_printing());
    }

    #[test]
    fn scale_dictionary_swap_rebinds_scales() {
        let mut dashboard = active_dashboard();
        let id = dashboard
            .add_target(TargetOptions::new(Styled).with_scales(["color"]))
            .expect("add");

        dashboard.set_scale_names(id, ["size"]).expect("swap");
        let target = dashboard.target(id).expect("target");
        assert!(target.scales().contains_key("size"));
        assert!(!target.scales().contains_key("color"));
        assert_eq!(dashboard.scale_registry().live_scale_names(), vec!["size".to_owned()]);
        assert!(!dashboard.is_valid(id, VisualizationTarget::DATA_FORMAT));
    }

    #[test]
    fn host_scale_write_notifies_other_registrants_only() {
        let mut dashboard = active_dashboard();
        let writer = dashboard
            .add_target(TargetOptions::new(Styled).with_scales(["color"]))
            .expect("writer");
        let reader = dashboard
            .add_target(TargetOptions::new(Styled).with_scales(["color"]))
            .expect("reader");

        let notified = dashboard
            .set_scale_values(writer, "color", ScaleValues::new().with("max", 100.0))
            .expect("write");
        assert_eq!(notified, 1);
        assert!(!dashboard.is_valid(reader, VisualizationTarget::VIEW_UPDATE));
        assert!(dashboard.is_valid(writer, VisualizationTarget::VIEW_UPDATE));
        assert!(dashboard.is_valid(writer, VisualizationTarget::DATA_FORMAT));
    }

    #[test]
    fn scale_write_for_unbound_name_contributes_nothing() {
        let mut dashboard = active_dashboard();
        let id = dashboard
            .add_target(TargetOptions::new(Styled).with_scales(["color"]))
            .expect("add");

        let notified = dashboard
            .set_scale_values(id, "size", ScaleValues::new().with("max", 1.0))
            .expect("write");
        assert_eq!(notified, 0);
        assert!(dashboard.scale_registry().get("size").is_none());
        assert!(matches!(
            dashboard.set_scale_values(
                crate::core::TargetId::new(99),
                "color",
                ScaleValues::new()
            ),
            Err(SchedulerError::UnknownTarget(_))
        ));
    }
}
