use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use serde_json::{Value, json};
use viz_scheduler::api::{
    Dashboard, DashboardConfig, DomainData, TargetOptions, ViewContext, Visualization,
    VisualizationTarget,
};
use viz_scheduler::core::{ScaleValues, TargetId};
use viz_scheduler::SchedResult;

/// Contributes `config.max` to the "color" scale and records the shared
/// extent it sees on every view update.
struct Heatmap {
    seen: Rc<RefCell<Vec<Option<(f64, f64)>>>>,
}

impl Visualization for Heatmap {
    fn type_name(&self) -> &'static str {
        "heatmap"
    }

    fn format_data(&mut self, domain: &DomainData) -> SchedResult<Value> {
        Ok(json!({ "max": domain.config.get("max").cloned().unwrap_or(Value::Null) }))
    }

    fn scale_values(&self, _scale: &str, formatted: &Value) -> Option<ScaleValues> {
        formatted["max"]
            .as_f64()
            .map(|max| ScaleValues::new().with("max", max))
    }

    fn update_view(&mut self, cx: &mut ViewContext<'_>) -> SchedResult<()> {
        self.seen.borrow_mut().push(cx.scale_extent("color", "max"));
        Ok(())
    }
}

type Seen = Rc<RefCell<Vec<Option<(f64, f64)>>>>;

fn dashboard() -> Dashboard {
    let config = DashboardConfig::new()
        .with_activate_on_create(true)
        .with_render_on_create(false);
    Dashboard::new(config).expect("dashboard")
}

fn add_heatmap(dashboard: &mut Dashboard) -> (TargetId, Seen) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let id = dashboard
        .add_target(TargetOptions::new(Heatmap { seen: seen.clone() }).with_scales(["color"]))
        .expect("add heatmap");
    (id, seen)
}

#[test]
fn scale_write_invalidates_only_other_registrants() {
    let mut dashboard = dashboard();
    let (writer, _) = add_heatmap(&mut dashboard);
    let (reader, reader_seen) = add_heatmap(&mut dashboard);

    dashboard
        .set_config(writer, "max", json!(100.0))
        .expect("set max");
    let report = dashboard.flush().expect("flush");

    assert_eq!(report.ran(writer, "data_format"), 1);
    assert_eq!(report.ran(writer, "view_update"), 1);
    assert_eq!(report.ran(reader, "view_update"), 1);
    assert_eq!(report.ran(reader, "data_format"), 0);

    let seen = reader_seen.borrow();
    let (min, max) = seen[0].expect("reader sees writer's contribution");
    assert_relative_eq!(min, 100.0);
    assert_relative_eq!(max, 100.0);
}

#[test]
fn host_scale_write_invalidates_other_registrant_not_setter() {
    let mut dashboard = dashboard();
    let (writer, _) = add_heatmap(&mut dashboard);
    let (reader, reader_seen) = add_heatmap(&mut dashboard);

    let notified = dashboard
        .set_scale_values(writer, "color", ScaleValues::new().with("max", 100.0))
        .expect("write");
    assert_eq!(notified, 1);
    assert!(!dashboard.is_valid(reader, VisualizationTarget::VIEW_UPDATE));
    assert!(dashboard.is_valid(writer, VisualizationTarget::VIEW_UPDATE));

    let report = dashboard.flush().expect("flush");
    assert_eq!(report.ran(writer, "view_update"), 0);
    assert_eq!(*reader_seen.borrow(), vec![Some((100.0, 100.0))]);
}

/// Contributes nothing; records the merged values other targets broadcast.
struct Legend {
    seen: Rc<RefCell<Vec<Option<f64>>>>,
}

impl Visualization for Legend {
    fn type_name(&self) -> &'static str {
        "legend"
    }

    fn update_view(&mut self, cx: &mut ViewContext<'_>) -> SchedResult<()> {
        self.seen
            .borrow_mut()
            .push(cx.scale_values("color").get("max"));
        Ok(())
    }
}

#[test]
fn silent_reader_sees_values_broadcast_by_writer() {
    let mut dashboard = dashboard();
    let (writer, _) = add_heatmap(&mut dashboard);
    let legend_seen = Rc::new(RefCell::new(Vec::new()));
    let legend = dashboard
        .add_target(
            TargetOptions::new(Legend {
                seen: legend_seen.clone(),
            })
            .with_scales(["color"]),
        )
        .expect("add legend");

    dashboard
        .set_config(writer, "max", json!(100.0))
        .expect("set max");
    let report = dashboard.flush().expect("flush");

    assert_eq!(report.ran(legend, "view_update"), 1);
    assert_eq!(*legend_seen.borrow(), vec![Some(100.0)]);
}

#[test]
fn shared_extent_covers_every_contribution() {
    let mut dashboard = dashboard();
    let (low, _) = add_heatmap(&mut dashboard);
    let (high, high_seen) = add_heatmap(&mut dashboard);

    dashboard.set_config(low, "max", json!(10.0)).expect("low");
    dashboard.set_config(high, "max", json!(250.0)).expect("high");
    dashboard.flush_until_idle(4).expect("settle");

    let extent = high_seen
        .borrow()
        .last()
        .copied()
        .flatten()
        .expect("extent");
    assert_relative_eq!(extent.0, 10.0);
    assert_relative_eq!(extent.1, 250.0);
}

#[test]
fn removing_a_contributor_rerenders_remaining_registrants() {
    let mut dashboard = dashboard();
    let (leaving, _) = add_heatmap(&mut dashboard);
    let (staying, staying_seen) = add_heatmap(&mut dashboard);
    dashboard.set_config(leaving, "max", json!(42.0)).expect("max");
    dashboard.flush_until_idle(4).expect("settle");
    staying_seen.borrow_mut().clear();

    dashboard.remove(leaving).expect("remove");
    assert!(!dashboard.is_valid(staying, VisualizationTarget::VIEW_UPDATE));
    dashboard.flush().expect("flush");

    assert_eq!(*staying_seen.borrow(), vec![None]);
    assert_eq!(
        dashboard.scale_registry().live_scale_names(),
        vec!["color".to_owned()]
    );
}

#[test]
fn removing_a_silent_registrant_notifies_nobody() {
    let mut dashboard = dashboard();
    let (silent, _) = add_heatmap(&mut dashboard);
    let (other, _) = add_heatmap(&mut dashboard);

    dashboard.remove(silent).expect("remove");
    assert!(dashboard.is_valid(other, VisualizationTarget::VIEW_UPDATE));
}

#[test]
fn scale_is_dropped_with_its_last_holder() {
    let mut dashboard = dashboard();
    let (only, _) = add_heatmap(&mut dashboard);
    assert_eq!(
        dashboard.scale_registry().live_scale_names(),
        vec!["color".to_owned()]
    );

    dashboard.remove(only).expect("remove");
    assert!(dashboard.scale_registry().live_scale_names().is_empty());
    assert!(dashboard.scale_registry().get("color").is_none());
}

#[test]
fn withdrawing_values_notifies_other_registrants() {
    let mut dashboard = dashboard();
    let (writer, _) = add_heatmap(&mut dashboard);
    let (reader, reader_seen) = add_heatmap(&mut dashboard);
    dashboard.set_config(writer, "max", json!(7.0)).expect("max");
    dashboard.flush_until_idle(4).expect("settle");
    reader_seen.borrow_mut().clear();

    dashboard.unset_config(writer, "max").expect("unset");
    let report = dashboard.flush().expect("flush");

    assert_eq!(report.ran(reader, "view_update"), 1);
    assert_eq!(*reader_seen.borrow(), vec![None]);
    let scale = dashboard.scale("color");
    assert!(scale.borrow().values_for(writer).is_none());
    assert!(!scale.borrow().is_registered(writer));
}

#[test]
fn scale_stops_being_live_once_every_target_withdraws() {
    let mut dashboard = dashboard();
    let (only, _) = add_heatmap(&mut dashboard);
    dashboard.set_config(only, "max", json!(5.0)).expect("max");
    dashboard.flush_until_idle(4).expect("settle");
    assert_eq!(
        dashboard.scale_registry().live_scale_names(),
        vec!["color".to_owned()]
    );

    dashboard.unset_config(only, "max").expect("unset");
    dashboard.flush().expect("flush");

    assert!(dashboard.target(only).expect("target").scales().contains_key("color"));
    assert!(dashboard.scale_registry().live_scale_names().is_empty());
}
