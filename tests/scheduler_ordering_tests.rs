use viz_scheduler::api::{
    Dashboard, DashboardConfig, TargetOptions, ViewContext, Visualization, VisualizationTarget,
};
use viz_scheduler::core::{ContainerSize, Invalidation};
use viz_scheduler::{SchedResult, SchedulerError};

struct Plain;

impl Visualization for Plain {
    fn type_name(&self) -> &'static str {
        "plain"
    }

    fn update_view(&mut self, _cx: &mut ViewContext<'_>) -> SchedResult<()> {
        Ok(())
    }
}

fn idle_dashboard() -> Dashboard {
    let config = DashboardConfig::new()
        .with_activate_on_create(true)
        .with_render_on_create(false);
    Dashboard::new(config).expect("dashboard")
}

#[test]
fn lower_priority_passes_run_first_across_targets() {
    let mut dashboard = idle_dashboard();
    let first = dashboard.add_target(TargetOptions::new(Plain)).expect("first");
    let second = dashboard.add_target(TargetOptions::new(Plain)).expect("second");
    let third = dashboard.add_target(TargetOptions::new(Plain)).expect("third");

    dashboard.invalidate_reflow(first).expect("reflow");
    dashboard
        .invalidate(second, VisualizationTarget::VIEW_UPDATE)
        .expect("view");
    dashboard
        .invalidate(third, VisualizationTarget::DATA_FORMAT)
        .expect("format");
    let report = dashboard.flush().expect("flush");

    let order: Vec<(u32, &str)> = report
        .executed
        .iter()
        .map(|entry| (entry.target.raw(), entry.pass))
        .collect();
    assert_eq!(
        order,
        vec![
            (third.raw(), "data_format"),
            (second.raw(), "view_update"),
            (third.raw(), "view_update"),
            (first.raw(), "reflow"),
        ]
    );
    let priorities: Vec<f64> = report
        .executed
        .iter()
        .map(|entry| entry.priority.value())
        .collect();
    assert!(priorities.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn repeated_invalidation_collapses_to_one_execution() {
    let mut dashboard = idle_dashboard();
    let id = dashboard.add_target(TargetOptions::new(Plain)).expect("add");

    assert_eq!(
        dashboard
            .invalidate(id, VisualizationTarget::VIEW_UPDATE)
            .expect("first"),
        Invalidation::Queued
    );
    for _ in 0..5 {
        assert_eq!(
            dashboard
                .invalidate(id, VisualizationTarget::VIEW_UPDATE)
                .expect("repeat"),
            Invalidation::AlreadyInvalid
        );
    }
    let report = dashboard.flush().expect("flush");
    assert_eq!(report.ran(id, "view_update"), 1);
    assert_eq!(report.executed_count(), 1);
}

#[test]
fn mark_valid_drops_queued_pass() {
    let mut dashboard = idle_dashboard();
    let id = dashboard.add_target(TargetOptions::new(Plain)).expect("add");

    dashboard
        .resize(id, ContainerSize::new(200, 100))
        .expect("resize");
    dashboard.mark_valid(id, VisualizationTarget::REFLOW);
    let report = dashboard.flush().expect("flush");

    assert_eq!(report.executed_count(), 0);
    assert!(!dashboard.scheduler().has_queued_work());
}

#[test]
fn unknown_target_invalidation_is_rejected() {
    let mut dashboard = idle_dashboard();
    let id = dashboard.add_target(TargetOptions::new(Plain)).expect("add");
    dashboard.remove(id).expect("remove");

    let err = dashboard
        .invalidate(id, VisualizationTarget::DATA_FORMAT)
        .expect_err("removed target");
    assert!(matches!(err, SchedulerError::UnknownTarget(missing) if missing == id));
}

#[test]
fn flush_limit_from_config_caps_executions() {
    let config = DashboardConfig::new()
        .with_activate_on_create(true)
        .with_render_on_create(false)
        .with_max_passes_per_flush(2);
    let mut dashboard = Dashboard::new(config).expect("dashboard");
    let id = dashboard.add_target(TargetOptions::new(Plain)).expect("add");

    dashboard.render(id).expect("render");
    dashboard.invalidate_reflow(id).expect("reflow");
    let err = dashboard.flush().expect_err("limit");
    assert!(matches!(err, SchedulerError::FlushLimitExceeded { limit: 2 }));
    assert!(!dashboard.is_valid(id, VisualizationTarget::REFLOW));

    let report = dashboard.flush().expect("remaining work");
    assert_eq!(report.ran(id, "reflow"), 1);
}
