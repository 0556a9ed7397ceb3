use criterion::{Criterion, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::hint::black_box;
use viz_scheduler::api::{
    Dashboard, DashboardConfig, DomainData, SharedDataSource, TargetOptions, ViewContext,
    Visualization,
};
use viz_scheduler::core::{ScaleValues, SourceId};
use viz_scheduler::SchedResult;

struct Sparkline;

impl Visualization for Sparkline {
    fn type_name(&self) -> &'static str {
        "sparkline"
    }

    fn format_data(&mut self, domain: &DomainData) -> SchedResult<Value> {
        let points = domain
            .sources
            .first()
            .and_then(|source| source.results.as_array())
            .map_or(0, Vec::len);
        Ok(json!({ "points": points }))
    }

    fn scale_values(&self, _scale: &str, formatted: &Value) -> Option<ScaleValues> {
        formatted["points"]
            .as_f64()
            .map(|points| ScaleValues::new().with("max", points))
    }

    fn update_view(&mut self, cx: &mut ViewContext<'_>) -> SchedResult<()> {
        black_box(cx.scale_extent("y", "max"));
        Ok(())
    }
}

fn build_dashboard(targets: usize, shared_scale: bool) -> Dashboard {
    let config = DashboardConfig::new()
        .with_activate_on_create(true)
        .with_render_on_create(false);
    let mut dashboard = Dashboard::new(config).expect("dashboard init");
    for index in 0..targets {
        let source = SharedDataSource::new(
            SourceId::new(1),
            json!((0..index % 32).collect::<Vec<usize>>()),
        );
        let mut options = TargetOptions::new(Sparkline).with_source(source.into_source());
        if shared_scale {
            options = options.with_scales(["y"]);
        }
        dashboard.add_target(options).expect("add target");
    }
    dashboard
}

fn bench_flush_independent_targets_500(c: &mut Criterion) {
    let mut dashboard = build_dashboard(500, false);

    c.bench_function("flush_independent_targets_500", |b| {
        b.iter(|| {
            dashboard
                .notify_results_changed(SourceId::new(1))
                .expect("notify");
            let report = dashboard.flush().expect("flush");
            black_box(report.executed_count());
        })
    });
}

fn bench_flush_shared_scale_100(c: &mut Criterion) {
    let mut dashboard = build_dashboard(100, true);

    c.bench_function("flush_shared_scale_100", |b| {
        b.iter(|| {
            dashboard
                .notify_results_changed(SourceId::new(1))
                .expect("notify");
            let report = dashboard.flush().expect("flush");
            black_box(report.executed_count());
        })
    });
}

fn bench_snapshot_json_500(c: &mut Criterion) {
    let dashboard = build_dashboard(500, true);

    c.bench_function("snapshot_json_500", |b| {
        b.iter(|| {
            let json = dashboard
                .snapshot()
                .to_json_contract_v1_pretty()
                .expect("snapshot json");
            black_box(json.len());
        })
    });
}

criterion_group!(
    benches,
    bench_flush_independent_targets_500,
    bench_flush_shared_scale_100,
    bench_snapshot_json_500
);
criterion_main!(benches);
