use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    pub visits_opened: IntCounter,
    pub tasks_started: IntCounter,
    pub tasks_completed: IntCounter,
    pub visits_unlocked: IntCounter,
    pub visits_dropped: IntCounter,

    pub attributions_total: IntCounter,
    pub attribution_failures: IntCounter,
    pub revenue_micros_total: IntCounter,

    pub open_visits: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let visits_opened =
            IntCounter::new("linklock_visits_opened_total", "Visits opened").unwrap();
        let tasks_started =
            IntCounter::new("linklock_tasks_started_total", "Gate tasks started").unwrap();
        let tasks_completed =
            IntCounter::new("linklock_tasks_completed_total", "Gate tasks completed").unwrap();
        let visits_unlocked =
            IntCounter::new("linklock_visits_unlocked_total", "Visits unlocked").unwrap();
        let visits_dropped =
            IntCounter::new("linklock_visits_dropped_total", "Visits abandoned").unwrap();
        let attributions_total = IntCounter::new(
            "linklock_attributions_total",
            "Revenue attributions credited",
        )
        .unwrap();
        let attribution_failures = IntCounter::new(
            "linklock_attribution_failures_total",
            "Revenue attributions aborted",
        )
        .unwrap();
        let revenue_micros_total = IntCounter::new(
            "linklock_revenue_micros_total",
            "Total revenue credited, in micro-dollars",
        )
        .unwrap();
        let open_visits =
            IntGauge::new("linklock_open_visits", "Currently open visit sessions").unwrap();

        registry.register(Box::new(visits_opened.clone())).unwrap();
        registry.register(Box::new(tasks_started.clone())).unwrap();
        registry
            .register(Box::new(tasks_completed.clone()))
            .unwrap();
        registry
            .register(Box::new(visits_unlocked.clone()))
            .unwrap();
        registry.register(Box::new(visits_dropped.clone())).unwrap();
        registry
            .register(Box::new(attributions_total.clone()))
            .unwrap();
        registry
            .register(Box::new(attribution_failures.clone()))
            .unwrap();
        registry
            .register(Box::new(revenue_micros_total.clone()))
            .unwrap();
        registry.register(Box::new(open_visits.clone())).unwrap();

        Self {
            registry: Arc::new(registry),
            visits_opened,
            tasks_started,
            tasks_completed,
            visits_unlocked,
            visits_dropped,
            attributions_total,
            attribution_failures,
            revenue_micros_total,
            open_visits,
        }
    }

    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        encoder
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
