use prometheus::{
    Counter, Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub location_polls_total: IntCounterVec,
    pub pickups_confirmed_total: IntCounterVec,
    pub points_awarded_total: Counter,
    pub store_writes_total: IntCounterVec,
    pub store_write_latency_seconds: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let location_polls_total = IntCounterVec::new(
            Opts::new("location_polls_total", "Picker location polls by strategy and outcome"),
            &["strategy", "outcome"],
        )
        .expect("valid location_polls_total metric");

        let pickups_confirmed_total = IntCounterVec::new(
            Opts::new(
                "pickups_confirmed_total",
                "Pickup confirmations by whether a user was awarded points",
            ),
            &["outcome"],
        )
        .expect("valid pickups_confirmed_total metric");

        let points_awarded_total =
            Counter::new("points_awarded_total", "Loyalty points awarded to users")
                .expect("valid points_awarded_total metric");

        let store_writes_total = IntCounterVec::new(
            Opts::new("store_writes_total", "Document store writes by outcome"),
            &["outcome"],
        )
        .expect("valid store_writes_total metric");

        let store_write_latency_seconds = Histogram::with_opts(HistogramOpts::new(
            "store_write_latency_seconds",
            "Latency of applying and persisting a document write in seconds",
        ))
        .expect("valid store_write_latency_seconds metric");

        registry
            .register(Box::new(location_polls_total.clone()))
            .expect("register location_polls_total");
        registry
            .register(Box::new(pickups_confirmed_total.clone()))
            .expect("register pickups_confirmed_total");
        registry
            .register(Box::new(points_awarded_total.clone()))
            .expect("register points_awarded_total");
        registry
            .register(Box::new(store_writes_total.clone()))
            .expect("register store_writes_total");
        registry
            .register(Box::new(store_write_latency_seconds.clone()))
            .expect("register store_write_latency_seconds");

        Self {
            registry,
            location_polls_total,
            pickups_confirmed_total,
            points_awarded_total,
            store_writes_total,
            store_write_latency_seconds,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
