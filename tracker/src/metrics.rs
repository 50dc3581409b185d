use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "route", "status"]
    )
    .unwrap();
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "Latency distribution of HTTP requests"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ]),
        &["method", "route"]
    )
    .unwrap();
    pub static ref DEVICES_CREATED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_devices_created_total",
        "Total devices created"
    ))
    .unwrap();
    pub static ref READINGS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_readings_total",
        "Total readings ingested"
    ))
    .unwrap();
    pub static ref ALERTS_CREATED_TOTAL: CounterVec = CounterVec::new(
        Opts::new("tracker_alerts_created_total", "Total alerts opened"),
        &["type"]
    )
    .unwrap();
    pub static ref NOTIFY_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "tracker_notify_failures_total",
        "Total failed alert notifications"
    ))
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(DEVICES_CREATED_TOTAL.clone()))
        .unwrap();
    REGISTRY.register(Box::new(READINGS_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(ALERTS_CREATED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(NOTIFY_FAILURES_TOTAL.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
