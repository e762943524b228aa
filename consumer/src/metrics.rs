use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Histogram, HistogramOpts, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref MESSAGES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "consumer_messages_total",
        "Total messages received from the broker"
    ))
    .unwrap();
    pub static ref DOCUMENTS_INSERTED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "consumer_documents_inserted_total",
        "Total documents written to storage"
    ))
    .unwrap();
    pub static ref INVALID_PAYLOADS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "consumer_invalid_payloads_total",
        "Total messages dropped for an unexpected shape"
    ))
    .unwrap();
    pub static ref DECODE_ERRORS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "consumer_decode_errors_total",
        "Total messages that failed to decode"
    ))
    .unwrap();
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "consumer_db_failures_total",
        "Total storage insert failures"
    ))
    .unwrap();
    pub static ref INSERT_LATENCY_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "consumer_insert_latency_seconds",
            "Time taken to write one message's documents to storage"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ])
    )
    .unwrap();
}

pub fn init_metrics() {
    REGISTRY.register(Box::new(MESSAGES_TOTAL.clone())).unwrap();
    REGISTRY
        .register(Box::new(DOCUMENTS_INSERTED_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(INVALID_PAYLOADS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(DECODE_ERRORS_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(DB_FAILURES_TOTAL.clone()))
        .unwrap();
    REGISTRY
        .register(Box::new(INSERT_LATENCY_SECONDS.clone()))
        .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
