use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};
use std::sync::LazyLock;

/// Inbound notices by channel and outcome (`accepted` or a rejection code).
pub static NOTICES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "mozpay_notices_total",
        "Inbound postback/chargeback notices",
        &["kind", "result"]
    )
    .unwrap()
});

pub static DISPATCH_FAILURES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "mozpay_dispatch_failures_total",
        "Notice subscribers that returned an error or panicked",
        &["kind"]
    )
    .unwrap()
});

pub fn metrics_output() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
