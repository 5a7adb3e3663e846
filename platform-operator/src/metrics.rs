//! Process metrics, grounded on the
//! the `metrics-exporter` crate: a `prometheus::Registry` served
//! over plain HTTP text exposition, no push gateway.

use once_cell::sync::Lazy;
use prometheus::{IntCounterVec, Opts, Registry, TextEncoder};

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

pub static RECONCILE_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "reconcile_errors_total",
            "Reconciliation errors, partitioned by error kind",
        ),
        &["kind"],
    )
    .expect("metric options are valid");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric is only registered once");
    counter
});

pub fn record_error(kind: &str) {
    RECONCILE_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn encode() -> String {
    let families = REGISTRY.gather();
    TextEncoder::new()
        .encode_to_string(&families)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_error_increments_the_labeled_counter() {
        record_error("validation");
        let before = RECONCILE_ERRORS_TOTAL.with_label_values(&["validation"]).get();
        record_error("validation");
        let after = RECONCILE_ERRORS_TOTAL.with_label_values(&["validation"]).get();
        assert_eq!(after, before + 1);
    }

    #[test]
    fn encode_contains_the_metric_name() {
        record_error("fatal");
        assert!(encode().contains("reconcile_errors_total"));
    }
}
