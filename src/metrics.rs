// Prometheus metrics for the gateway
//
// Exposed on the /metrics HTTP endpoint:
// - Invocations by tool and terminal status (counter)
// - Invocation durations by tool (histogram)

use crate::tools::ExecutionOutcome;
use lazy_static::lazy_static;
use prometheus::{core::Collector, Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref INVOCATIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("gateway_invocations_total", "Total tool invocations by terminal status"),
        &["tool", "status"]
    ).expect("Failed to create invocations metric");

    pub static ref INVOCATION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("gateway_invocation_duration_seconds", "Wall-clock duration of tool invocations")
            .buckets(vec![0.05, 0.25, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 180.0]),
        &["tool"]
    ).expect("Failed to create invocation duration metric");
}

fn register(collector: Box<dyn Collector>) -> prometheus::Result<()> {
    match REGISTRY.register(collector) {
        Err(prometheus::Error::AlreadyReg) => Ok(()),
        other => other,
    }
}

/// Register all gateway metrics. Safe to call more than once.
pub fn init() -> prometheus::Result<()> {
    register(Box::new(INVOCATIONS_TOTAL.clone()))?;
    register(Box::new(INVOCATION_DURATION_SECONDS.clone()))?;
    Ok(())
}

/// Record one finished or rejected invocation
pub fn record(tool: &str, outcome: &ExecutionOutcome) {
    INVOCATIONS_TOTAL
        .with_label_values(&[tool, outcome.status.as_str()])
        .inc();
    INVOCATION_DURATION_SECONDS
        .with_label_values(&[tool])
        .observe(outcome.duration.as_secs_f64());
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        assert!(init().is_ok());
        assert!(init().is_ok());
    }

    #[test]
    fn test_record_shows_up_in_text() {
        init().unwrap();
        let before = INVOCATIONS_TOTAL
            .with_label_values(&["metrics-test", "rejected"])
            .get();

        record("metrics-test", &ExecutionOutcome::rejected("nope"));

        let after = INVOCATIONS_TOTAL
            .with_label_values(&["metrics-test", "rejected"])
            .get();
        assert_eq!(after, before + 1);

        let text = gather_metrics().unwrap();
        assert!(text.contains("gateway_invocations_total"));
        assert!(text.contains("metrics-test"));
    }
}
