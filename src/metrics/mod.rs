use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Retry attempts and outcomes per dispatched command
// - Events appended per aggregate type
// - Optimistic concurrency conflicts per aggregate type
//
// Everything is registered with one Registry; `render` produces the text
// exposition format for whatever exporter the host application runs.
// ============================================================================

/// Central metrics registry for the kernel
pub struct Metrics {
    registry: Registry,

    // Retry Metrics
    pub retry_attempts_total: IntCounterVec,
    pub retry_success: IntCounterVec,
    pub retry_failure: IntCounterVec,

    // Event Store Metrics
    pub events_appended: IntCounterVec,
    pub concurrency_conflicts: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Retry Metrics
        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total command attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let retry_success = IntCounterVec::new(
            Opts::new("retry_success_total", "Total commands that eventually succeeded"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_success.clone()))?;

        let retry_failure = IntCounterVec::new(
            Opts::new("retry_failure_total", "Total commands that failed permanently or exhausted retries"),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(retry_failure.clone()))?;

        // Event Store Metrics
        let events_appended = IntCounterVec::new(
            Opts::new("events_appended_total", "Total events appended to the event store"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let concurrency_conflicts = IntCounterVec::new(
            Opts::new("concurrency_conflicts_total", "Optimistic concurrency conflicts on append"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(concurrency_conflicts.clone()))?;

        Ok(Self {
            registry,
            retry_attempts_total,
            retry_success,
            retry_failure,
            events_appended,
            concurrency_conflicts,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Text exposition of every registered metric
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Helper to record retry attempt
    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        let attempt = attempt.to_string();
        self.retry_attempts_total
            .with_label_values(&[operation, attempt.as_str()])
            .inc();
    }

    pub fn record_retry_success(&self, operation: &str) {
        self.retry_success.with_label_values(&[operation]).inc();
    }

    /// `reason` is "exhausted" or "non_retryable"
    pub fn record_retry_failure(&self, operation: &str, reason: &str) {
        self.retry_failure.with_label_values(&[operation, reason]).inc();
    }

    pub fn record_events_appended(&self, aggregate_type: &str, count: usize) {
        self.events_appended
            .with_label_values(&[aggregate_type])
            .inc_by(count as u64);
    }

    pub fn record_concurrency_conflict(&self, aggregate_type: &str) {
        self.concurrency_conflicts.with_label_values(&[aggregate_type]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_retry() {
        let metrics = Metrics::new().unwrap();
        metrics.record_retry_attempt("PlaceOrder", 0);
        metrics.record_retry_attempt("PlaceOrder", 1);
        metrics.record_retry_success("PlaceOrder");

        let gathered = metrics.registry.gather();
        let attempts = gathered.iter().find(|m| m.name() == "retry_attempts_total").unwrap();
        assert_eq!(attempts.metric.len(), 2); // Two different attempt labels

        let success = gathered.iter().find(|m| m.name() == "retry_success_total").unwrap();
        assert_eq!(success.metric[0].counter.value, Some(1.0));
    }

    #[test]
    fn test_record_events_appended() {
        let metrics = Metrics::new().unwrap();
        metrics.record_events_appended("order", 3);
        metrics.record_events_appended("order", 2);

        let gathered = metrics.registry.gather();
        let appended = gathered.iter().find(|m| m.name() == "events_appended_total").unwrap();
        assert_eq!(appended.metric[0].counter.value, Some(5.0));
    }

    #[test]
    fn test_render_contains_recorded_metrics() {
        let metrics = Metrics::new().unwrap();
        metrics.record_concurrency_conflict("order");
        metrics.record_retry_failure("ShipOrder", "exhausted");

        let text = metrics.render().unwrap();
        assert!(text.contains("concurrency_conflicts_total"));
        assert!(text.contains("retry_failure_total"));
        assert!(text.contains("exhausted"));
    }
}
