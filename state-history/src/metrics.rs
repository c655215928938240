use http_client::duration_histogram;
use prometheus::{HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

/// Counters shared by the Loki client and the historian. Every counter is an
/// atomic, so one instance can be shared across tasks.
#[derive(Clone)]
pub struct HistoryMetrics {
    pub bytes_written: IntCounter,
    pub write_duration: HistogramVec,
    pub writes_total: IntCounterVec,
    pub writes_failed: IntCounterVec,
}

impl HistoryMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let bytes_written = IntCounter::new(
            "state_history_bytes_written_total",
            "The total number of bytes sent within a batch to the history backend.",
        )?;
        let write_duration = duration_histogram(
            "state_history_request_duration_seconds",
            "Histogram of requests to the history backend.",
        )?;
        let writes_total = IntCounterVec::new(
            Opts::new(
                "state_history_writes_total",
                "The total number of history write attempts.",
            ),
            &["org"],
        )?;
        let writes_failed = IntCounterVec::new(
            Opts::new(
                "state_history_writes_failed_total",
                "The total number of failed history writes.",
            ),
            &["org"],
        )?;

        registry.register(Box::new(bytes_written.clone()))?;
        registry.register(Box::new(write_duration.clone()))?;
        registry.register(Box::new(writes_total.clone()))?;
        registry.register(Box::new(writes_failed.clone()))?;

        Ok(Self {
            bytes_written,
            write_duration,
            writes_total,
            writes_failed,
        })
    }
}
