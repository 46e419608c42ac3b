use std::time::Duration;

/// Fire-and-forget sink for pipeline timings and counters.
///
/// Passed into each component's constructor. Implementations must not
/// block meaningfully and never fail the caller.
pub trait MetricsSink: Send + Sync {
    fn process_anchor_time(&self, _elapsed: Duration) {}

    fn process_did_time(&self, _elapsed: Duration) {}

    fn cas_write_time(&self, _elapsed: Duration) {}

    fn cas_resolve_time(&self, _elapsed: Duration) {}

    /// A resolve was served from the local store.
    fn cas_cache_hit(&self) {}

    /// Time spent reading from one source (`"local"`, `"webcas"`, `"ipfs"`).
    fn cas_read_time(&self, _source: &str, _elapsed: Duration) {}
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {}
