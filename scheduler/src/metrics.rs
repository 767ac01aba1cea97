use prometheus_client::{
    metrics::{counter::Counter, gauge::Gauge},
    registry::Registry,
};

/// Metrics for a scheduler.
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    /// Number of successful node selections
    pub schedule: Counter,
    /// Number of selections that found no node
    pub schedule_failed: Counter,
    /// Number of reschedule requests
    pub reschedule: Counter,
}

impl Scheduler {
    /// Create and return a new set of metrics, registered with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "schedule",
            "Number of successful node selections",
            metrics.schedule.clone(),
        );
        registry.register(
            "schedule_failed",
            "Number of selections that found no node",
            metrics.schedule_failed.clone(),
        );
        registry.register(
            "reschedule",
            "Number of reschedule requests",
            metrics.reschedule.clone(),
        );
        metrics
    }
}

/// Metrics for the prober.
#[derive(Clone, Debug, Default)]
pub struct Prober {
    /// Current number of probes waiting to be submitted
    pub pending: Gauge,
    /// Number of probes submitted
    pub submitted: Counter,
    /// Number of submissions rejected because the backlog was full
    pub rejected: Counter,
    /// Number of probes dropped because a newer selection was made
    pub stale: Counter,
    /// Number of probes skipped because the node lacked the block
    pub skipped: Counter,
    /// Number of probes whose stream failed
    pub failed: Counter,
    /// Number of latency measurements recorded
    pub measured: Counter,
}

impl Prober {
    /// Create and return a new set of metrics, registered with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "probe_pending",
            "Current number of probes waiting to be submitted",
            metrics.pending.clone(),
        );
        registry.register(
            "probe_submitted",
            "Number of probes submitted",
            metrics.submitted.clone(),
        );
        registry.register(
            "probe_rejected",
            "Number of submissions rejected because the backlog was full",
            metrics.rejected.clone(),
        );
        registry.register(
            "probe_stale",
            "Number of probes dropped because a newer selection was made",
            metrics.stale.clone(),
        );
        registry.register(
            "probe_skipped",
            "Number of probes skipped because the node lacked the block",
            metrics.skipped.clone(),
        );
        registry.register(
            "probe_failed",
            "Number of probes whose stream failed",
            metrics.failed.clone(),
        );
        registry.register(
            "probe_measured",
            "Number of latency measurements recorded",
            metrics.measured.clone(),
        );
        metrics
    }
}
