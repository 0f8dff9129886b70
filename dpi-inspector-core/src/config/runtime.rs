use serde::Deserialize;

/// Dispatcher, flow-table, and shutdown tuning.
#[derive(Debug, Deserialize, Clone)]
pub struct RuntimeConfig {
    /// Number of worker pipelines `N`. Each owns a bounded queue and a
    /// flow-table shard; the same five-tuple always lands on the same
    /// worker via a stable hash of its key.
    /// Default: 4
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-worker bounded queue capacity `Q`. Submissions block (or, via
    /// the deadline-bearing `pop`, time out) once a worker's queue is full.
    /// Default: 1024
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Per-worker-shard flow table capacity `C`. Insertions beyond this
    /// evict the flow with the smallest `last_seen`.
    /// Default: 65536
    #[serde(default = "default_flow_capacity")]
    pub flow_capacity: usize,
    /// Idle timeout `T_idle` in milliseconds: a flow whose `last_seen` is
    /// older than this is eligible for staleness reaping.
    /// Default: 300000 (5 minutes)
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// Interval in milliseconds between background staleness-reaper
    /// sweeps.
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_reap_interval_ms")]
    pub reap_interval_ms: u64,
    /// Graceful shutdown timeout in seconds: how long to wait for worker
    /// queues to drain before forcing termination.
    /// Default: 10
    #[serde(default = "default_shutdown_secs")]
    pub shutdown_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            flow_capacity: default_flow_capacity(),
            idle_timeout_ms: default_idle_timeout_ms(),
            reap_interval_ms: default_reap_interval_ms(),
            shutdown_secs: default_shutdown_secs(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_flow_capacity() -> usize {
    65536
}

fn default_idle_timeout_ms() -> u64 {
    300_000
}

fn default_reap_interval_ms() -> u64 {
    30_000
}

fn default_shutdown_secs() -> u64 {
    10
}
