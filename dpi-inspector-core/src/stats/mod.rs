use serde::Serialize;

use crate::dispatch::{Dispatcher, ShardStats};

/// Engine-level aggregate counters, combining per-worker packet
/// statistics with the flow-table totals across every shard (spec.md
/// §4.4 `stats()` and §6's `/stats` response). Per-worker statistics stay
/// worker-local (spec.md §5); this is only ever a read-only snapshot
/// taken across shards, never a shared counter workers contend on.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub workers: usize,
    pub packets_processed: u64,
    pub packets_forwarded: u64,
    pub packets_dropped: u64,
    pub active_flows: usize,
    pub total_seen: u64,
    pub classified_count: u64,
    pub blocked_count: u64,
    pub rule_store_unavailable_total: u64,
    pub per_worker: Vec<ShardStats>,
}

/// Builds an `EngineStats` snapshot by summing every worker's flow-table
/// stats and packet counters (spec.md §6's aggregate `/stats`).
pub fn snapshot<S: crate::rules::RuleStore>(
    dispatcher: &Dispatcher,
    rule_engine: &crate::rules::RuleEngine<S>,
) -> EngineStats {
    let shard_stats = dispatcher.shard_stats();
    let (processed, forwarded, dropped) = dispatcher.aggregate_worker_stats();

    let active_flows = shard_stats.iter().map(|s| s.flow_stats.active).sum();
    let total_seen = shard_stats.iter().map(|s| s.flow_stats.total_seen).sum();
    let classified_count = shard_stats.iter().map(|s| s.flow_stats.classified_count).sum();
    let blocked_count = shard_stats.iter().map(|s| s.flow_stats.blocked_count).sum();

    EngineStats {
        workers: dispatcher.worker_count(),
        packets_processed: processed,
        packets_forwarded: forwarded,
        packets_dropped: dropped,
        active_flows,
        total_seen,
        classified_count,
        blocked_count,
        rule_store_unavailable_total: rule_engine.rule_store_unavailable_total(),
        per_worker: shard_stats,
    }
}
