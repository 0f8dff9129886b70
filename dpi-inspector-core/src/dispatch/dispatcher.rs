use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::dispatch::hash::worker_index;
use crate::dispatch::worker::{DefaultRuleEngine, PacketSubmission, Worker, WorkerStats};
use crate::flow::{FlowTable, FlowTableStats};
use crate::rules::InMemoryRuleStore;

/// Outcome of a `Dispatcher::submit` call (spec.md §5's back-pressure and
/// shutdown semantics).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Busy,
    ShuttingDown,
}

/// Fan-out dispatcher: `N` worker pipelines, each with its own bounded
/// queue, routed by a stable hash of the flow's dispatch key (spec.md
/// §4.7). Owns the workers' join handles and a shared shutdown signal.
pub struct Dispatcher {
    senders: Vec<mpsc::Sender<PacketSubmission>>,
    handles: Vec<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
    shutting_down: AtomicBool,
    rule_engine: Arc<DefaultRuleEngine>,
    shards: Vec<(Arc<FlowTable>, Arc<WorkerStats>)>,
}

impl Dispatcher {
    /// Spawns `worker_count` worker tasks, each with a queue of
    /// `queue_capacity` and a flow-table shard of `flow_capacity`.
    pub fn start(
        worker_count: usize,
        queue_capacity: usize,
        flow_capacity: usize,
        rule_engine: Arc<DefaultRuleEngine>,
    ) -> Arc<Self> {
        let worker_count = worker_count.max(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut senders = Vec::with_capacity(worker_count);
        let mut handles = Vec::with_capacity(worker_count);
        let mut shards = Vec::with_capacity(worker_count);

        for id in 0..worker_count {
            let (tx, rx) = mpsc::channel(queue_capacity.max(1));
            let worker = Worker::new(id, flow_capacity, rule_engine.clone(), rx, shutdown_rx.clone());
            shards.push((worker.flows_handle(), worker.stats_handle()));
            let join = tokio::spawn(worker.run());
            senders.push(tx);
            handles.push(join);
        }

        info!(workers = worker_count, queue_capacity, flow_capacity, "dispatcher started");

        Arc::new(Self {
            senders,
            handles,
            shutdown_tx,
            shutting_down: AtomicBool::new(false),
            rule_engine,
            shards,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.senders.len()
    }

    pub fn rule_engine(&self) -> &Arc<DefaultRuleEngine> {
        &self.rule_engine
    }

    /// Routes `pkt` to `hash(key) mod N` and enqueues it, blocking (with
    /// an optional deadline) if that worker's queue is full.
    pub async fn submit(&self, pkt: PacketSubmission, deadline: Option<Duration>) -> SubmitOutcome {
        if self.shutting_down.load(Ordering::Acquire) {
            return SubmitOutcome::ShuttingDown;
        }

        let idx = worker_index(&pkt.key, self.senders.len());
        let sender = &self.senders[idx];

        let send_fut = sender.send(pkt);
        let result = match deadline {
            Some(d) => match tokio::time::timeout(d, send_fut).await {
                Ok(r) => r,
                Err(_) => return SubmitOutcome::Busy,
            },
            None => send_fut.await,
        };

        match result {
            Ok(()) => SubmitOutcome::Accepted,
            Err(_) => SubmitOutcome::Busy,
        }
    }

    /// Like `submit`, but waits for the owning worker to actually process
    /// the packet and returns its verdict — used by the admin `/ingest`
    /// endpoint, whose response body reports `forwarded` or `dropped`
    /// synchronously (spec.md §6).
    pub async fn submit_and_await(
        &self,
        mut pkt: PacketSubmission,
        deadline: Option<Duration>,
    ) -> Result<crate::dispatch::worker::Verdict, SubmitOutcome> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        pkt.reply = Some(tx);
        match self.submit(pkt, deadline).await {
            SubmitOutcome::Accepted => rx.await.map_err(|_| SubmitOutcome::Busy),
            other => Err(other),
        }
    }

    /// Stops intake (new `submit` calls fail fast with `ShuttingDown`),
    /// then signals every worker to drain its queue and terminate.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        let _ = self.shutdown_tx.send(true);
        info!("dispatcher shutdown signaled, workers draining");
    }

    pub fn join_handles(&self) -> &[JoinHandle<()>] {
        &self.handles
    }

    /// Per-shard flow-table stats, indexed by worker id (spec.md §6's
    /// `/stats` response aggregates these).
    pub fn shard_stats(&self) -> Vec<ShardStats> {
        self.shards
            .iter()
            .enumerate()
            .map(|(worker_id, (flows, _))| ShardStats { worker_id, flow_stats: flows.stats() })
            .collect()
    }

    /// Sums `(processed, forwarded, dropped)` across every worker.
    pub fn aggregate_worker_stats(&self) -> (u64, u64, u64) {
        self.shards.iter().fold((0, 0, 0), |(p, f, d), (_, stats)| {
            let (wp, wf, wd) = stats.snapshot();
            (p + wp, f + wf, d + wd)
        })
    }

    /// All live flows across every shard, used by `/stats/connections`.
    pub fn all_flows(&self) -> Vec<crate::flow::FlowRecord> {
        self.shards.iter().flat_map(|(flows, _)| flows.all()).collect()
    }

    /// Reaps idle flows from every shard, returning the total removed.
    pub fn reap_idle(&self, idle_secs: u64) -> usize {
        self.shards.iter().map(|(flows, _)| flows.cleanup_stale(idle_secs)).sum()
    }
}

/// A flow table snapshot paired with its owning worker id, used when the
/// admin surface aggregates stats across shards.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ShardStats {
    pub worker_id: usize,
    pub flow_stats: FlowTableStats,
}

/// `InMemoryRuleStore` is the only store wired up at this workspace's
/// default construction path (`DefaultRuleEngine::new(InMemoryRuleStore::new())`).
pub fn default_rule_engine() -> Arc<DefaultRuleEngine> {
    Arc::new(DefaultRuleEngine::new(InMemoryRuleStore::new()))
}
