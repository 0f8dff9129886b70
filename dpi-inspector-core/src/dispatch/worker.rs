use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::classify::classify;
use crate::flow::{AppType, FlowKey, FlowTable};
use crate::rules::{InMemoryRuleStore, RuleEngine};

/// The default rule engine type: an in-memory `RuleStore` behind the
/// pluggable `RuleEngine` seam (DESIGN.md — no external backend is
/// actually wired up, only the trait boundary for one).
pub type DefaultRuleEngine = RuleEngine<InMemoryRuleStore>;

/// The wire shape of a single packet submission (matches the admin
/// `/ingest` JSON body in spec.md §6: `tuple, size, outbound, tcp_flags,
/// payload_length, domain, app_type`). Live single-packet submissions
/// carry no raw payload bytes — `domain`/`app_type`, when present, stand
/// in for what a byte-level extractor would have recovered; the offline
/// `.pcap` pipeline (§4.8) is the path that runs the real extractors
/// against captured bytes.
#[derive(Debug)]
pub struct PacketSubmission {
    pub key: FlowKey,
    pub size: u64,
    pub outbound: bool,
    pub tcp_flags: Option<u8>,
    pub payload_length: u64,
    pub domain: Option<String>,
    pub app_type: Option<AppType>,
    /// Set by `Dispatcher::submit_and_await` so the admin `/ingest`
    /// handler can report the verdict synchronously; `None` for
    /// fire-and-forget submissions.
    pub reply: Option<tokio::sync::oneshot::Sender<Verdict>>,
}

/// Per-packet verdict (spec.md glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Drop,
}

/// Per-worker-local statistics (spec.md §5: "per-worker statistics are
/// worker-local").
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub processed: AtomicU64,
    pub forwarded: AtomicU64,
    pub dropped: AtomicU64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.processed.load(Ordering::Relaxed),
            self.forwarded.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
        )
    }
}

/// One worker pipeline: a bounded FIFO queue, its own flow-table shard,
/// and a shared handle to the rule engine (spec.md §4.7). Packets for a
/// given five-tuple always land on the same worker (`dispatch::hash`), so
/// a worker's own flow table needs no internal synchronization beyond
/// what `FlowTable` already provides for concurrent readers.
pub struct Worker {
    pub id: usize,
    pub flows: Arc<FlowTable>,
    pub stats: Arc<WorkerStats>,
    rule_engine: Arc<DefaultRuleEngine>,
    receiver: mpsc::Receiver<PacketSubmission>,
    shutdown: watch::Receiver<bool>,
}

impl Worker {
    pub fn new(
        id: usize,
        flow_capacity: usize,
        rule_engine: Arc<DefaultRuleEngine>,
        receiver: mpsc::Receiver<PacketSubmission>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            id,
            flows: Arc::new(FlowTable::new(flow_capacity)),
            stats: Arc::new(WorkerStats::default()),
            rule_engine,
            receiver,
            shutdown,
        }
    }

    pub fn flows_handle(&self) -> Arc<FlowTable> {
        self.flows.clone()
    }

    pub fn stats_handle(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Runs the worker loop until the queue closes or a shutdown signal
    /// is observed between packets. In-flight processing of the current
    /// packet is never interrupted (spec.md §5).
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                changed = self.shutdown.changed() => {
                    if changed.is_ok() && *self.shutdown.borrow() {
                        info!(worker = self.id, "worker draining queue before shutdown");
                        while let Ok(pkt) = self.receiver.try_recv() {
                            self.process(pkt).await;
                        }
                        break;
                    }
                }
                item = self.receiver.recv() => {
                    match item {
                        Some(pkt) => { self.process(pkt).await; }
                        None => break,
                    }
                }
            }
        }
        debug!(worker = self.id, "worker loop terminated");
    }

    /// Processes a single packet end to end: flow lookup, counters, TCP
    /// sub-state, block/extract/classify/rule-evaluation, verdict
    /// (spec.md §4.7 steps 2-7).
    async fn process(&self, mut pkt: PacketSubmission) -> Verdict {
        let reply = pkt.reply.take();
        let verdict = self.process_inner(&pkt).await;
        if let Some(reply) = reply {
            let _ = reply.send(verdict);
        }
        verdict
    }

    async fn process_inner(&self, pkt: &PacketSubmission) -> Verdict {
        self.stats.processed.fetch_add(1, Ordering::Relaxed);

        self.flows.get_or_create(pkt.key);
        self.flows.update(&pkt.key, pkt.size, pkt.outbound);

        if let Some(flags) = pkt.tcp_flags {
            self.flows.update_tcp_state(&pkt.key, flags);
        }

        if let Some(flow) = self.flows.get(&pkt.key) {
            if flow.state == crate::flow::FlowState::Blocked {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                return Verdict::Drop;
            }
        }

        let already_classified =
            self.flows.get(&pkt.key).map(|f| f.state == crate::flow::FlowState::Classified).unwrap_or(false);

        if !already_classified {
            if let Some(domain) = pkt.domain.clone() {
                let app = classify(&domain);
                self.flows.classify(&pkt.key, app, Some(domain));
            } else if let Some(app) = pkt.app_type {
                if app != AppType::Unknown {
                    self.flows.classify(&pkt.key, app, None);
                }
            }
        }

        let flow = match self.flows.get(&pkt.key) {
            Some(f) => f,
            None => return Verdict::Allow,
        };

        let reason = self
            .rule_engine
            .evaluate(&pkt.key.src_ip.to_string(), pkt.key.dst_port, flow.app_type, flow.domain.as_deref())
            .await;

        if let Some(reason) = reason {
            self.flows.block(&pkt.key);
            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(worker = self.id, key = %pkt.key, kind = %reason.kind, detail = %reason.detail, "packet dropped");
            return Verdict::Drop;
        }

        self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
        Verdict::Allow
    }
}
