use std::sync::Mutex;

use ahash::AHashMap;

use crate::flow::key::FlowKey;
use crate::flow::record::{now_secs, AppType, FlowRecord, FlowState};

/// Aggregate counters returned by `FlowTable::stats` (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub struct FlowTableStats {
    pub active: usize,
    pub total_seen: u64,
    pub classified_count: u64,
    pub blocked_count: u64,
}

struct Inner {
    flows: AHashMap<FlowKey, FlowRecord>,
    capacity: usize,
    total_seen: u64,
    classified_count: u64,
    blocked_count: u64,
}

/// A five-tuple-keyed flow table with bounded capacity, LRU-style eviction
/// by smallest `last_seen`, and a single mutex guarding every mutation
/// (spec.md §4.4). Per §5, a single worker only ever touches its own
/// shard serially; the mutex exists to let a background reaper task or an
/// administrative stats query observe the table concurrently.
pub struct FlowTable {
    inner: Mutex<Inner>,
}

impl FlowTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                flows: AHashMap::new(),
                capacity: capacity.max(1),
                total_seen: 0,
                classified_count: 0,
                blocked_count: 0,
            }),
        }
    }

    /// Returns the flow for `key`, creating one if absent. Creation evicts
    /// the entry with the smallest `last_seen` first if the table is at
    /// capacity (invariant: `|flows| <= capacity` at all times).
    pub fn get_or_create(&self, key: FlowKey) -> FlowRecord {
        let mut inner = self.inner.lock().expect("flow table mutex poisoned");
        if let Some(existing) = inner.flows.get(&key) {
            return existing.clone();
        }

        if inner.flows.len() >= inner.capacity {
            if let Some(evict_key) =
                inner.flows.iter().min_by_key(|(_, f)| f.last_seen).map(|(k, _)| *k)
            {
                inner.flows.remove(&evict_key);
            }
        }

        let now = now_secs();
        let record = FlowRecord::new(key, now);
        inner.flows.insert(key, record.clone());
        inner.total_seen += 1;
        record
    }

    /// Updates `last_seen` and the directional packet/byte counters, then
    /// returns the updated record.
    pub fn update(&self, key: &FlowKey, size: u64, outbound: bool) -> Option<FlowRecord> {
        let mut inner = self.inner.lock().expect("flow table mutex poisoned");
        let flow = inner.flows.get_mut(key)?;
        flow.last_seen = now_secs();
        if outbound {
            flow.packets_out += 1;
            flow.bytes_out += size;
        } else {
            flow.packets_in += 1;
            flow.bytes_in += size;
        }
        Some(flow.clone())
    }

    /// Advances TCP sub-state per `TcpSubState::advance` (spec.md §9 Open
    /// Question). A no-op for non-TCP flows.
    pub fn update_tcp_state(&self, key: &FlowKey, tcp_flags: u8) -> Option<FlowRecord> {
        let mut inner = self.inner.lock().expect("flow table mutex poisoned");
        let flow = inner.flows.get_mut(key)?;
        if let Some(state) = flow.tcp_state {
            flow.tcp_state = Some(state.advance(tcp_flags));
        }
        Some(flow.clone())
    }

    /// Marks the flow classified (once) with the given app type and
    /// domain. `domain` is set only if not already present; `state` only
    /// moves forward (`New`/`Classified` -> `Classified`, never back from
    /// `Blocked`/`Closed` since those flows are never re-classified by the
    /// caller).
    pub fn classify(
        &self,
        key: &FlowKey,
        app: AppType,
        domain: Option<String>,
    ) -> Option<FlowRecord> {
        let mut inner = self.inner.lock().expect("flow table mutex poisoned");
        if inner.flows.get(key).map(|f| f.state) != Some(FlowState::Classified) {
            inner.classified_count += 1;
        }
        let flow = inner.flows.get_mut(key)?;
        flow.state = FlowState::Classified;
        flow.app_type = app;
        if flow.domain.is_none() {
            flow.domain = domain;
        }
        Some(flow.clone())
    }

    /// Marks the flow blocked. Idempotent: `blocked_count` increments only
    /// on the first transition into `Blocked`.
    pub fn block(&self, key: &FlowKey) -> Option<FlowRecord> {
        let mut inner = self.inner.lock().expect("flow table mutex poisoned");
        if inner.flows.get(key).map(|f| f.state) != Some(FlowState::Blocked) {
            inner.blocked_count += 1;
        }
        let flow = inner.flows.get_mut(key)?;
        flow.state = FlowState::Blocked;
        Some(flow.clone())
    }

    /// Sets the flow's state to `Closed` and removes it from the table in
    /// the same critical section.
    pub fn close(&self, key: &FlowKey) -> bool {
        let mut inner = self.inner.lock().expect("flow table mutex poisoned");
        inner.flows.remove(key).is_some()
    }

    /// Removes every flow whose `last_seen` is older than `t_idle` seconds,
    /// returning the number removed.
    pub fn cleanup_stale(&self, t_idle_secs: u64) -> usize {
        let mut inner = self.inner.lock().expect("flow table mutex poisoned");
        let now = now_secs();
        let cutoff = now.saturating_sub(t_idle_secs);
        let before = inner.flows.len();
        inner.flows.retain(|_, f| f.last_seen >= cutoff);
        before - inner.flows.len()
    }

    pub fn stats(&self) -> FlowTableStats {
        let inner = self.inner.lock().expect("flow table mutex poisoned");
        FlowTableStats {
            active: inner.flows.len(),
            total_seen: inner.total_seen,
            classified_count: inner.classified_count,
            blocked_count: inner.blocked_count,
        }
    }

    pub fn get(&self, key: &FlowKey) -> Option<FlowRecord> {
        let inner = self.inner.lock().expect("flow table mutex poisoned");
        inner.flows.get(key).cloned()
    }

    pub fn all(&self) -> Vec<FlowRecord> {
        let inner = self.inner.lock().expect("flow table mutex poisoned");
        inner.flows.values().cloned().collect()
    }
}
