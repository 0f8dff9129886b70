use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::flow::{AppType, Protocol};

/// A single flow's final state as reported by the offline pipeline
/// (spec.md §6: "each connection carries its five-tuple, domain, app,
/// counters, and blocked flag").
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ConnectionDetail {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: Protocol,
    pub domain: Option<String>,
    pub app_type: AppType,
    pub packets: u64,
    pub bytes: u64,
    pub blocked: bool,
}

/// The full report produced by analyzing one `.pcap` file (spec.md §6).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PcapAnalysisReport {
    pub total_packets: u64,
    pub forwarded_packets: u64,
    pub dropped_packets: u64,
    pub total_bytes: u64,
    pub tcp_packets: u64,
    pub udp_packets: u64,
    pub other_packets: u64,
    pub app_breakdown: BTreeMap<String, u64>,
    pub domains_detected: Vec<String>,
    pub blocked_connections: Vec<ConnectionDetail>,
    pub connections: Vec<ConnectionDetail>,
}
