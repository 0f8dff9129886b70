use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::Arc;

use crate::capture::CaptureReader;
use crate::classify::classify;
use crate::error::Result;
use crate::extract::{extract, ExtractorHint};
use crate::flow::Protocol;
use crate::offline::report::{ConnectionDetail, PcapAnalysisReport};
use crate::parse::packet::{parse_frame, TransportInfo};
use crate::rules::RuleEngine;
use crate::rules::RuleStore;

/// Sequential single-flow-table analysis of a capture file (spec.md §4.8).
/// Unlike the live dispatcher path, packets are processed strictly in file
/// order on one flow table, and real L7 extraction runs against each
/// packet's actual payload bytes.
pub struct PcapPipeline<S: RuleStore> {
    rule_engine: Arc<RuleEngine<S>>,
}

impl<S: RuleStore> PcapPipeline<S> {
    pub fn new(rule_engine: Arc<RuleEngine<S>>) -> Self {
        Self { rule_engine }
    }

    pub async fn analyze_file(&self, path: &Path) -> Result<PcapAnalysisReport> {
        let file = File::open(path).map_err(crate::error::DpiError::Io)?;
        self.analyze_reader(BufReader::new(file)).await
    }

    pub async fn analyze_reader<R: std::io::Read>(&self, reader: R) -> Result<PcapAnalysisReport> {
        let capture = CaptureReader::new(reader)?;

        let mut flows: HashMap<(Ipv4Addr, Ipv4Addr, u16, u16, Protocol), ConnectionDetail> = HashMap::new();
        let mut flow_order: Vec<(Ipv4Addr, Ipv4Addr, u16, u16, Protocol)> = Vec::new();

        let mut total_packets = 0u64;
        let mut total_bytes = 0u64;
        let mut tcp_packets = 0u64;
        let mut udp_packets = 0u64;
        let mut other_packets = 0u64;
        let mut forwarded = 0u64;
        let mut dropped = 0u64;
        let mut domains_detected: HashSet<String> = HashSet::new();

        for raw in capture {
            total_packets += 1;
            total_bytes += raw.data.len() as u64;

            let parsed = parse_frame(raw.header.ts_sec, raw.header.ts_usec, &raw.data);

            match &parsed.transport {
                Some(TransportInfo::Tcp(_)) => tcp_packets += 1,
                Some(TransportInfo::Udp(_)) => udp_packets += 1,
                None => other_packets += 1,
            }

            let ip = match parsed.ip {
                Some(ip) => ip,
                None => {
                    forwarded += 1;
                    continue;
                }
            };

            let protocol = Protocol::from_ip_protocol_number(ip.protocol);
            let (src_port, dst_port) =
                parsed.transport.as_ref().map(|t| (t.src_port(), t.dst_port())).unwrap_or((0, 0));

            let flow_key = (ip.src_ip, ip.dst_ip, src_port, dst_port, protocol);
            if !flows.contains_key(&flow_key) {
                flows.insert(
                    flow_key,
                    ConnectionDetail {
                        src_ip: ip.src_ip,
                        dst_ip: ip.dst_ip,
                        src_port,
                        dst_port,
                        protocol,
                        domain: None,
                        app_type: crate::flow::AppType::Unknown,
                        packets: 0,
                        bytes: 0,
                        blocked: false,
                    },
                );
                flow_order.push(flow_key);
            }

            let flow = flows.get_mut(&flow_key).expect("just inserted");
            flow.packets += 1;
            flow.bytes += raw.data.len() as u64;

            if flow.domain.is_none() && !parsed.payload.is_empty() {
                let hint = if dst_port == 443 {
                    Some(ExtractorHint::TlsSni)
                } else if dst_port == 80 {
                    Some(ExtractorHint::HttpHost)
                } else if dst_port == 53 && protocol == Protocol::Udp {
                    Some(ExtractorHint::DnsQuery)
                } else if protocol == Protocol::Udp && parsed.payload.first().is_some_and(|b| b & 0x80 != 0) {
                    Some(ExtractorHint::QuicSni)
                } else {
                    None
                };

                if let Some(hint) = hint {
                    if let Some(domain) = extract(hint, &parsed.payload) {
                        domains_detected.insert(domain.clone());
                        flow.domain = Some(domain);
                    }
                }
            }

            if let Some(domain) = flow.domain.clone() {
                if flow.app_type == crate::flow::AppType::Unknown {
                    flow.app_type = classify(&domain);
                }
            }

            let reason = self
                .rule_engine
                .evaluate(&ip.src_ip.to_string(), dst_port, flow.app_type, flow.domain.as_deref())
                .await;

            if reason.is_some() {
                flow.blocked = true;
                dropped += 1;
            } else {
                forwarded += 1;
            }
        }

        let mut app_breakdown: BTreeMap<String, u64> = BTreeMap::new();
        for key in &flow_order {
            let flow = &flows[key];
            *app_breakdown.entry(flow.app_type.as_str().to_string()).or_insert(0) += flow.packets;
        }

        let mut domains_sorted: Vec<String> = domains_detected.into_iter().collect();
        domains_sorted.sort();

        let connections: Vec<ConnectionDetail> = flow_order.iter().map(|k| flows[k].clone()).collect();
        let blocked_connections: Vec<ConnectionDetail> =
            connections.iter().filter(|c| c.blocked).cloned().collect();

        Ok(PcapAnalysisReport {
            total_packets,
            forwarded_packets: forwarded,
            dropped_packets: dropped,
            total_bytes,
            tcp_packets,
            udp_packets,
            other_packets,
            app_breakdown,
            domains_detected: domains_sorted,
            blocked_connections,
            connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::InMemoryRuleStore;
    use crate::testing::pcap::{capture_with_tls_client_hello, dns_query_packet};

    fn engine() -> Arc<RuleEngine<InMemoryRuleStore>> {
        Arc::new(RuleEngine::new(InMemoryRuleStore::new()))
    }

    #[tokio::test]
    async fn analyzes_tls_capture_and_detects_domain() {
        let bytes = capture_with_tls_client_hello("www.google.com");
        let pipeline = PcapPipeline::new(engine());
        let report = pipeline.analyze_reader(std::io::Cursor::new(bytes)).await.unwrap();

        assert_eq!(report.total_packets, 1);
        assert_eq!(report.domains_detected, vec!["www.google.com".to_string()]);
        assert_eq!(report.connections.len(), 1);
        assert_eq!(report.connections[0].app_type, crate::flow::AppType::Google);
        assert_eq!(report.forwarded_packets, 1);
        assert_eq!(report.dropped_packets, 0);
    }

    #[tokio::test]
    async fn blocked_ip_is_reflected_in_report() {
        use crate::rules::RuleSet;
        let store = InMemoryRuleStore::new();
        store.add(RuleSet::Ip, "192.168.1.100".to_string()).await.unwrap();
        let pipeline = PcapPipeline::new(Arc::new(RuleEngine::new(store)));

        let bytes = capture_with_tls_client_hello("www.example.com");
        let report = pipeline.analyze_reader(std::io::Cursor::new(bytes)).await.unwrap();

        assert_eq!(report.dropped_packets, 1);
        assert_eq!(report.blocked_connections.len(), 1);
    }

    #[tokio::test]
    async fn dns_query_is_extracted_and_classified() {
        let bytes = dns_query_packet("api.spotify.com");
        let pipeline = PcapPipeline::new(engine());
        let report = pipeline.analyze_reader(std::io::Cursor::new(bytes)).await.unwrap();

        assert_eq!(report.domains_detected, vec!["api.spotify.com".to_string()]);
        assert_eq!(report.connections[0].app_type, crate::flow::AppType::Spotify);
    }

    #[tokio::test]
    async fn malformed_capture_is_a_fatal_error() {
        let pipeline = PcapPipeline::new(engine());
        let err = pipeline.analyze_reader(std::io::Cursor::new(vec![0u8; 4])).await;
        assert!(err.is_err());
    }
}
