use std::fmt;
use std::net::Ipv4Addr;

/// Transport protocol, as carried in the five-tuple. `Other` covers every
/// IP protocol number besides TCP (6) and UDP (17).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Other,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
            Protocol::Other => "OTHER",
        };
        f.write_str(s)
    }
}

impl serde::Serialize for Protocol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl Protocol {
    pub fn from_ip_protocol_number(n: u8) -> Self {
        match n {
            6 => Protocol::Tcp,
            17 => Protocol::Udp,
            _ => Protocol::Other,
        }
    }

    /// Parse the wire form used by the admin `/ingest` endpoint's `tuple`
    /// field. Anything other than "TCP"/"UDP" (case-insensitive) is
    /// `Other`, matching `from_ip_protocol_number`'s fallback.
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "TCP" => Protocol::Tcp,
            "UDP" => Protocol::Udp,
            _ => Protocol::Other,
        }
    }
}

/// The five-tuple identifying a flow: `(src_ip, dst_ip, src_port, dst_port,
/// protocol)`. Immutable once a flow is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct FlowKey {
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: Protocol,
}

impl FlowKey {
    pub fn new(
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        src_port: u16,
        dst_port: u16,
        protocol: Protocol,
    ) -> Self {
        Self { src_ip, dst_ip, src_port, dst_port, protocol }
    }

    /// The dispatcher's affinity-hash input: `"{src_ip}:{src_port}:{dst_ip}:{dst_port}"`
    /// (spec.md §4.7). Does not include the protocol — two flows between
    /// the same endpoints on the same ports but different protocols hash
    /// identically and land on the same worker, which is harmless since
    /// the flow table keys on the full tuple anyway.
    pub fn dispatch_key(&self) -> String {
        format!("{}:{}:{}:{}", self.src_ip, self.src_port, self.dst_ip, self.dst_port)
    }
}

impl fmt::Display for FlowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}-{}",
            self.src_ip, self.src_port, self.dst_ip, self.dst_port, self.protocol
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_key_omits_protocol() {
        let key = FlowKey::new(
            Ipv4Addr::new(1, 2, 3, 4),
            Ipv4Addr::new(5, 6, 7, 8),
            1111,
            443,
            Protocol::Tcp,
        );
        assert_eq!(key.dispatch_key(), "1.2.3.4:1111:5.6.7.8:443");
    }

    #[test]
    fn protocol_from_number() {
        assert_eq!(Protocol::from_ip_protocol_number(6), Protocol::Tcp);
        assert_eq!(Protocol::from_ip_protocol_number(17), Protocol::Udp);
        assert_eq!(Protocol::from_ip_protocol_number(1), Protocol::Other);
    }

    #[test]
    fn protocol_parse_is_case_insensitive() {
        assert_eq!(Protocol::parse("tcp"), Protocol::Tcp);
        assert_eq!(Protocol::parse("UDP"), Protocol::Udp);
        assert_eq!(Protocol::parse("sctp"), Protocol::Other);
    }
}
