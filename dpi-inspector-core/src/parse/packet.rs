use std::net::Ipv4Addr;

const ETHERNET_HEADER_LEN: usize = 14;
const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86DD;
const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;

pub const TCP_FLAG_FIN: u8 = 0x01;
pub const TCP_FLAG_SYN: u8 = 0x02;
pub const TCP_FLAG_RST: u8 = 0x04;
pub const TCP_FLAG_PSH: u8 = 0x08;
pub const TCP_FLAG_ACK: u8 = 0x10;

/// IPv4-layer fields. IPv6 is recognized by ethertype but its body is not
/// parsed (no fields are populated, `version` alone distinguishes it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpInfo {
    pub version: u8,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub protocol: u8,
    pub ttl: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpInfo {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack: u32,
    pub flags: u8,
}

impl TcpInfo {
    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpInfo {
    pub src_port: u16,
    pub dst_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportInfo {
    Tcp(TcpInfo),
    Udp(UdpInfo),
}

impl TransportInfo {
    pub fn src_port(&self) -> u16 {
        match self {
            TransportInfo::Tcp(t) => t.src_port,
            TransportInfo::Udp(u) => u.src_port,
        }
    }

    pub fn dst_port(&self) -> u16 {
        match self {
            TransportInfo::Tcp(t) => t.dst_port,
            TransportInfo::Udp(u) => u.dst_port,
        }
    }

    pub fn tcp(&self) -> Option<&TcpInfo> {
        match self {
            TransportInfo::Tcp(t) => Some(t),
            TransportInfo::Udp(_) => None,
        }
    }
}

/// A fully-parsed packet record. Every layer beyond Ethernet is optional:
/// an unrecognized or truncated layer simply leaves the rest unset rather
/// than failing.
#[derive(Debug, Clone)]
pub struct ParsedPacket {
    pub ts_sec: u32,
    pub ts_usec: u32,
    pub src_mac: Option<[u8; 6]>,
    pub dst_mac: Option<[u8; 6]>,
    pub ethertype: Option<u16>,
    pub ip: Option<IpInfo>,
    pub transport: Option<TransportInfo>,
    pub payload: Vec<u8>,
}

impl ParsedPacket {
    fn empty(ts_sec: u32, ts_usec: u32) -> Self {
        Self {
            ts_sec,
            ts_usec,
            src_mac: None,
            dst_mac: None,
            ethertype: None,
            ip: None,
            transport: None,
            payload: Vec::new(),
        }
    }
}

/// Parse a raw link-layer frame. Never panics, never fails: an
/// unrecognized or truncated layer just leaves the remaining fields unset
/// and the payload as whatever bytes were left when parsing stopped.
pub fn parse_frame(ts_sec: u32, ts_usec: u32, frame: &[u8]) -> ParsedPacket {
    let mut pkt = ParsedPacket::empty(ts_sec, ts_usec);

    if frame.len() < ETHERNET_HEADER_LEN {
        pkt.payload = frame.to_vec();
        return pkt;
    }

    let mut dst_mac = [0u8; 6];
    let mut src_mac = [0u8; 6];
    dst_mac.copy_from_slice(&frame[0..6]);
    src_mac.copy_from_slice(&frame[6..12]);
    let ethertype = u16::from_be_bytes([frame[12], frame[13]]);

    pkt.dst_mac = Some(dst_mac);
    pkt.src_mac = Some(src_mac);
    pkt.ethertype = Some(ethertype);

    let rest = &frame[ETHERNET_HEADER_LEN..];

    if ethertype == ETHERTYPE_IPV6 {
        pkt.payload = rest.to_vec();
        return pkt;
    }

    if ethertype != ETHERTYPE_IPV4 {
        pkt.payload = rest.to_vec();
        return pkt;
    }

    match parse_ipv4(rest) {
        Some((ip, ip_payload)) => {
            pkt.ip = Some(ip);
            match ip.protocol {
                PROTO_TCP => match parse_tcp(ip_payload) {
                    Some((tcp, tcp_payload)) => {
                        pkt.transport = Some(TransportInfo::Tcp(tcp));
                        pkt.payload = tcp_payload.to_vec();
                    }
                    None => pkt.payload = ip_payload.to_vec(),
                },
                PROTO_UDP => match parse_udp(ip_payload) {
                    Some((udp, udp_payload)) => {
                        pkt.transport = Some(TransportInfo::Udp(udp));
                        pkt.payload = udp_payload.to_vec();
                    }
                    None => pkt.payload = ip_payload.to_vec(),
                },
                _ => pkt.payload = ip_payload.to_vec(),
            }
        }
        None => pkt.payload = rest.to_vec(),
    }

    pkt
}

fn parse_ipv4(buf: &[u8]) -> Option<(IpInfo, &[u8])> {
    if buf.len() < 20 {
        return None;
    }
    let version = buf[0] >> 4;
    if version != 4 {
        return None;
    }
    let ihl = (buf[0] & 0x0F) as usize * 4;
    if ihl < 20 || buf.len() < ihl {
        return None;
    }
    let ttl = buf[8];
    let protocol = buf[9];
    let src_ip = Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]);
    let dst_ip = Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]);

    Some((IpInfo { version, src_ip, dst_ip, protocol, ttl }, &buf[ihl..]))
}

fn parse_tcp(buf: &[u8]) -> Option<(TcpInfo, &[u8])> {
    if buf.len() < 20 {
        return None;
    }
    let src_port = u16::from_be_bytes([buf[0], buf[1]]);
    let dst_port = u16::from_be_bytes([buf[2], buf[3]]);
    let seq = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
    let ack = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
    let data_offset = (buf[12] >> 4) as usize * 4;
    let flags = buf[13];
    if data_offset < 20 || buf.len() < data_offset {
        return None;
    }

    Some((TcpInfo { src_port, dst_port, seq, ack, flags }, &buf[data_offset..]))
}

fn parse_udp(buf: &[u8]) -> Option<(UdpInfo, &[u8])> {
    if buf.len() < 8 {
        return None;
    }
    let src_port = u16::from_be_bytes([buf[0], buf[1]]);
    let dst_port = u16::from_be_bytes([buf[2], buf[3]]);
    Some((UdpInfo { src_port, dst_port }, &buf[8..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth_ipv4_tcp(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0xAA; 6]); // dst mac
        buf.extend_from_slice(&[0xBB; 6]); // src mac
        buf.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        let total_len = 20 + 20 + payload.len();
        let mut ip = vec![0u8; 20];
        ip[0] = 0x45; // version 4, IHL 5
        ip[2] = (total_len >> 8) as u8;
        ip[3] = total_len as u8;
        ip[8] = 64; // ttl
        ip[9] = PROTO_TCP;
        ip[12..16].copy_from_slice(&[192, 168, 1, 100]);
        ip[16..20].copy_from_slice(&[142, 250, 185, 206]);
        buf.extend_from_slice(&ip);

        let mut tcp = vec![0u8; 20];
        tcp[0..2].copy_from_slice(&55000u16.to_be_bytes());
        tcp[2..4].copy_from_slice(&443u16.to_be_bytes());
        tcp[12] = 5 << 4;
        tcp[13] = TCP_FLAG_PSH | TCP_FLAG_ACK;
        buf.extend_from_slice(&tcp);
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn parses_full_tcp_frame() {
        let frame = eth_ipv4_tcp(b"hello-tls");
        let pkt = parse_frame(1, 2, &frame);
        assert_eq!(pkt.ethertype, Some(ETHERTYPE_IPV4));
        let ip = pkt.ip.unwrap();
        assert_eq!(ip.src_ip, Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(ip.dst_ip, Ipv4Addr::new(142, 250, 185, 206));
        assert_eq!(ip.protocol, PROTO_TCP);
        let tcp = match pkt.transport.unwrap() {
            TransportInfo::Tcp(t) => t,
            TransportInfo::Udp(_) => panic!("expected tcp"),
        };
        assert_eq!(tcp.dst_port, 443);
        assert!(tcp.has_flag(TCP_FLAG_ACK));
        assert_eq!(pkt.payload, b"hello-tls");
    }

    #[test]
    fn truncated_frame_does_not_panic() {
        let pkt = parse_frame(0, 0, &[0u8; 3]);
        assert!(pkt.ethertype.is_none());
        assert!(pkt.ip.is_none());
        assert_eq!(pkt.payload, vec![0u8; 3]);
    }

    #[test]
    fn unrecognized_ethertype_leaves_payload_raw() {
        let mut frame = vec![0xAAu8; 12];
        frame.extend_from_slice(&0x88CCu16.to_be_bytes()); // LLDP
        frame.extend_from_slice(b"not-ip");
        let pkt = parse_frame(0, 0, &frame);
        assert!(pkt.ip.is_none());
        assert_eq!(pkt.payload, b"not-ip");
    }

    #[test]
    fn truncated_ip_header_leaves_ip_unset() {
        let mut frame = vec![0xAAu8; 12];
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        frame.extend_from_slice(&[0x45, 0, 0, 0]); // short IP header
        let pkt = parse_frame(0, 0, &frame);
        assert!(pkt.ip.is_none());
    }

    #[test]
    fn udp_frame_parses_ports() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&[0xAA; 6]);
        buf.extend_from_slice(&[0xBB; 6]);
        buf.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        let mut ip = vec![0u8; 20];
        ip[0] = 0x45;
        ip[9] = PROTO_UDP;
        ip[12..16].copy_from_slice(&[10, 0, 0, 1]);
        ip[16..20].copy_from_slice(&[8, 8, 8, 8]);
        buf.extend_from_slice(&ip);

        let mut udp = vec![0u8; 8];
        udp[0..2].copy_from_slice(&53000u16.to_be_bytes());
        udp[2..4].copy_from_slice(&53u16.to_be_bytes());
        buf.extend_from_slice(&udp);
        buf.extend_from_slice(b"dns-query");

        let pkt = parse_frame(0, 0, &buf);
        let udp = match pkt.transport.unwrap() {
            TransportInfo::Udp(u) => u,
            TransportInfo::Tcp(_) => panic!("expected udp"),
        };
        assert_eq!(udp.dst_port, 53);
        assert_eq!(pkt.payload, b"dns-query");
    }
}
