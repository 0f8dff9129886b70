//! Synthetic capture-file byte builders, grounded on
//! `examples/original_source/app/utils/pcap_generator.py` for the byte
//! layouts they must produce: the classic-pcap global header, Ethernet +
//! IPv4 + TCP/UDP headers, a TLS ClientHello carrying an SNI, a DNS
//! query, and an HTTP/1.1 request line. Used by this crate's own unit
//! tests and by the offline-pipeline / admin-API integration tests.

const MAGIC_NATIVE: u32 = 0xA1B2_C3D4;

const ETHERTYPE_IPV4: u16 = 0x0800;
const PROTO_TCP: u8 = 6;
const PROTO_UDP: u8 = 17;

pub const TCP_FLAG_SYN: u8 = 0x02;
pub const TCP_FLAG_PSH_ACK: u8 = 0x18;

/// Wraps one or more already-built Ethernet frames into a complete
/// classic-pcap byte stream: a native-endian 24-byte global header
/// followed by one 16-byte record header + payload per frame.
pub fn wrap_capture(frames: &[Vec<u8>]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&MAGIC_NATIVE.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes()); // version_major
    bytes.extend_from_slice(&4u16.to_le_bytes()); // version_minor
    bytes.extend_from_slice(&0i32.to_le_bytes()); // thiszone
    bytes.extend_from_slice(&0u32.to_le_bytes()); // sigfigs
    bytes.extend_from_slice(&65535u32.to_le_bytes()); // snaplen
    bytes.extend_from_slice(&1u32.to_le_bytes()); // network = ethernet

    for (i, frame) in frames.iter().enumerate() {
        bytes.extend_from_slice(&(i as u32).to_le_bytes()); // ts_sec
        bytes.extend_from_slice(&0u32.to_le_bytes()); // ts_usec
        bytes.extend_from_slice(&(frame.len() as u32).to_le_bytes()); // incl_len
        bytes.extend_from_slice(&(frame.len() as u32).to_le_bytes()); // orig_len
        bytes.extend_from_slice(frame);
    }
    bytes
}

/// Builds a single Ethernet + IPv4 + TCP frame carrying `payload`.
pub fn eth_ipv4_tcp_frame(
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    src_port: u16,
    dst_port: u16,
    tcp_flags: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0xAA; 6]); // dst mac
    frame.extend_from_slice(&[0xBB; 6]); // src mac
    frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

    let total_len = 20 + 20 + payload.len();
    let mut ip = vec![0u8; 20];
    ip[0] = 0x45;
    ip[2] = (total_len >> 8) as u8;
    ip[3] = total_len as u8;
    ip[8] = 64; // ttl
    ip[9] = PROTO_TCP;
    ip[12..16].copy_from_slice(&src_ip);
    ip[16..20].copy_from_slice(&dst_ip);
    frame.extend_from_slice(&ip);

    let mut tcp = vec![0u8; 20];
    tcp[0..2].copy_from_slice(&src_port.to_be_bytes());
    tcp[2..4].copy_from_slice(&dst_port.to_be_bytes());
    tcp[12] = 5 << 4; // data offset = 20 bytes, no options
    tcp[13] = tcp_flags;
    frame.extend_from_slice(&tcp);
    frame.extend_from_slice(payload);
    frame
}

/// Builds a single Ethernet + IPv4 + UDP frame carrying `payload`.
pub fn eth_ipv4_udp_frame(
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0xAA; 6]);
    frame.extend_from_slice(&[0xBB; 6]);
    frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

    let total_len = 20 + 8 + payload.len();
    let mut ip = vec![0u8; 20];
    ip[0] = 0x45;
    ip[2] = (total_len >> 8) as u8;
    ip[3] = total_len as u8;
    ip[8] = 64;
    ip[9] = PROTO_UDP;
    ip[12..16].copy_from_slice(&src_ip);
    ip[16..20].copy_from_slice(&dst_ip);
    frame.extend_from_slice(&ip);

    let mut udp = vec![0u8; 8];
    udp[0..2].copy_from_slice(&src_port.to_be_bytes());
    udp[2..4].copy_from_slice(&dst_port.to_be_bytes());
    let udp_len = (8 + payload.len()) as u16;
    udp[4..6].copy_from_slice(&udp_len.to_be_bytes());
    frame.extend_from_slice(&udp);
    frame.extend_from_slice(payload);
    frame
}

/// Builds the payload bytes of a minimal TLS ClientHello record carrying
/// `sni` in its `server_name` extension (RFC 6066 §3).
pub fn tls_client_hello_payload(sni: &str) -> Vec<u8> {
    let mut ext_sni = Vec::new();
    ext_sni.extend_from_slice(&(3 + sni.len() as u16).to_be_bytes()); // server_name_list len
    ext_sni.push(0x00); // host_name
    ext_sni.extend_from_slice(&(sni.len() as u16).to_be_bytes());
    ext_sni.extend_from_slice(sni.as_bytes());

    let mut ext = Vec::new();
    ext.extend_from_slice(&0x0000u16.to_be_bytes()); // server_name extension type
    ext.extend_from_slice(&(ext_sni.len() as u16).to_be_bytes());
    ext.extend_from_slice(&ext_sni);

    let mut body = Vec::new();
    body.extend_from_slice(&0x0303u16.to_be_bytes()); // client version (TLS 1.2)
    body.extend_from_slice(&[0u8; 32]); // random
    body.push(0); // session id len
    body.extend_from_slice(&0x0002u16.to_be_bytes()); // cipher suites len
    body.extend_from_slice(&[0x13, 0x01]);
    body.push(0); // compression methods len
    body.extend_from_slice(&(ext.len() as u16).to_be_bytes());
    body.extend_from_slice(&ext);

    let mut handshake = Vec::new();
    handshake.push(0x01); // ClientHello
    let len = body.len() as u32;
    handshake.extend_from_slice(&len.to_be_bytes()[1..4]);
    handshake.extend_from_slice(&body);

    let mut record = Vec::new();
    record.push(0x16);
    record.extend_from_slice(&0x0301u16.to_be_bytes());
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

/// Builds the payload bytes of a minimal DNS query for `qname`, a single
/// question of type A / class IN.
pub fn dns_query_payload(qname: &str) -> Vec<u8> {
    let mut buf = vec![0u8; 12];
    buf[4..6].copy_from_slice(&1u16.to_be_bytes()); // QDCOUNT = 1
    for label in qname.split('.') {
        buf.push(label.len() as u8);
        buf.extend_from_slice(label.as_bytes());
    }
    buf.push(0); // root label
    buf.extend_from_slice(&1u16.to_be_bytes()); // QTYPE A
    buf.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN
    buf
}

/// Builds the payload bytes of a minimal HTTP/1.1 GET request for `host`.
pub fn http_get_payload(host: &str) -> Vec<u8> {
    format!("GET / HTTP/1.1\r\nHost: {host}\r\n\r\n").into_bytes()
}

/// A one-packet capture: Ethernet/IPv4/TCP (src `192.168.1.100` → dst
/// `142.250.185.206`, src port 55000, dst port 443) carrying a TLS
/// ClientHello with the given SNI (spec.md §8 scenario S1).
pub fn capture_with_tls_client_hello(sni: &str) -> Vec<u8> {
    let frame = eth_ipv4_tcp_frame(
        [192, 168, 1, 100],
        [142, 250, 185, 206],
        55000,
        443,
        TCP_FLAG_PSH_ACK,
        &tls_client_hello_payload(sni),
    );
    wrap_capture(&[frame])
}

/// Same as [`capture_with_tls_client_hello`] but with a caller-chosen
/// source IP, for IP-blocking scenarios (spec.md §8 scenario S4).
pub fn capture_with_tls_client_hello_from(src_ip: [u8; 4], sni: &str) -> Vec<u8> {
    let frame = eth_ipv4_tcp_frame(
        src_ip,
        [142, 250, 185, 206],
        55000,
        443,
        TCP_FLAG_PSH_ACK,
        &tls_client_hello_payload(sni),
    );
    wrap_capture(&[frame])
}

/// A one-packet capture: Ethernet/IPv4/TCP dst port 80 carrying an HTTP
/// GET request with the given `Host:` header (spec.md §8 scenario S2).
pub fn http_get_packet(host: &str) -> Vec<u8> {
    let frame = eth_ipv4_tcp_frame(
        [192, 168, 1, 100],
        [93, 184, 216, 34],
        54000,
        80,
        TCP_FLAG_PSH_ACK,
        &http_get_payload(host),
    );
    wrap_capture(&[frame])
}

/// A one-packet capture: Ethernet/IPv4/UDP dst port 53 carrying a DNS
/// query for `qname` (spec.md §8 scenario S3).
pub fn dns_query_packet(qname: &str) -> Vec<u8> {
    let frame =
        eth_ipv4_udp_frame([10, 0, 0, 5], [8, 8, 8, 8], 53000, 53, &dns_query_payload(qname));
    wrap_capture(&[frame])
}

/// A capture of `count` distinct five-tuples (distinguished by source
/// port), each a bare TCP SYN with no payload — used to drive flow-table
/// capacity-eviction scenarios (spec.md §8 scenario S6) end to end
/// through the offline pipeline.
pub fn capture_with_distinct_flows(count: u16) -> Vec<u8> {
    let frames: Vec<Vec<u8>> = (0..count)
        .map(|i| {
            eth_ipv4_tcp_frame(
                [10, 0, 0, 1],
                [10, 0, 0, 2],
                50000 + i,
                443,
                TCP_FLAG_SYN,
                &[],
            )
        })
        .collect();
    wrap_capture(&frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureReader;

    #[test]
    fn wrapped_capture_round_trips_through_the_reader() {
        let bytes = capture_with_tls_client_hello("www.google.com");
        let reader = CaptureReader::new(std::io::Cursor::new(bytes)).unwrap();
        let packets: Vec<_> = reader.collect();
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn distinct_flows_capture_has_requested_packet_count() {
        let bytes = capture_with_distinct_flows(5);
        let reader = CaptureReader::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(reader.count(), 5);
    }
}
