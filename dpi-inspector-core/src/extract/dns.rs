/// Extract the QNAME of the first question in a DNS query (spec.md §4.3).
/// Only forward label lengths are supported — pointer compression (length
/// bytes `> 63`) is not valid in a client query and aborts with "no
/// match".
pub fn extract_dns_query(payload: &[u8]) -> Option<String> {
    if payload.len() < 12 {
        return None;
    }

    let flags = payload[2];
    if flags & 0x80 != 0 {
        return None; // response, not a query
    }

    let qdcount = u16::from_be_bytes([payload[4], payload[5]]);
    if qdcount == 0 {
        return None;
    }

    let mut offset = 12usize;
    let mut labels = Vec::new();

    loop {
        let label_len = *payload.get(offset)? as usize;
        if label_len == 0 {
            break;
        }
        if label_len > 63 {
            return None;
        }
        offset += 1;
        let end = offset.checked_add(label_len)?;
        let label = payload.get(offset..end)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        offset = end;
    }

    if labels.is_empty() {
        return None;
    }

    Some(labels.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dns_query(qname: &str) -> Vec<u8> {
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

    #[test]
    fn extracts_qname() {
        let pkt = dns_query("api.twitter.com");
        assert_eq!(extract_dns_query(&pkt), Some("api.twitter.com".to_string()));
    }

    #[test]
    fn rejects_response_packets() {
        let mut pkt = dns_query("example.com");
        pkt[2] |= 0x80;
        assert_eq!(extract_dns_query(&pkt), None);
    }

    #[test]
    fn rejects_zero_questions() {
        let mut pkt = dns_query("example.com");
        pkt[4] = 0;
        pkt[5] = 0;
        assert_eq!(extract_dns_query(&pkt), None);
    }

    #[test]
    fn rejects_label_longer_than_63() {
        let mut pkt = vec![0u8; 12];
        pkt[4..6].copy_from_slice(&1u16.to_be_bytes());
        pkt.push(200);
        assert_eq!(extract_dns_query(&pkt), None);
    }

    #[test]
    fn too_short_payload_is_no_match() {
        assert_eq!(extract_dns_query(&[0u8; 5]), None);
    }
}
