/// Extract the SNI hostname from a TLS ClientHello, per RFC 5246/8446.
///
/// Every multi-byte read is a checked slice; any boundary violation
/// returns `None` ("no match") rather than panicking or producing a
/// partial hostname.
pub fn extract_tls_sni(payload: &[u8]) -> Option<String> {
    if payload.len() < 9 {
        return None;
    }
    if payload[0] != 0x16 {
        return None;
    }

    let version = u16::from_be_bytes([payload[1], payload[2]]);
    if !(0x0300..=0x0304).contains(&version) {
        return None;
    }

    let record_length = u16::from_be_bytes([payload[3], payload[4]]) as usize;
    if record_length > payload.len().saturating_sub(5) {
        return None;
    }

    if payload[5] != 0x01 {
        return None;
    }

    let mut offset: usize = 5;
    offset = offset.checked_add(4)?; // handshake header (type + 24-bit length)
    offset = offset.checked_add(2)?; // client version
    offset = offset.checked_add(32)?; // random

    if offset >= payload.len() {
        return None;
    }
    let session_id_len = payload[offset] as usize;
    offset = offset.checked_add(1)?.checked_add(session_id_len)?;

    if offset.checked_add(2)? > payload.len() {
        return None;
    }
    let cipher_len = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
    offset = offset.checked_add(2)?.checked_add(cipher_len)?;

    if offset >= payload.len() {
        return None;
    }
    let comp_len = payload[offset] as usize;
    offset = offset.checked_add(1)?.checked_add(comp_len)?;

    if offset.checked_add(2)? > payload.len() {
        return None;
    }
    let ext_len = u16::from_be_bytes([payload[offset], payload[offset + 1]]) as usize;
    offset = offset.checked_add(2)?;

    let end = (offset.checked_add(ext_len)?).min(payload.len());

    while offset.checked_add(4)? <= end {
        let ext_type = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
        let ext_length = u16::from_be_bytes([payload[offset + 2], payload[offset + 3]]) as usize;
        offset += 4;

        if offset.checked_add(ext_length)? > end {
            break;
        }

        if ext_type == 0x0000 {
            if ext_length < 5 {
                break;
            }
            let sni_type = payload[offset + 2];
            let sni_len = u16::from_be_bytes([payload[offset + 3], payload[offset + 4]]) as usize;
            if sni_type != 0x00 {
                break;
            }
            let start = offset + 5;
            let stop = start.checked_add(sni_len)?;
            if stop > payload.len() {
                return None;
            }
            return Some(String::from_utf8_lossy(&payload[start..stop]).into_owned());
        }

        offset += ext_length;
    }

    None
}
