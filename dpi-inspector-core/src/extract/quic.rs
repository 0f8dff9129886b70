use crate::extract::tls::extract_tls_sni;

/// Heuristic QUIC Initial SNI extraction (spec.md §4.3). Real QUIC
/// requires removing header protection and reassembling CRYPTO frames;
/// this instead scans for a byte equal to the TLS ClientHello handshake
/// type (`0x01`) and retries the TLS SNI extractor five bytes earlier,
/// taking the first extraction that succeeds. Documented false negative:
/// any Initial packet whose protected bytes happen not to expose a lone
/// `0x01` at the right offset is missed entirely — this is a deliberate
/// approximation, not a full QUIC parser.
pub fn extract_quic_sni(payload: &[u8]) -> Option<String> {
    if payload.len() < 5 {
        return None;
    }
    if payload[0] & 0x80 == 0 {
        return None; // not a long header
    }

    for i in 5..payload.len() {
        if payload[i] == 0x01 {
            if let Some(sni) = extract_tls_sni(&payload[i - 5..]) {
                return Some(sni);
            }
        }
    }
    None
}
