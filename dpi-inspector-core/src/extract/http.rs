const METHOD_PREFIXES: &[&[u8]] =
    &[b"GET ", b"POST", b"PUT ", b"HEAD", b"DELE", b"PATC", b"OPTI"];

/// Extract the `Host:` header value from an HTTP/1.x request (spec.md
/// §4.3). Lenient: non-ASCII bytes are decoded with lossy UTF-8 rather
/// than rejected.
pub fn extract_http_host(payload: &[u8]) -> Option<String> {
    if payload.len() < 4 {
        return None;
    }
    if !METHOD_PREFIXES.iter().any(|m| payload.starts_with(m)) {
        return None;
    }

    let text = String::from_utf8_lossy(payload);
    for line in text.split("\r\n") {
        let bytes = line.as_bytes();
        if bytes.len() >= 5 && bytes[..5].eq_ignore_ascii_case(b"host:") {
            let value = line[5..].trim();
            let host = match value.rfind(':') {
                Some(idx) => &value[..idx],
                None => value,
            };
            if host.is_empty() {
                return None;
            }
            return Some(host.to_string());
        }
    }
    None
}
