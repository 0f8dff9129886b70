mod dns;
mod http;
mod quic;
mod tls;

pub use dns::extract_dns_query;
pub use http::extract_http_host;
pub use quic::extract_quic_sni;
pub use tls::extract_tls_sni;

/// Which extractor to try for a given packet, chosen by port/protocol hint
/// per §4.7 step 5. Not every combination maps to an extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorHint {
    TlsSni,
    HttpHost,
    DnsQuery,
    QuicSni,
}

/// Run the hinted extractor against a payload. Returns `None` on any
/// boundary violation or absence of the expected identifier — this is
/// "no match", not an error.
pub fn extract(hint: ExtractorHint, payload: &[u8]) -> Option<String> {
    match hint {
        ExtractorHint::TlsSni => extract_tls_sni(payload),
        ExtractorHint::HttpHost => extract_http_host(payload),
        ExtractorHint::DnsQuery => extract_dns_query(payload),
        ExtractorHint::QuicSni => extract_quic_sni(payload),
    }
}
