use serde::{Deserialize, Serialize};

/// Wire form of a five-tuple in an `/ingest` request body (spec.md §6).
#[derive(Debug, Deserialize)]
pub struct TupleWire {
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub protocol: String,
}

/// The JSON body accepted by `POST /ingest` (spec.md §6: "packet JSON
/// (tuple, size, outbound, tcp_flags, payload_length, domain,
/// app_type)").
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub tuple: TupleWire,
    pub size: u64,
    pub outbound: bool,
    #[serde(default)]
    pub tcp_flags: Option<u8>,
    #[serde(default)]
    pub payload_length: u64,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub app_type: Option<String>,
}

/// `POST /ingest`'s response body: `{status: "forwarded"|"dropped"}`
/// (spec.md §6).
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
}

/// Response body for `POST`/`DELETE /rules/{set}/{value}`.
#[derive(Debug, Serialize)]
pub struct RuleMessage {
    pub message: String,
}

/// Response body for `GET /rules/{set}` (no value): the full member set.
#[derive(Debug, Serialize)]
pub struct RuleMembers {
    pub members: Vec<String>,
}

/// Response body for `GET /rules/{set}/{value}`: whether that one member
/// is present.
#[derive(Debug, Serialize)]
pub struct RuleMembership {
    pub member: String,
    pub blocked: bool,
}

/// `GET /health`'s response body. `degraded` per spec.md §7's
/// `RuleStoreUnavailable` handling: "fail-open for availability, and
/// separately surface a health degradation".
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rule_store_unavailable_total: u64,
}
