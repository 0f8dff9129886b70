use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, BodyStream, Full};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use multer::Multipart;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::api::types::{
    HealthResponse, IngestRequest, IngestResponse, RuleMembers, RuleMembership, RuleMessage,
};
use crate::dispatch::{DefaultRuleEngine, Dispatcher, PacketSubmission, SubmitOutcome, Verdict};
use crate::flow::{AppType, FlowKey, Protocol};
use crate::offline::PcapPipeline;
use crate::rules::{InMemoryRuleStore, RuleEngine, RuleSet, RuleStore};
use crate::stats;
use crate::telemetry::Metrics;

type RespBody = BoxBody<Bytes, hyper::Error>;

/// Shared state handed to every admin-surface request (spec.md §6).
/// Generic over the rule store backing `rule_engine`/`pcap_pipeline` so
/// tests can wire up a store that fails on demand (spec.md §7
/// `RuleStoreUnavailable`); the live dispatcher itself stays on the one
/// in-memory store actually shipped (DESIGN.md).
pub struct AdminState<S: RuleStore = InMemoryRuleStore> {
    pub dispatcher: Arc<Dispatcher>,
    rule_engine: Arc<RuleEngine<S>>,
    pub pcap_pipeline: Arc<PcapPipeline<S>>,
    pub metrics: Option<Arc<Metrics>>,
    pub ingest_deadline: Duration,
}

impl<S: RuleStore> Clone for AdminState<S> {
    fn clone(&self) -> Self {
        Self {
            dispatcher: self.dispatcher.clone(),
            rule_engine: self.rule_engine.clone(),
            pcap_pipeline: self.pcap_pipeline.clone(),
            metrics: self.metrics.clone(),
            ingest_deadline: self.ingest_deadline,
        }
    }
}

impl AdminState<InMemoryRuleStore> {
    pub fn new(dispatcher: Arc<Dispatcher>, metrics: Option<Arc<Metrics>>) -> Self {
        let rule_engine: Arc<DefaultRuleEngine> = dispatcher.rule_engine().clone();
        Self::with_rule_engine(dispatcher, rule_engine, metrics)
    }
}

impl<S: RuleStore> AdminState<S> {
    /// Builds admin state around a `rule_engine` distinct from the
    /// dispatcher's own, so the `/rules` and `/health` endpoints can be
    /// exercised against a store the live dispatcher never sees — used by
    /// tests exercising `RuleStoreUnavailable`.
    pub fn with_rule_engine(
        dispatcher: Arc<Dispatcher>,
        rule_engine: Arc<RuleEngine<S>>,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            dispatcher,
            pcap_pipeline: Arc::new(PcapPipeline::new(rule_engine.clone())),
            rule_engine,
            metrics,
            ingest_deadline: Duration::from_secs(1),
        }
    }

    fn rule_engine(&self) -> &Arc<RuleEngine<S>> {
        &self.rule_engine
    }
}

/// Serves the admin HTTP surface (`/ingest`, `/analyze`, `/stats`,
/// `/stats/connections`, `/rules/{ip,domain,app}[/{value}]`, `/health`) on
/// `addr`, exactly in the teacher's bare `hyper::service::service_fn` +
/// manual path match style (no web framework) — see `telemetry/metrics.rs`
/// for the same pattern applied to `/metrics`.
pub async fn start_admin_server<S: RuleStore + 'static>(
    addr: SocketAddr,
    state: AdminState<S>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    info!(?addr, "admin HTTP surface started");

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| std::io::Error::other(format!("failed to set up SIGTERM handler: {e}")))?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| std::io::Error::other(format!("failed to set up SIGINT handler: {e}")))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("admin surface: received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("admin surface: received SIGINT, shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "admin surface: accept error");
                        continue;
                    }
                };

                let state = state.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let state = state.clone();
                        async move { Ok::<_, hyper::Error>(route(state, req).await) }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "admin surface: serve_connection error");
                    }
                });
            }
        }
    }

    info!("admin surface stopped");
    Ok(())
}

async fn route<S: RuleStore>(state: AdminState<S>, req: Request<Incoming>) -> Response<RespBody> {
    if let Some(metrics) = &state.metrics {
        metrics.admin_requests_total.add(1, &[]);
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    match (&method, segments.as_slice()) {
        (&Method::POST, ["ingest"]) => handle_ingest(&state, req).await,
        (&Method::POST, ["analyze"]) => handle_analyze(&state, req).await,
        (&Method::GET, ["stats"]) => handle_stats(&state),
        (&Method::GET, ["stats", "connections"]) => handle_stats_connections(&state),
        (&Method::GET, ["rules", kind]) => handle_rules_list(&state, kind).await,
        (&Method::GET, ["rules", kind, value]) => handle_rules_get(&state, kind, value).await,
        (&Method::POST, ["rules", kind, value]) => handle_rules_add(&state, kind, value).await,
        (&Method::DELETE, ["rules", kind, value]) => handle_rules_remove(&state, kind, value).await,
        (&Method::GET, ["health"]) => handle_health(&state).await,
        _ => json_response(StatusCode::NOT_FOUND, json!({"error": "not found"})),
    }
}

async fn handle_ingest<S: RuleStore>(state: &AdminState<S>, req: Request<Incoming>) -> Response<RespBody> {
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    };

    let parsed: IngestRequest = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(e) => return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    };

    let src_ip = match parsed.tuple.src_ip.parse() {
        Ok(ip) => ip,
        Err(_) => {
            return json_response(StatusCode::BAD_REQUEST, json!({"error": "invalid src_ip"}))
        }
    };
    let dst_ip = match parsed.tuple.dst_ip.parse() {
        Ok(ip) => ip,
        Err(_) => {
            return json_response(StatusCode::BAD_REQUEST, json!({"error": "invalid dst_ip"}))
        }
    };

    let key = FlowKey::new(
        src_ip,
        dst_ip,
        parsed.tuple.src_port,
        parsed.tuple.dst_port,
        Protocol::parse(&parsed.tuple.protocol),
    );

    let submission = PacketSubmission {
        key,
        size: parsed.size,
        outbound: parsed.outbound,
        tcp_flags: parsed.tcp_flags,
        payload_length: parsed.payload_length,
        domain: parsed.domain,
        app_type: parsed.app_type.as_deref().map(AppType::parse),
        reply: None,
    };

    match state.dispatcher.submit_and_await(submission, Some(state.ingest_deadline)).await {
        Ok(Verdict::Allow) => {
            json_response(StatusCode::OK, json!(IngestResponse { status: "forwarded" }))
        }
        Ok(Verdict::Drop) => {
            json_response(StatusCode::OK, json!(IngestResponse { status: "dropped" }))
        }
        Err(SubmitOutcome::ShuttingDown) => {
            json_response(StatusCode::SERVICE_UNAVAILABLE, json!({"error": "shutting down"}))
        }
        Err(_) => json_response(StatusCode::SERVICE_UNAVAILABLE, json!({"error": "busy"})),
    }
}

async fn handle_analyze<S: RuleStore>(state: &AdminState<S>, req: Request<Incoming>) -> Response<RespBody> {
    let content_type =
        req.headers().get(hyper::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    let boundary = match multer::parse_boundary(content_type) {
        Ok(b) => b,
        Err(_) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({"error": "expected multipart/form-data with a boundary"}),
            )
        }
    };

    let body_stream = BodyStream::new(req.into_body()).filter_map(|frame| async move {
        match frame {
            Ok(f) => f.into_data().ok().map(Ok),
            Err(e) => Some(Err(e)),
        }
    });
    let mut multipart = Multipart::new(body_stream, boundary);

    let mut pcap_bytes: Option<Bytes> = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()}))
            }
        };
        if pcap_bytes.is_none() {
            pcap_bytes = match field.bytes().await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    return json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()}))
                }
            };
        }
    }

    let Some(bytes) = pcap_bytes else {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "multipart body carried no file field"}),
        );
    };

    match state.pcap_pipeline.analyze_reader(std::io::Cursor::new(bytes.to_vec())).await {
        Ok(report) => json_response(StatusCode::OK, serde_json::to_value(report).unwrap_or_default()),
        Err(e) => json_response(StatusCode::BAD_REQUEST, json!({"error": e.to_string()})),
    }
}

fn handle_stats<S: RuleStore>(state: &AdminState<S>) -> Response<RespBody> {
    let snapshot = stats::snapshot(&state.dispatcher, state.rule_engine());
    json_response(StatusCode::OK, serde_json::to_value(snapshot).unwrap_or_default())
}

fn handle_stats_connections<S: RuleStore>(state: &AdminState<S>) -> Response<RespBody> {
    let flows = state.dispatcher.all_flows();
    json_response(StatusCode::OK, json!({"connections": flows}))
}

async fn handle_rules_list<S: RuleStore>(state: &AdminState<S>, kind: &str) -> Response<RespBody> {
    let Some(set) = parse_rule_set(kind) else {
        return json_response(StatusCode::NOT_FOUND, json!({"error": "unknown rule set"}));
    };
    match state.rule_engine().store().members(set).await {
        Ok(members) => json_response(StatusCode::OK, serde_json::to_value(RuleMembers { members }).unwrap_or_default()),
        Err(e) => json_response(StatusCode::SERVICE_UNAVAILABLE, json!({"error": e.to_string()})),
    }
}

async fn handle_rules_get<S: RuleStore>(
    state: &AdminState<S>,
    kind: &str,
    value: &str,
) -> Response<RespBody> {
    let Some(set) = parse_rule_set(kind) else {
        return json_response(StatusCode::NOT_FOUND, json!({"error": "unknown rule set"}));
    };
    match state.rule_engine().store().contains(set, value).await {
        Ok(blocked) => json_response(
            StatusCode::OK,
            serde_json::to_value(RuleMembership { member: value.to_string(), blocked }).unwrap_or_default(),
        ),
        Err(e) => json_response(StatusCode::SERVICE_UNAVAILABLE, json!({"error": e.to_string()})),
    }
}

async fn handle_rules_add<S: RuleStore>(
    state: &AdminState<S>,
    kind: &str,
    value: &str,
) -> Response<RespBody> {
    let Some(set) = parse_rule_set(kind) else {
        return json_response(StatusCode::NOT_FOUND, json!({"error": "unknown rule set"}));
    };
    match state.rule_engine().store().add(set, value.to_string()).await {
        Ok(()) => json_response(
            StatusCode::OK,
            serde_json::to_value(RuleMessage { message: format!("added {value} to {kind}") }).unwrap_or_default(),
        ),
        Err(e) => json_response(StatusCode::SERVICE_UNAVAILABLE, json!({"error": e.to_string()})),
    }
}

async fn handle_rules_remove<S: RuleStore>(
    state: &AdminState<S>,
    kind: &str,
    value: &str,
) -> Response<RespBody> {
    let Some(set) = parse_rule_set(kind) else {
        return json_response(StatusCode::NOT_FOUND, json!({"error": "unknown rule set"}));
    };
    match state.rule_engine().store().remove(set, value).await {
        Ok(()) => json_response(
            StatusCode::OK,
            serde_json::to_value(RuleMessage { message: format!("removed {value} from {kind}") }).unwrap_or_default(),
        ),
        Err(e) => json_response(StatusCode::SERVICE_UNAVAILABLE, json!({"error": e.to_string()})),
    }
}

async fn handle_health<S: RuleStore>(state: &AdminState<S>) -> Response<RespBody> {
    let unavailable = state.rule_engine().rule_store_unavailable_total();
    let status = if unavailable == 0 { "healthy" } else { "degraded" };
    json_response(
        StatusCode::OK,
        serde_json::to_value(HealthResponse { status, rule_store_unavailable_total: unavailable })
            .unwrap_or_default(),
    )
}

/// Only `ip`/`domain`/`app` are exposed over HTTP (spec.md §6's table);
/// `RuleSet::Port` exists for the rule engine's internal precedence check
/// but has no admin endpoint of its own.
fn parse_rule_set(kind: &str) -> Option<RuleSet> {
    match kind {
        "ip" => Some(RuleSet::Ip),
        "domain" => Some(RuleSet::Domain),
        "app" => Some(RuleSet::App),
        _ => None,
    }
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<RespBody> {
    let bytes = serde_json::to_vec(&body).unwrap_or_default();
    let boxed = Full::new(Bytes::from(bytes)).map_err(|never| match never {}).boxed();
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(boxed)
        .unwrap_or_else(|_| {
            let mut resp = Response::new(
                Full::new(Bytes::from_static(b"internal error")).map_err(|never| match never {}).boxed(),
            );
            *resp.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            resp
        })
}
