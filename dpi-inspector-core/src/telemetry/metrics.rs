use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Meter, UpDownCounter};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::telemetry::handle_metrics;

/// Process-wide counters exported in Prometheus text format on
/// `telemetry.metrics_port` (spec.md §6 "(added) `/metrics`"). Field names
/// mirror the engine's own internal statistics (`stats::EngineStats`,
/// `rules::RuleEngine::rule_store_unavailable_total`) so the two surfaces
/// never drift apart.
#[derive(Clone)]
pub struct Metrics {
    pub packets_processed_total: Counter<u64>,
    pub packets_forwarded_total: Counter<u64>,
    pub packets_dropped_total: Counter<u64>,
    pub flows_active: UpDownCounter<i64>,
    pub flows_classified_total: Counter<u64>,
    pub flows_blocked_total: Counter<u64>,
    pub rule_store_unavailable_total: Counter<u64>,
    pub admin_requests_total: Counter<u64>,
    pub errors_total: Counter<u64>,
}

impl Metrics {
    fn new(meter: Meter) -> Self {
        Self {
            packets_processed_total: meter
                .u64_counter("dpi_packets_processed_total")
                .with_description("Total number of packets processed by any worker")
                .build(),
            packets_forwarded_total: meter
                .u64_counter("dpi_packets_forwarded_total")
                .with_description("Total number of packets allowed through")
                .build(),
            packets_dropped_total: meter
                .u64_counter("dpi_packets_dropped_total")
                .with_description("Total number of packets dropped by the rule engine")
                .build(),
            flows_active: meter
                .i64_up_down_counter("dpi_flows_active")
                .with_description("Number of flows currently tracked across all worker shards")
                .build(),
            flows_classified_total: meter
                .u64_counter("dpi_flows_classified_total")
                .with_description("Total number of flows that reached the CLASSIFIED state")
                .build(),
            flows_blocked_total: meter
                .u64_counter("dpi_flows_blocked_total")
                .with_description("Total number of flows that reached the BLOCKED state")
                .build(),
            rule_store_unavailable_total: meter
                .u64_counter("dpi_rule_store_unavailable_total")
                .with_description("Total number of rule evaluations that fail-opened because the rule store was unavailable")
                .build(),
            admin_requests_total: meter
                .u64_counter("dpi_admin_requests_total")
                .with_description("Total number of requests served by the admin HTTP surface")
                .build(),
            errors_total: meter
                .u64_counter("dpi_errors_total")
                .with_description("Total number of fatal errors (malformed capture, config, io)")
                .build(),
        }
    }
}

pub fn init_metrics() -> Result<(Arc<Metrics>, Registry), Box<dyn std::error::Error + Send + Sync>>
{
    let registry = Registry::default();

    let exporter = opentelemetry_prometheus::exporter()
        .with_registry(registry.clone())
        .build()?;

    let meter_provider = SdkMeterProvider::builder().with_reader(exporter).build();

    global::set_meter_provider(meter_provider);

    let meter = global::meter("dpi-inspector");
    let metrics = Arc::new(Metrics::new(meter));

    Ok((metrics, registry))
}

/// Serves `/metrics` in Prometheus text format on its own port, separate
/// from the admin HTTP surface (`api::server`), matching the teacher's
/// split between a dedicated observability listener and its proxy-facing
/// one.
pub async fn start_metrics_server(
    port: u16,
    registry: Registry,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let registry = Arc::new(registry);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(?addr, "metrics server started on dedicated port");

    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
        .map_err(|e| std::io::Error::other(format!("failed to set up SIGTERM handler: {e}")))?;
    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .map_err(|e| std::io::Error::other(format!("failed to set up SIGINT handler: {e}")))?;

    loop {
        tokio::select! {
            _ = sigterm.recv() => {
                info!("metrics server: received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("metrics server: received SIGINT, shutting down");
                break;
            }
            result = listener.accept() => {
                let (stream, peer) = match result {
                    Ok((stream, peer)) => (stream, peer),
                    Err(e) => {
                        warn!(error = %e, "metrics server: accept error");
                        continue;
                    }
                };

                let registry = registry.clone();
                tokio::spawn(async move {
                    let svc = hyper::service::service_fn(move |req: Request<Incoming>| {
                        let registry = registry.clone();
                        async move {
                            if req.uri().path() == "/metrics" {
                                match handle_metrics(&registry) {
                                    Ok(resp) => Ok::<_, hyper::Error>(resp),
                                    Err(_) => {
                                        let body = Full::new(Bytes::from("internal server error"))
                                            .map_err(|never| match never {})
                                            .boxed();
                                        let mut resp = hyper::Response::new(body);
                                        *resp.status_mut() = hyper::StatusCode::INTERNAL_SERVER_ERROR;
                                        Ok(resp)
                                    }
                                }
                            } else {
                                let body = Full::new(Bytes::from("not found"))
                                    .map_err(|never| match never {})
                                    .boxed();
                                let mut resp = hyper::Response::new(body);
                                *resp.status_mut() = hyper::StatusCode::NOT_FOUND;
                                Ok(resp)
                            }
                        }
                    });

                    let builder = ConnBuilder::new(TokioExecutor::new());
                    if let Err(e) = builder.serve_connection(TokioIo::new(stream), svc).await {
                        warn!(?peer, error = %e, "metrics server: serve_connection error");
                    }
                });
            }
        }
    }

    info!("metrics server stopped");
    Ok(())
}
