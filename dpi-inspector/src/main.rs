#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use dpi_inspector_core::api::{start_admin_server, AdminState};
use dpi_inspector_core::config::load_from_path;
use dpi_inspector_core::dispatch::Dispatcher;
use dpi_inspector_core::offline::PcapPipeline;
use dpi_inspector_core::rules::{InMemoryRuleStore, RuleEngine, RuleSet, RuleStore};
use dpi_inspector_core::telemetry::{init_metrics, init_tracing_with_otel, start_metrics_server};

#[derive(Parser, Debug)]
#[command(author, version, about = "Deep packet inspection engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the dispatcher, worker pipelines, and admin HTTP surface.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(short, long, value_name = "FILE", default_value = "config/default.toml")]
        config: PathBuf,
    },
    /// Analyze a single `.pcap` file sequentially and print the report as JSON.
    Analyze {
        /// Path to the capture file.
        #[arg(value_name = "PCAP")]
        file: PathBuf,
        /// IPs to pre-load into the block list before analysis (repeatable).
        #[arg(long = "block-ip", value_name = "IP")]
        block_ips: Vec<String>,
        /// Domains to pre-load into the block list before analysis (repeatable).
        #[arg(long = "block-domain", value_name = "DOMAIN")]
        block_domains: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config } => serve(config).await,
        Command::Analyze { file, block_ips, block_domains } => {
            analyze(file, block_ips, block_domains).await
        }
    }
}

async fn serve(config_path: PathBuf) {
    let cfg = match load_from_path(&config_path) {
        Ok(cfg) => cfg,
        Err(err) => {
            // Tracing isn't initialized yet — the config itself carries the
            // log level — so this one failure path prints to stderr directly.
            eprintln!("failed to load configuration: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = init_tracing_with_otel(
        cfg.logging.level.clone(),
        cfg.logging.show_target,
        cfg.telemetry.otel_log_level.clone(),
    ) {
        eprintln!("failed to initialize tracing: {err}");
        std::process::exit(1);
    }

    info!(listen = %cfg.listen, workers = cfg.runtime.workers, "configuration loaded");
    if !cfg.rule_store.is_in_memory() {
        info!(
            url = %cfg.rule_store.resolved_url(),
            "external rule-store URL configured but not wired up; using the in-memory store"
        );
    }

    let rule_engine = Arc::new(RuleEngine::new(InMemoryRuleStore::new()));
    let dispatcher = Dispatcher::start(
        cfg.runtime.workers,
        cfg.runtime.queue_capacity,
        cfg.runtime.flow_capacity,
        rule_engine,
    );

    let metrics = match cfg.telemetry.metrics_port {
        Some(port) => match init_metrics() {
            Ok((metrics, registry)) => {
                tokio::spawn(async move {
                    if let Err(err) = start_metrics_server(port, registry).await {
                        error!(%err, "metrics server exited with error");
                    }
                });
                Some(metrics)
            }
            Err(err) => {
                error!(%err, "failed to initialize metrics, continuing without them");
                None
            }
        },
        None => None,
    };

    let reaper = {
        let dispatcher = dispatcher.clone();
        let idle_secs = cfg.runtime.idle_timeout_ms / 1000;
        let interval_ms = cfg.runtime.reap_interval_ms.max(1);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(interval_ms));
            loop {
                ticker.tick().await;
                let removed = dispatcher.reap_idle(idle_secs);
                if removed > 0 {
                    info!(removed, "reaped stale flows");
                }
            }
        })
    };

    let admin_state = AdminState::new(dispatcher.clone(), metrics);
    let admin_addr: SocketAddr = cfg.listen;

    let result = start_admin_server(admin_addr, admin_state).await;

    reaper.abort();
    dispatcher.shutdown().await;
    for handle in dispatcher.join_handles() {
        handle.abort();
    }

    if let Err(err) = result {
        error!(%err, "admin surface exited with error");
        std::process::exit(1);
    }
}

async fn analyze(file: PathBuf, block_ips: Vec<String>, block_domains: Vec<String>) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();

    let store = InMemoryRuleStore::new();
    for ip in &block_ips {
        if let Err(err) = store.add(RuleSet::Ip, ip.clone()).await {
            error!(%err, ip, "failed to pre-load blocked IP");
        }
    }
    for domain in &block_domains {
        if let Err(err) = store.add(RuleSet::Domain, domain.clone()).await {
            error!(%err, domain, "failed to pre-load blocked domain");
        }
    }

    let pipeline = PcapPipeline::new(Arc::new(RuleEngine::new(store)));
    match pipeline.analyze_file(&file).await {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                error!(%err, "failed to serialize report");
                std::process::exit(1);
            }
        },
        Err(err) => {
            error!(%err, path = %file.display(), "failed to analyze capture file");
            std::process::exit(1);
        }
    }
}
