use serde::Deserialize;
use std::net::SocketAddr;

use super::rule_store::RuleStoreConfig;
use super::runtime::RuntimeConfig;
use super::telemetry::{LoggingConfig, TelemetryConfig};

/// Main configuration structure for the DPI engine.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address and port the admin HTTP surface listens on.
    /// Example: "0.0.0.0:8080" or "127.0.0.1:9000"
    pub listen: SocketAddr,
    /// Dispatcher, flow table, and shutdown tuning.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// External rule-store connection (optional; falls back to an
    /// in-memory store when absent).
    #[serde(default)]
    pub rule_store: RuleStoreConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Telemetry configuration
    /// Controls metrics and observability features
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}
