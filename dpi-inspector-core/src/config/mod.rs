mod loader;
mod root;
mod rule_store;
mod runtime;
mod telemetry;

pub use loader::load_from_path;
pub use root::Config;
pub use rule_store::RuleStoreConfig;
pub use runtime::RuntimeConfig;
pub use telemetry::{LoggingConfig, TelemetryConfig};
