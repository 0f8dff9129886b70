use serde::Deserialize;

const RULE_STORE_ENV: &str = "DPI_RULE_STORE_URL";
const DEFAULT_RULE_STORE_URL: &str = "memory://local";

/// External rule-store connection.
///
/// The one environment variable this system recognizes (spec.md §6) is a
/// connection URL for the rule store; if unset, a default local address is
/// used. A config-file value takes precedence over the environment, which
/// in turn takes precedence over the built-in default.
#[derive(Debug, Deserialize, Clone)]
pub struct RuleStoreConfig {
    /// Connection URL for the external rule store.
    /// Default: read from `DPI_RULE_STORE_URL`, or `"memory://local"` if
    /// that is also unset.
    #[serde(default)]
    pub url: Option<String>,
}

impl Default for RuleStoreConfig {
    fn default() -> Self {
        Self { url: None }
    }
}

impl RuleStoreConfig {
    /// Resolve the effective rule-store URL per the precedence above.
    pub fn resolved_url(&self) -> String {
        self.url
            .clone()
            .or_else(|| std::env::var(RULE_STORE_ENV).ok())
            .unwrap_or_else(|| DEFAULT_RULE_STORE_URL.to_string())
    }

    /// `true` when the resolved URL names the in-memory default, i.e. no
    /// external backend was configured.
    pub fn is_in_memory(&self) -> bool {
        self.resolved_url() == DEFAULT_RULE_STORE_URL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_memory_store() {
        let cfg = RuleStoreConfig::default();
        assert!(cfg.is_in_memory());
    }

    #[test]
    fn config_value_wins_over_default() {
        let cfg = RuleStoreConfig { url: Some("redis://rules.internal:6379".to_string()) };
        assert_eq!(cfg.resolved_url(), "redis://rules.internal:6379");
        assert!(!cfg.is_in_memory());
    }
}
