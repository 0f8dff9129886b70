use std::sync::atomic::{AtomicU64, Ordering};

use crate::flow::AppType;
use crate::rules::reason::{BlockKind, BlockReason};
use crate::rules::store::{RuleSet, RuleStore};

/// Composes the IP/PORT/APP/DOMAIN predicates in fixed precedence order
/// (spec.md §4.5), backed by a pluggable `RuleStore`.
pub struct RuleEngine<S: RuleStore> {
    store: S,
    rule_store_unavailable_total: AtomicU64,
}

impl<S: RuleStore> RuleEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store, rule_store_unavailable_total: AtomicU64::new(0) }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Count of `RuleStore` calls that returned an error during
    /// evaluation and were treated as fail-open "no match" (spec.md §7
    /// `RuleStoreUnavailable`).
    pub fn rule_store_unavailable_total(&self) -> u64 {
        self.rule_store_unavailable_total.load(Ordering::Relaxed)
    }

    /// Returns the first triggering block reason, or `None` if no rule
    /// matches. `domain`, when present, is matched case-insensitively
    /// (lowercased before comparison) against literal and `*.`-wildcard
    /// entries.
    pub async fn evaluate(
        &self,
        src_ip: &str,
        dst_port: u16,
        app_type: AppType,
        domain: Option<&str>,
    ) -> Option<BlockReason> {
        if self.contains_fail_open(RuleSet::Ip, src_ip).await {
            return Some(BlockReason::new(BlockKind::Ip, src_ip));
        }

        let port_str = dst_port.to_string();
        if self.contains_fail_open(RuleSet::Port, &port_str).await {
            return Some(BlockReason::new(BlockKind::Port, port_str));
        }

        if self.contains_fail_open(RuleSet::App, app_type.as_str()).await {
            return Some(BlockReason::new(BlockKind::App, app_type.as_str()));
        }

        if let Some(domain) = domain {
            let domain = domain.to_lowercase();
            if self.domain_blocked(&domain).await {
                return Some(BlockReason::new(BlockKind::Domain, domain));
            }
        }

        None
    }

    async fn contains_fail_open(&self, set: RuleSet, member: &str) -> bool {
        match self.store.contains(set, member).await {
            Ok(hit) => hit,
            Err(_) => {
                self.rule_store_unavailable_total.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// A domain rule `r` matches `domain` when `r == domain`, or `r`
    /// begins with `*.` and `domain` ends with `r`'s suffix starting at
    /// position 1 (i.e. including the leading dot) — so `*.x.y` matches
    /// `a.x.y` but NOT `x.y` itself (spec.md §8 property 5).
    async fn domain_blocked(&self, domain: &str) -> bool {
        let rules = match self.store.members(RuleSet::Domain).await {
            Ok(rules) => rules,
            Err(_) => {
                self.rule_store_unavailable_total.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        };

        for rule in &rules {
            if let Some(suffix) = rule.strip_prefix("*.") {
                if domain.ends_with(&format!(".{suffix}")) {
                    return true;
                }
            } else if rule == domain {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::store::InMemoryRuleStore;

    async fn engine_with(ips: &[&str], domains: &[&str]) -> RuleEngine<InMemoryRuleStore> {
        let store = InMemoryRuleStore::new();
        for ip in ips {
            store.add(RuleSet::Ip, ip.to_string()).await.unwrap();
        }
        for d in domains {
            store.add(RuleSet::Domain, d.to_string()).await.unwrap();
        }
        RuleEngine::new(store)
    }

    #[tokio::test]
    async fn ip_precedes_everything_else() {
        let engine = engine_with(&["192.168.1.50"], &["example.com"]).await;
        let reason = engine
            .evaluate("192.168.1.50", 443, AppType::Https, Some("example.com"))
            .await
            .unwrap();
        assert_eq!(reason.kind, BlockKind::Ip);
    }

    #[tokio::test]
    async fn wildcard_matches_subdomain_but_not_bare_domain() {
        let engine = engine_with(&[], &["*.facebook.com"]).await;
        assert!(engine
            .evaluate("1.1.1.1", 443, AppType::Facebook, Some("edge.facebook.com"))
            .await
            .is_some());
        assert!(engine
            .evaluate("1.1.1.1", 443, AppType::Facebook, Some("facebook.com"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn no_domain_no_domain_check() {
        let engine = engine_with(&[], &["example.com"]).await;
        assert!(engine.evaluate("1.1.1.1", 443, AppType::Https, None).await.is_none());
    }

    #[tokio::test]
    async fn domain_lookup_is_case_insensitive() {
        let engine = engine_with(&[], &["example.com"]).await;
        assert!(engine
            .evaluate("1.1.1.1", 443, AppType::Https, Some("Example.COM"))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn ip_check_fails_open_when_the_store_errors() {
        use crate::rules::store::FailingRuleStore;

        let engine = RuleEngine::new(FailingRuleStore::failing_on(RuleSet::Ip));
        let reason = engine.evaluate("192.168.1.50", 443, AppType::Https, None).await;

        assert!(reason.is_none());
        assert_eq!(engine.rule_store_unavailable_total(), 1);
    }

    #[tokio::test]
    async fn domain_check_fails_open_when_the_store_errors() {
        use crate::rules::store::FailingRuleStore;

        let engine = RuleEngine::new(FailingRuleStore::failing_on(RuleSet::Domain));
        let reason =
            engine.evaluate("1.1.1.1", 443, AppType::Https, Some("blocked.example.com")).await;

        assert!(reason.is_none());
        assert_eq!(engine.rule_store_unavailable_total(), 1);
    }
}
