use std::collections::HashSet;

use tokio::sync::RwLock;

use crate::error::Result;

/// Which of the four disjoint rule sets an operation addresses (spec.md
/// §3's rule store: `blocked_ips`, `blocked_ports`, `blocked_apps`,
/// `blocked_domains`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleSet {
    Ip,
    Port,
    App,
    Domain,
}

/// The small key-value interface the rule engine consumes (spec.md §6):
/// set semantics, add/remove/members/contains, each atomic per call. An
/// implementation may be in-memory (the only one built here) or backed by
/// an external service; per spec.md §7, a `RuleStoreUnavailable` result
/// from any method is treated by the engine as "no match", not a block.
pub trait RuleStore: Send + Sync {
    fn add(
        &self,
        set: RuleSet,
        member: String,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn remove(
        &self,
        set: RuleSet,
        member: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn members(&self, set: RuleSet) -> impl std::future::Future<Output = Result<Vec<String>>> + Send;

    fn contains(
        &self,
        set: RuleSet,
        member: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;
}

/// Default in-memory rule store: four `HashSet`s behind one
/// `tokio::sync::RwLock`, matching the teacher's DI-friendly config
/// seams but with no external backend — the one recognized environment
/// variable (spec.md §6) only changes what URL is *recorded*; this is the
/// only store actually wired up.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    ips: RwLock<HashSet<String>>,
    ports: RwLock<HashSet<String>>,
    apps: RwLock<HashSet<String>>,
    domains: RwLock<HashSet<String>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sets(&self, set: RuleSet) -> &RwLock<HashSet<String>> {
        match set {
            RuleSet::Ip => &self.ips,
            RuleSet::Port => &self.ports,
            RuleSet::App => &self.apps,
            RuleSet::Domain => &self.domains,
        }
    }

    fn normalize(set: RuleSet, member: &str) -> String {
        match set {
            RuleSet::Domain => member.to_lowercase(),
            _ => member.to_string(),
        }
    }
}

impl RuleStore for InMemoryRuleStore {
    async fn add(&self, set: RuleSet, member: String) -> Result<()> {
        let member = Self::normalize(set, &member);
        self.sets(set).write().await.insert(member);
        Ok(())
    }

    async fn remove(&self, set: RuleSet, member: &str) -> Result<()> {
        let member = Self::normalize(set, member);
        self.sets(set).write().await.remove(&member);
        Ok(())
    }

    async fn members(&self, set: RuleSet) -> Result<Vec<String>> {
        let mut members: Vec<String> = self.sets(set).read().await.iter().cloned().collect();
        members.sort();
        Ok(members)
    }

    async fn contains(&self, set: RuleSet, member: &str) -> Result<bool> {
        let member = Self::normalize(set, member);
        Ok(self.sets(set).read().await.contains(&member))
    }
}

/// Test double that fails every call against a configured set of
/// `RuleSet`s and otherwise behaves like [`InMemoryRuleStore`]. Exists so
/// tests can drive the `RuleStoreUnavailable` fail-open path (spec.md §7)
/// and the `/health` degradation it causes, neither of which
/// `InMemoryRuleStore` itself can ever trigger.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct FailingRuleStore {
    failing: std::sync::Mutex<HashSet<RuleSet>>,
    inner: InMemoryRuleStore,
}

#[cfg(any(test, feature = "test-util"))]
impl FailingRuleStore {
    /// Every call against `set` returns `Err`; the other three sets
    /// behave normally.
    pub fn failing_on(set: RuleSet) -> Self {
        let mut failing = HashSet::new();
        failing.insert(set);
        Self { failing: std::sync::Mutex::new(failing), inner: InMemoryRuleStore::new() }
    }

    fn should_fail(&self, set: RuleSet) -> bool {
        self.failing.lock().expect("FailingRuleStore mutex poisoned").contains(&set)
    }
}

#[cfg(any(test, feature = "test-util"))]
impl RuleStore for FailingRuleStore {
    async fn add(&self, set: RuleSet, member: String) -> Result<()> {
        if self.should_fail(set) {
            return Err(crate::error::DpiError::RuleStoreUnavailable(format!("{set:?}")));
        }
        self.inner.add(set, member).await
    }

    async fn remove(&self, set: RuleSet, member: &str) -> Result<()> {
        if self.should_fail(set) {
            return Err(crate::error::DpiError::RuleStoreUnavailable(format!("{set:?}")));
        }
        self.inner.remove(set, member).await
    }

    async fn members(&self, set: RuleSet) -> Result<Vec<String>> {
        if self.should_fail(set) {
            return Err(crate::error::DpiError::RuleStoreUnavailable(format!("{set:?}")));
        }
        self.inner.members(set).await
    }

    async fn contains(&self, set: RuleSet, member: &str) -> Result<bool> {
        if self.should_fail(set) {
            return Err(crate::error::DpiError::RuleStoreUnavailable(format!("{set:?}")));
        }
        self.inner.contains(set, member).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_is_idempotent() {
        let store = InMemoryRuleStore::new();
        store.add(RuleSet::Ip, "1.2.3.4".to_string()).await.unwrap();
        store.add(RuleSet::Ip, "1.2.3.4".to_string()).await.unwrap();
        assert_eq!(store.members(RuleSet::Ip).await.unwrap(), vec!["1.2.3.4".to_string()]);
    }

    #[tokio::test]
    async fn unblock_after_either_yields_empty() {
        let store = InMemoryRuleStore::new();
        store.add(RuleSet::Ip, "1.2.3.4".to_string()).await.unwrap();
        store.remove(RuleSet::Ip, "1.2.3.4").await.unwrap();
        assert!(store.members(RuleSet::Ip).await.unwrap().is_empty());
        // Removing again is a no-op, not an error.
        store.remove(RuleSet::Ip, "1.2.3.4").await.unwrap();
    }

    #[tokio::test]
    async fn domains_are_stored_lowercased() {
        let store = InMemoryRuleStore::new();
        store.add(RuleSet::Domain, "Example.COM".to_string()).await.unwrap();
        assert!(store.contains(RuleSet::Domain, "example.com").await.unwrap());
    }

    #[tokio::test]
    async fn failing_store_errors_only_on_the_configured_set() {
        let store = FailingRuleStore::failing_on(RuleSet::Ip);
        assert!(store.contains(RuleSet::Ip, "1.2.3.4").await.is_err());
        assert!(store.members(RuleSet::Ip).await.is_err());
        store.add(RuleSet::Domain, "example.com".to_string()).await.unwrap();
        assert!(store.contains(RuleSet::Domain, "example.com").await.unwrap());
    }
}
