mod engine;
mod reason;
mod store;

pub use engine::RuleEngine;
pub use reason::{BlockKind, BlockReason};
#[cfg(any(test, feature = "test-util"))]
pub use store::FailingRuleStore;
pub use store::{InMemoryRuleStore, RuleSet, RuleStore};
