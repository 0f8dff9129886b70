mod dispatcher;
mod hash;
mod worker;

pub use dispatcher::{default_rule_engine, Dispatcher, ShardStats, SubmitOutcome};
pub use hash::worker_index;
pub use worker::{DefaultRuleEngine, PacketSubmission, Verdict, Worker, WorkerStats};
