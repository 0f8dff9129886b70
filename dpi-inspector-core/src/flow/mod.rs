mod key;
mod record;
mod table;

pub use key::{FlowKey, Protocol};
pub use record::{now_secs, AppType, FlowRecord, FlowState, TcpSubState};
pub use table::{FlowTable, FlowTableStats};
