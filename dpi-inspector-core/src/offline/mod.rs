mod pipeline;
mod report;

pub use pipeline::PcapPipeline;
pub use report::{ConnectionDetail, PcapAnalysisReport};
